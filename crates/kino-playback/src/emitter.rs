//! Typed event emitter
//!
//! Generic publish/subscribe primitive keyed by a closed event enum:
//! - Regular and one-shot listeners, dispatched in registration order
//! - Soft listener-count ceiling (warns, never rejects)
//! - Snapshot-before-dispatch so listeners may add/remove listeners safely
//! - Per-listener failure isolation (errors and panics are logged, not propagated)

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, warn};

/// Default soft cap on listeners per event
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// Result returned by a listener; `Err` is logged and otherwise ignored
pub type ListenerResult = anyhow::Result<()>;

/// Shared listener callback
pub type Listener<V> = Arc<dyn Fn(&V) -> ListenerResult + Send + Sync>;

/// Token identifying a registered listener, used to remove it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Entry<V> {
    id: ListenerId,
    listener: Listener<V>,
}

impl<V> Clone for Entry<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            listener: Arc::clone(&self.listener),
        }
    }
}

struct Listeners<K, V> {
    regular: HashMap<K, Vec<Entry<V>>>,
    once: HashMap<K, Vec<Entry<V>>>,
    max_listeners: usize,
    next_id: u64,
}

impl<K: Copy + Eq + Hash, V> Listeners<K, V> {
    fn count(&self, event: &K) -> usize {
        self.regular.get(event).map_or(0, Vec::len) + self.once.get(event).map_or(0, Vec::len)
    }

    fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

/// Event emitter handle
///
/// Cloning is cheap and every clone addresses the same listener table, so a
/// listener can capture a clone and (un)register listeners while dispatching.
pub struct EventEmitter<K, V> {
    inner: Arc<Mutex<Listeners<K, V>>>,
}

impl<K, V> Clone for EventEmitter<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> EventEmitter<K, V>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Create an emitter with the default listener cap
    pub fn new() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }

    /// Create an emitter with a custom listener cap (0 disables the warning)
    pub fn with_max_listeners(max_listeners: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                regular: HashMap::new(),
                once: HashMap::new(),
                max_listeners,
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Listeners<K, V>> {
        // Listeners never run under the lock, a poisoned table is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the soft listener cap
    pub fn set_max_listeners(&self, max_listeners: usize) {
        self.lock().max_listeners = max_listeners;
    }

    pub fn max_listeners(&self) -> usize {
        self.lock().max_listeners
    }

    /// Register a listener invoked on every emission of `event`
    pub fn on<F>(&self, event: K, listener: F) -> ListenerId
    where
        F: Fn(&V) -> ListenerResult + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), false)
    }

    /// Register a listener invoked on the next emission of `event` only
    pub fn once<F>(&self, event: K, listener: F) -> ListenerId
    where
        F: Fn(&V) -> ListenerResult + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), true)
    }

    fn register(&self, event: K, listener: Listener<V>, once: bool) -> ListenerId {
        let mut listeners = self.lock();
        let id = listeners.allocate_id();
        let entry = Entry { id, listener };

        if once {
            listeners.once.entry(event).or_default().push(entry);
        } else {
            listeners.regular.entry(event).or_default().push(entry);
        }

        let count = listeners.count(&event);
        let max = listeners.max_listeners;
        if max > 0 && count > max {
            warn!(
                event = ?event,
                count = count,
                max_listeners = max,
                "Listener count exceeds limit, possible leak"
            );
        }

        id
    }

    /// Remove a listener from both the regular and once sets
    ///
    /// Returns true if the listener was registered for `event`.
    pub fn off(&self, event: K, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let removed_regular = remove_entry(&mut listeners.regular, event, id);
        let removed_once = remove_entry(&mut listeners.once, event, id);
        removed_regular || removed_once
    }

    /// Dispatch `value` to the listeners of `event`
    ///
    /// Returns true if at least one listener was registered.
    pub fn emit(&self, event: K, value: &V) -> bool {
        let (regular, once) = {
            let mut listeners = self.lock();
            let regular: Vec<Entry<V>> = listeners.regular.get(&event).cloned().unwrap_or_default();
            // Drained before dispatch, a once listener cannot fire twice
            let once = listeners.once.remove(&event).unwrap_or_default();
            (regular, once)
        };

        if regular.is_empty() && once.is_empty() {
            return false;
        }

        for entry in regular.iter().chain(once.iter()) {
            invoke(event, entry, value);
        }

        true
    }

    /// Remove every listener of `event`, or of every event when `None`
    pub fn remove_all_listeners(&self, event: Option<K>) {
        let mut listeners = self.lock();
        match event {
            Some(event) => {
                listeners.regular.remove(&event);
                listeners.once.remove(&event);
            }
            None => {
                listeners.regular.clear();
                listeners.once.clear();
            }
        }
    }

    /// Number of listeners (regular and once) registered for `event`
    pub fn listener_count(&self, event: K) -> usize {
        self.lock().count(&event)
    }

    /// Total number of listeners across all events
    pub fn total_listener_count(&self) -> usize {
        let listeners = self.lock();
        listeners.regular.values().map(Vec::len).sum::<usize>()
            + listeners.once.values().map(Vec::len).sum::<usize>()
    }

    /// Events that currently have at least one listener
    pub fn event_names(&self) -> Vec<K> {
        let listeners = self.lock();
        let mut names: Vec<K> = listeners.regular.keys().copied().collect();
        for key in listeners.once.keys() {
            if !names.contains(key) {
                names.push(*key);
            }
        }
        names
    }

    /// Release every listener; safe to call repeatedly
    pub fn destroy(&self) {
        self.remove_all_listeners(None);
    }
}

impl<K, V> Default for EventEmitter<K, V>
where
    K: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

fn remove_entry<K: Copy + Eq + Hash, V>(
    table: &mut HashMap<K, Vec<Entry<V>>>,
    event: K,
    id: ListenerId,
) -> bool {
    let Some(entries) = table.get_mut(&event) else {
        return false;
    };

    let before = entries.len();
    entries.retain(|e| e.id != id);
    let removed = entries.len() != before;

    if entries.is_empty() {
        table.remove(&event);
    }
    removed
}

fn invoke<K: Debug, V>(event: K, entry: &Entry<V>, value: &V) {
    match catch_unwind(AssertUnwindSafe(|| (entry.listener)(value))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(event = ?event, listener = ?entry.id, error = %e, "Event listener failed");
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(event = ?event, listener = ?entry.id, panic = %message, "Event listener panicked");
        }
    }
}
