//! Uniform player handle over the base wrapper and the adaptive controller

use crate::{
    adaptive::AdaptiveStreamController,
    element::{MediaElement, NativeEvent},
    emitter::{ListenerId, ListenerResult},
    engine::EngineEvent,
    types::*,
    wrapper::{ControlFuture, MediaStateWrapper, PlayerEmitter},
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Controller family chosen for a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// Segmented stream through the adaptive controller
    Adaptive,
    /// DASH manifest attached directly to the element
    Dash,
    /// Progressive file (mp4, webm, ogg)
    Progressive,
}

impl std::fmt::Display for PlayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerKind::Adaptive => write!(f, "adaptive"),
            PlayerKind::Dash => write!(f, "dash"),
            PlayerKind::Progressive => write!(f, "progressive"),
        }
    }
}

enum Controller<E: MediaElement> {
    Standard(MediaStateWrapper<E>),
    Adaptive(AdaptiveStreamController<E>),
}

/// A constructed player
pub struct Player<E: MediaElement> {
    id: PlayerId,
    kind: PlayerKind,
    created_at: DateTime<Utc>,
    controller: Controller<E>,
    loaded: bool,
}

impl<E: MediaElement> Player<E> {
    pub(crate) fn standard(kind: PlayerKind, wrapper: MediaStateWrapper<E>) -> Self {
        Self::with_controller(kind, Controller::Standard(wrapper))
    }

    pub(crate) fn adaptive(controller: AdaptiveStreamController<E>) -> Self {
        Self::with_controller(PlayerKind::Adaptive, Controller::Adaptive(controller))
    }

    fn with_controller(kind: PlayerKind, controller: Controller<E>) -> Self {
        Self {
            id: PlayerId::new(),
            kind,
            created_at: Utc::now(),
            controller,
            loaded: false,
        }
    }

    /// Attach the source and start loading
    ///
    /// Construction attaches nothing and emits nothing, so listeners registered
    /// between creation and this call see every event. Later calls are no-ops.
    #[instrument(skip(self), fields(player = %self.id, kind = %self.kind))]
    pub fn load(&mut self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed);
        }
        if self.loaded {
            debug!("Player already loaded");
            return Ok(());
        }

        match &mut self.controller {
            Controller::Adaptive(adaptive) => adaptive.load()?,
            Controller::Standard(wrapper) => {
                let source = match self.kind {
                    PlayerKind::Dash => wrapper.config().dash_source().cloned(),
                    _ => wrapper.select_source(),
                }
                .ok_or_else(|| Error::UnsupportedSource(format!("no {} source", self.kind)))?;
                wrapper.attach_source(&source);
            }
        }
        self.loaded = true;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn kind(&self) -> PlayerKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The wrapper holding the canonical state
    pub fn wrapper(&self) -> &MediaStateWrapper<E> {
        match &self.controller {
            Controller::Standard(wrapper) => wrapper,
            Controller::Adaptive(adaptive) => adaptive.wrapper(),
        }
    }

    fn wrapper_mut(&mut self) -> &mut MediaStateWrapper<E> {
        match &mut self.controller {
            Controller::Standard(wrapper) => wrapper,
            Controller::Adaptive(adaptive) => adaptive.wrapper_mut(),
        }
    }

    /// The adaptive controller, for adaptive players
    pub fn adaptive_controller(&self) -> Option<&AdaptiveStreamController<E>> {
        match &self.controller {
            Controller::Adaptive(adaptive) => Some(adaptive),
            Controller::Standard(_) => None,
        }
    }

    pub fn adaptive_controller_mut(&mut self) -> Option<&mut AdaptiveStreamController<E>> {
        match &mut self.controller {
            Controller::Adaptive(adaptive) => Some(adaptive),
            Controller::Standard(_) => None,
        }
    }

    // Signals

    pub fn handle_native_event(&mut self, event: NativeEvent) -> Result<()> {
        match &mut self.controller {
            Controller::Standard(wrapper) => {
                wrapper.handle_native_event(event);
                Ok(())
            }
            Controller::Adaptive(adaptive) => adaptive.handle_native_event(event),
        }
    }

    /// Engine signals only reach adaptive players
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Result<()> {
        match &mut self.controller {
            Controller::Standard(_) => {
                debug!(player = %self.id, "Engine event on a non-adaptive player ignored");
                Ok(())
            }
            Controller::Adaptive(adaptive) => adaptive.handle_engine_event(event),
        }
    }

    // Read-only surface

    pub fn element(&self) -> &E {
        self.wrapper().element()
    }

    pub fn config(&self) -> &SourceConfig {
        self.wrapper().config()
    }

    pub fn state(&self) -> PlaybackState {
        self.wrapper().state()
    }

    pub fn metadata(&self) -> &Metadata {
        self.wrapper().metadata()
    }

    pub fn stats(&self) -> &Stats {
        self.wrapper().stats()
    }

    pub fn emitter(&self) -> &PlayerEmitter {
        self.wrapper().emitter()
    }

    pub fn is_destroyed(&self) -> bool {
        self.wrapper().is_destroyed()
    }

    // Subscriptions

    pub fn on<F>(&self, event: PlayerEventKind, listener: F) -> ListenerId
    where
        F: Fn(&EventRecord) -> ListenerResult + Send + Sync + 'static,
    {
        self.wrapper().on(event, listener)
    }

    pub fn once<F>(&self, event: PlayerEventKind, listener: F) -> ListenerId
    where
        F: Fn(&EventRecord) -> ListenerResult + Send + Sync + 'static,
    {
        self.wrapper().once(event, listener)
    }

    pub fn off(&self, event: PlayerEventKind, id: ListenerId) -> bool {
        self.wrapper().off(event, id)
    }

    // Control

    pub fn play(&mut self) -> ControlFuture {
        self.wrapper_mut().play()
    }

    pub fn pause(&mut self) {
        self.wrapper_mut().pause();
    }

    pub fn stop(&mut self) {
        self.wrapper_mut().stop();
    }

    pub fn seek(&mut self, time: f64) {
        self.wrapper_mut().seek(time);
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.wrapper_mut().set_volume(volume);
    }

    pub fn mute(&mut self) {
        self.wrapper_mut().mute();
    }

    pub fn unmute(&mut self) {
        self.wrapper_mut().unmute();
    }

    pub fn toggle_mute(&mut self) {
        self.wrapper_mut().toggle_mute();
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.wrapper_mut().set_playback_rate(rate);
    }

    pub fn set_quality(&mut self, quality: &str) {
        match &mut self.controller {
            Controller::Standard(wrapper) => wrapper.set_quality(quality),
            Controller::Adaptive(adaptive) => adaptive.set_quality(quality),
        }
    }

    pub fn get_current_quality(&self) -> &str {
        self.wrapper().get_current_quality()
    }

    pub fn get_available_qualities(&self) -> Vec<String> {
        match &self.controller {
            Controller::Standard(wrapper) => wrapper.get_available_qualities(),
            Controller::Adaptive(adaptive) => adaptive.get_available_qualities(),
        }
    }

    pub fn enter_fullscreen(&mut self) -> ControlFuture {
        self.wrapper_mut().enter_fullscreen()
    }

    pub fn exit_fullscreen(&mut self) -> ControlFuture {
        self.wrapper_mut().exit_fullscreen()
    }

    pub fn toggle_fullscreen(&mut self) -> ControlFuture {
        self.wrapper_mut().toggle_fullscreen()
    }

    pub fn enter_pip(&mut self) -> ControlFuture {
        self.wrapper_mut().enter_pip()
    }

    pub fn exit_pip(&mut self) -> ControlFuture {
        self.wrapper_mut().exit_pip()
    }

    pub fn toggle_pip(&mut self) -> ControlFuture {
        self.wrapper_mut().toggle_pip()
    }

    pub fn destroy(&mut self) {
        match &mut self.controller {
            Controller::Standard(wrapper) => wrapper.destroy(),
            Controller::Adaptive(adaptive) => adaptive.destroy(),
        }
    }
}
