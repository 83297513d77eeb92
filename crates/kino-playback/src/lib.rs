//! Kino Playback - Event-driven playback engine for Kino
//!
//! This crate drives a host media element and presents a canonical view of it:
//! - Typed event emitter with failure-isolated listeners
//! - Media state machine normalizing native lifecycle signals
//! - Adaptive stream control (quality ladder, buffering telemetry, fault recovery)
//! - Player factory with validation and a live player registry
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Kino Playback                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ┌──────────────┐         ┌──────────────────┐                 │
//! │   │   Factory    │────────▶│  PlayerRegistry  │                 │
//! │   └──────┬───────┘         └──────────────────┘                 │
//! │          │                                                      │
//! │   ┌──────┴───────┐         ┌──────────────────┐                 │
//! │   │   Adaptive   │────────▶│ StreamingEngine  │◀── EngineEvent  │
//! │   │  Controller  │         └──────────────────┘                 │
//! │   └──────┬───────┘                                              │
//! │          │                                                      │
//! │   ┌──────┴───────┐         ┌──────────────────┐                 │
//! │   │ Media State  │────────▶│   MediaElement   │◀── NativeEvent  │
//! │   │   Wrapper    │         └──────────────────┘                 │
//! │   └──────┬───────┘                                              │
//! │          │                                                      │
//! │   ┌──────┴───────┐                                              │
//! │   │    Event     │────────▶ listeners (EventRecord)             │
//! │   │   Emitter    │                                              │
//! │   └──────────────┘                                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod emitter;
pub mod element;
pub mod engine;
pub mod wrapper;
pub mod adaptive;
pub mod validation;
pub mod player;
pub mod factory;
#[cfg(feature = "simulated")]
pub mod simulated;

pub use error::{Error, Result};
pub use types::*;
pub use emitter::{EventEmitter, ListenerId, ListenerResult, DEFAULT_MAX_LISTENERS};
pub use element::{CanPlayType, MediaElement, MediaError, MediaErrorCode, NativeEvent, PlatformError};
pub use engine::{EngineConfig, EngineEvent, EngineLevel, EngineProvider, StreamingEngine, StreamingOptions};
pub use wrapper::{ControlFuture, MediaStateWrapper, PlayerEmitter};
pub use adaptive::{AdaptiveStreamController, RecoveryPolicy, StreamCapability};
pub use validation::{validate_adaptive, validate_config};
pub use player::{Player, PlayerKind};
pub use factory::{PlayerFactory, PlayerRegistry, RegistryStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the playback library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Kino Playback initialized");
}
