//! Error types for Kino Playback

use crate::element::PlatformError;
use crate::types::ErrorCategory;
use thiserror::Error;

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playback engine error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    // Playback errors
    #[error("Playback request rejected: {0}")]
    PlaybackRejected(String),

    #[error("Platform call failed: {0}")]
    Platform(#[from] PlatformError),

    // Streaming engine errors
    #[error("Streaming engine error: {0}")]
    Engine(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Lifecycle errors
    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Player has been destroyed")]
    Destroyed,
}

impl Error {
    /// Create a streaming engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Error::Engine(msg.into())
    }

    /// Returns true if this error was raised while validating a configuration
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_) | Error::UnsupportedSource(_) | Error::Json(_)
        )
    }

    /// Canonical category used on the event stream
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedSource(_) => ErrorCategory::UnsupportedSource,
            Error::Platform(PlatformError::NotSupported(_)) => ErrorCategory::UnsupportedSource,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Returns the error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::UnsupportedSource(_) => "UNSUPPORTED_SOURCE",
            Error::Json(_) => "CONFIG_PARSE",
            Error::PlaybackRejected(_) => "PLAY_REJECTED",
            Error::Platform(_) => "PLATFORM",
            Error::Engine(_) => "ENGINE",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            Error::Destroyed => "DESTROYED",
        }
    }
}
