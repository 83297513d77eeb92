//! Native media element abstraction
//!
//! The playback engine never renders or decodes; it drives a host-provided
//! media element (browser video element, GStreamer pipeline, test double)
//! through the [`MediaElement`] trait and is fed that element's lifecycle
//! signals as [`NativeEvent`]s.

use crate::types::{CrossOrigin, NetworkState, Preload, ReadyState, SourceConfig, TimeRange};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Outcome of an asynchronous platform call (play, fullscreen, picture-in-picture)
///
/// The request is issued when the method returning the future is called; the
/// future only reports how it settled, so dropping it does not cancel anything.
pub type PlatformFuture = Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'static>>;

/// Failure reported by an asynchronous platform call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Blocked by policy (e.g. autoplay without user gesture)
    #[error("not allowed: {0}")]
    NotAllowed(String),

    /// Interrupted by a later call (e.g. `pause()` while `play()` is pending)
    #[error("aborted: {0}")]
    Aborted(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Other(String),
}

/// A platform future that has already settled
pub fn settled(result: Result<(), PlatformError>) -> PlatformFuture {
    Box::pin(std::future::ready(result))
}

/// Media error codes as reported by the element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorCode {
    Aborted = 1,
    Network = 2,
    Decode = 3,
    SrcNotSupported = 4,
}

impl MediaErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaErrorCode::Aborted => "MEDIA_ERR_ABORTED",
            MediaErrorCode::Network => "MEDIA_ERR_NETWORK",
            MediaErrorCode::Decode => "MEDIA_ERR_DECODE",
            MediaErrorCode::SrcNotSupported => "MEDIA_ERR_SRC_NOT_SUPPORTED",
        }
    }
}

/// Error currently set on the element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaError {
    pub code: MediaErrorCode,
    pub message: String,
}

impl MediaError {
    pub fn new(code: MediaErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Answer of `can_play_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanPlayType {
    Empty,
    Maybe,
    Probably,
}

impl CanPlayType {
    pub fn is_playable(&self) -> bool {
        !matches!(self, CanPlayType::Empty)
    }
}

/// Presentation attributes applied to the element at construction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementAttributes {
    pub autoplay: bool,
    pub loop_: bool,
    pub muted: bool,
    pub controls: bool,
    pub plays_inline: bool,
    pub preload: Preload,
    pub cross_origin: Option<CrossOrigin>,
    pub poster: Option<String>,
}

impl From<&SourceConfig> for ElementAttributes {
    fn from(config: &SourceConfig) -> Self {
        Self {
            autoplay: config.autoplay.unwrap_or(false),
            loop_: config.loop_.unwrap_or(false),
            muted: config.muted.unwrap_or(false),
            controls: config.controls.unwrap_or(false),
            plays_inline: config.plays_inline.unwrap_or(true),
            preload: config.preload.unwrap_or_default(),
            cross_origin: config.cross_origin,
            poster: config.poster.clone(),
        }
    }
}

/// Lifecycle signals raised by the native element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeEvent {
    LoadStart,
    LoadedMetadata,
    LoadedData,
    CanPlay,
    CanPlayThrough,
    Play,
    Playing,
    Pause,
    Seeking,
    Seeked,
    Waiting,
    Stalled,
    TimeUpdate,
    Progress,
    VolumeChange,
    RateChange,
    Ended,
    Error,
    FullscreenChange,
    EnterPictureInPicture,
    LeavePictureInPicture,
}

/// Host media element driven by the playback engine
pub trait MediaElement {
    // Playback position

    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, time: f64);
    /// NaN until known, infinite for live streams
    fn duration(&self) -> f64;
    fn paused(&self) -> bool;
    fn ended(&self) -> bool;

    // Audio and rate

    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);

    // Readiness and media info

    fn ready_state(&self) -> ReadyState;
    fn network_state(&self) -> NetworkState;
    fn video_width(&self) -> u32;
    fn video_height(&self) -> u32;
    fn buffered(&self) -> Vec<TimeRange>;
    fn seekable(&self) -> Vec<TimeRange>;
    fn played(&self) -> Vec<TimeRange>;
    fn error(&self) -> Option<MediaError>;

    // Source

    fn src(&self) -> Option<String>;
    /// Attach (`Some`) or detach (`None`) the source URL
    fn set_src(&mut self, src: Option<&str>);
    /// Restart the resource selection algorithm
    fn load(&mut self);
    fn apply_attributes(&mut self, attributes: &ElementAttributes);
    fn can_play_type(&self, mime_type: &str) -> CanPlayType;

    // Playback control

    fn play(&mut self) -> PlatformFuture;
    fn pause(&mut self);

    // Fullscreen

    fn fullscreen_supported(&self) -> bool {
        false
    }

    fn is_fullscreen(&self) -> bool {
        false
    }

    fn request_fullscreen(&mut self) -> PlatformFuture {
        settled(Err(PlatformError::NotSupported("fullscreen".to_string())))
    }

    fn exit_fullscreen(&mut self) -> PlatformFuture {
        settled(Err(PlatformError::NotSupported("fullscreen".to_string())))
    }

    // Picture-in-picture

    fn pip_supported(&self) -> bool {
        false
    }

    fn is_pip(&self) -> bool {
        false
    }

    fn request_pip(&mut self) -> PlatformFuture {
        settled(Err(PlatformError::NotSupported("picture-in-picture".to_string())))
    }

    fn exit_pip(&mut self) -> PlatformFuture {
        settled(Err(PlatformError::NotSupported("picture-in-picture".to_string())))
    }
}
