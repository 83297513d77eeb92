//! Core types for Kino Playback

use crate::engine::StreamingOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

/// Quality tag that hands level selection back to the streaming engine
pub const AUTO_QUALITY: &str = "auto";

/// Unique identifier for a player tracked by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Playback State
// =============================================================================

/// Canonical playback state, driven by native element signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing loaded yet
    #[default]
    Idle,
    /// Source is loading
    Loading,
    /// Enough data to start playback
    CanPlay,
    /// Playback requested, waiting for frames
    Play,
    /// Frames are being rendered
    Playing,
    /// Playback paused
    Paused,
    /// Seek in progress
    Seeking,
    /// Stalled waiting for data
    Waiting,
    /// Reached the end of the media
    Ended,
    /// Fatal error occurred
    Error,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::CanPlay => write!(f, "canplay"),
            PlaybackState::Play => write!(f, "play"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Seeking => write!(f, "seeking"),
            PlaybackState::Waiting => write!(f, "waiting"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Sources and Configuration
// =============================================================================

/// Supported source format tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Segmented adaptive stream (HLS)
    Hls,
    /// MPEG-DASH manifest
    Dash,
    Mp4,
    Webm,
    Ogg,
}

impl SourceFormat {
    /// All supported format tags
    pub const ALL: [SourceFormat; 5] = [
        SourceFormat::Hls,
        SourceFormat::Dash,
        SourceFormat::Mp4,
        SourceFormat::Webm,
        SourceFormat::Ogg,
    ];

    /// MIME type handed to `can_play_type`
    pub fn mime_type(&self) -> &'static str {
        match self {
            SourceFormat::Hls => "application/vnd.apple.mpegurl",
            SourceFormat::Dash => "application/dash+xml",
            SourceFormat::Mp4 => "video/mp4",
            SourceFormat::Webm => "video/webm",
            SourceFormat::Ogg => "video/ogg",
        }
    }

    /// Tag as written in a source configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Hls => "hls",
            SourceFormat::Dash => "dash",
            SourceFormat::Mp4 => "mp4",
            SourceFormat::Webm => "webm",
            SourceFormat::Ogg => "ogg",
        }
    }

    /// Whether this format is served by the adaptive stream controller
    pub fn is_adaptive(&self) -> bool {
        matches!(self, SourceFormat::Hls)
    }

    /// Infer the format from a URL's extension
    pub fn from_url(url: &str) -> Option<Self> {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_lowercase(),
            // Relative URL: drop query and fragment by hand
            Err(_) => url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_lowercase(),
        };

        if path.ends_with(".m3u8") || path.ends_with(".m3u") {
            Some(SourceFormat::Hls)
        } else if path.ends_with(".mpd") {
            Some(SourceFormat::Dash)
        } else if path.ends_with(".mp4") || path.ends_with(".m4v") {
            Some(SourceFormat::Mp4)
        } else if path.ends_with(".webm") {
            Some(SourceFormat::Webm)
        } else if path.ends_with(".ogv") || path.ends_with(".ogg") {
            Some(SourceFormat::Ogg)
        } else {
            None
        }
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hls" | "m3u8" | "application/x-mpegurl" | "application/vnd.apple.mpegurl" => {
                Ok(SourceFormat::Hls)
            }
            "dash" | "mpd" | "application/dash+xml" => Ok(SourceFormat::Dash),
            "mp4" | "video/mp4" => Ok(SourceFormat::Mp4),
            "webm" | "video/webm" => Ok(SourceFormat::Webm),
            "ogg" | "video/ogg" => Ok(SourceFormat::Ogg),
            other => Err(format!("unsupported source format '{}'", other)),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single playable source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSource {
    /// Source URL (absolute or relative)
    pub url: String,
    /// Format tag, validated against [`SourceFormat`]
    #[serde(rename = "type")]
    pub format: String,
    /// Quality tag for progressive sources (e.g. "720p")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl VideoSource {
    pub fn new(url: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            url: url.into(),
            format: format.as_str().to_string(),
            quality: None,
            label: None,
        }
    }

    /// Build a source whose format is inferred from the URL
    pub fn from_url(url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        let format = SourceFormat::from_url(&url)?;
        Some(Self::new(url, format))
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Parsed format tag, `None` when the tag is not supported
    pub fn source_format(&self) -> Option<SourceFormat> {
        self.format.parse().ok()
    }

    pub fn is_adaptive(&self) -> bool {
        self.source_format().is_some_and(|f| f.is_adaptive())
    }
}

/// Preload hint for the media element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    #[default]
    Metadata,
    Auto,
}

/// CORS mode for the media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOrigin {
    Anonymous,
    UseCredentials,
}

/// Declared source configuration for a player
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Candidate sources, at least one required
    pub sources: Vec<VideoSource>,
    /// Poster image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preload: Option<Preload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<CrossOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plays_inline: Option<bool>,
    /// Initial volume (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_volume: Option<f64>,
    /// Initial playback rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_rate: Option<f64>,
    /// Position (seconds) applied once metadata is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_position: Option<f64>,
    /// Declared quality tags for progressive sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualities: Option<Vec<String>>,
    /// Overrides for the embedded streaming engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_options: Option<StreamingOptions>,
}

impl SourceConfig {
    /// Create a configuration from a list of sources
    pub fn new(sources: Vec<VideoSource>) -> Self {
        Self {
            sources,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON; `null` or blank input is rejected
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: Option<SourceConfig> = if json.trim().is_empty() {
            None
        } else {
            serde_json::from_str(json)?
        };
        config.ok_or_else(|| crate::Error::InvalidConfig("configuration is required".to_string()))
    }

    pub fn with_source(mut self, source: VideoSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_streaming_options(mut self, options: StreamingOptions) -> Self {
        self.streaming_options = Some(options);
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = Some(autoplay);
        self
    }

    pub fn with_initial_position(mut self, position: f64) -> Self {
        self.initial_position = Some(position);
        self
    }

    /// First source tagged with the adaptive format
    pub fn adaptive_source(&self) -> Option<&VideoSource> {
        self.sources.iter().find(|s| s.is_adaptive())
    }

    /// First source tagged as DASH
    pub fn dash_source(&self) -> Option<&VideoSource> {
        self.sources
            .iter()
            .find(|s| s.source_format() == Some(SourceFormat::Dash))
    }
}

// =============================================================================
// Metadata and Stats
// =============================================================================

/// Network state of the media element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkState {
    #[default]
    Empty = 0,
    Idle = 1,
    Loading = 2,
    NoSource = 3,
}

/// Ready state of the media element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadyState {
    #[default]
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

/// A contiguous time range in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Snapshot of the element's media metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Duration in seconds (NaN until known, infinite for live)
    pub duration: f64,
    /// Intrinsic video width
    pub video_width: u32,
    /// Intrinsic video height
    pub video_height: u32,
    pub buffered: Vec<TimeRange>,
    pub seekable: Vec<TimeRange>,
    pub played: Vec<TimeRange>,
    pub network_state: NetworkState,
    pub ready_state: ReadyState,
}

impl Metadata {
    /// End of the last buffered range
    pub fn buffered_end(&self) -> Option<f64> {
        self.buffered.last().map(|r| r.end)
    }
}

/// Running playback statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Seconds from loadstart to loadeddata, summed over loads
    pub load_time: f64,
    /// Seconds spent playing
    pub play_time: f64,
    /// Seconds spent paused
    pub pause_time: f64,
    pub seek_count: u32,
    /// Fatal errors observed
    pub error_count: u32,
    pub quality_changes: u32,
    pub buffering_events: u32,
}

// =============================================================================
// Quality Levels
// =============================================================================

/// Returns the canonical rung for an intrinsic height
pub fn rung_for_height(height: u32) -> &'static str {
    match height {
        0..=240 => "240p",
        241..=360 => "360p",
        361..=480 => "480p",
        481..=720 => "720p",
        721..=1080 => "1080p",
        1081..=1440 => "1440p",
        _ => "2160p",
    }
}

/// A discovered rendition of an adaptive stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityLevel {
    /// Bandwidth in bits per second
    pub bitrate: u64,
    pub width: u32,
    pub height: u32,
    /// Index in the engine's level list
    pub level_index: usize,
    /// Canonical rung name
    pub name: String,
}

impl QualityLevel {
    pub fn new(level_index: usize, bitrate: u64, width: u32, height: u32) -> Self {
        Self {
            bitrate,
            width,
            height,
            level_index,
            name: rung_for_height(height).to_string(),
        }
    }
}

// =============================================================================
// Errors on the event stream
// =============================================================================

/// Canonical error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Network,
    Decode,
    UnsupportedSource,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Decode => write!(f, "decode"),
            ErrorCategory::UnsupportedSource => write!(f, "unsupported-source"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// Error surfaced through the `error` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackError {
    pub category: ErrorCategory,
    /// Machine-readable code (e.g. "MEDIA_ERR_DECODE")
    pub code: String,
    pub message: String,
    /// Fatal errors drive recovery; others are reported only
    pub fatal: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl PlaybackError {
    pub fn new(
        category: ErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
        fatal: bool,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            fatal,
            timestamp: Utc::now(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.category, self.code, self.message)
    }
}

// =============================================================================
// Canonical Events
// =============================================================================

/// Closed set of event names on the canonical event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerEventKind {
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
    TimeUpdate,
    Progress,
    VolumeChange,
    RateChange,
    Ended,
    Error,
    QualityChange,
    FullscreenChange,
    Pip,
    Buffering,
    Ready,
}

impl PlayerEventKind {
    pub const ALL: [PlayerEventKind; 22] = [
        PlayerEventKind::LoadStart,
        PlayerEventKind::LoadedMetadata,
        PlayerEventKind::LoadedData,
        PlayerEventKind::CanPlay,
        PlayerEventKind::CanPlayThrough,
        PlayerEventKind::Play,
        PlayerEventKind::Playing,
        PlayerEventKind::Pause,
        PlayerEventKind::Seeking,
        PlayerEventKind::Seeked,
        PlayerEventKind::Waiting,
        PlayerEventKind::TimeUpdate,
        PlayerEventKind::Progress,
        PlayerEventKind::VolumeChange,
        PlayerEventKind::RateChange,
        PlayerEventKind::Ended,
        PlayerEventKind::Error,
        PlayerEventKind::QualityChange,
        PlayerEventKind::FullscreenChange,
        PlayerEventKind::Pip,
        PlayerEventKind::Buffering,
        PlayerEventKind::Ready,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerEventKind::LoadStart => "loadstart",
            PlayerEventKind::LoadedMetadata => "loadedmetadata",
            PlayerEventKind::LoadedData => "loadeddata",
            PlayerEventKind::CanPlay => "canplay",
            PlayerEventKind::CanPlayThrough => "canplaythrough",
            PlayerEventKind::Play => "play",
            PlayerEventKind::Playing => "playing",
            PlayerEventKind::Pause => "pause",
            PlayerEventKind::Seeking => "seeking",
            PlayerEventKind::Seeked => "seeked",
            PlayerEventKind::Waiting => "waiting",
            PlayerEventKind::TimeUpdate => "timeupdate",
            PlayerEventKind::Progress => "progress",
            PlayerEventKind::VolumeChange => "volumechange",
            PlayerEventKind::RateChange => "ratechange",
            PlayerEventKind::Ended => "ended",
            PlayerEventKind::Error => "error",
            PlayerEventKind::QualityChange => "qualitychange",
            PlayerEventKind::FullscreenChange => "fullscreenchange",
            PlayerEventKind::Pip => "pip",
            PlayerEventKind::Buffering => "buffering",
            PlayerEventKind::Ready => "ready",
        }
    }
}

impl std::fmt::Display for PlayerEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an adaptive stream is being delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// The element plays the segmented stream itself
    Native,
    /// The embedded streaming engine feeds the element
    Engine,
}

/// Canonical event with its typed payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "lowercase")]
pub enum PlayerEvent {
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
    TimeUpdate,
    Progress { loaded: f64, total: f64 },
    VolumeChange { volume: f64, muted: bool },
    RateChange { rate: f64 },
    Ended,
    Error(PlaybackError),
    QualityChange { from: String, to: String },
    FullscreenChange { fullscreen: bool },
    Pip { active: bool },
    Buffering {
        #[serde(rename = "isBuffering")]
        is_buffering: bool,
        #[serde(rename = "bufferLevel")]
        buffer_level: f64,
    },
    Ready { mode: StreamMode },
}

impl PlayerEvent {
    /// The event name this payload is keyed by
    pub fn kind(&self) -> PlayerEventKind {
        match self {
            PlayerEvent::LoadStart => PlayerEventKind::LoadStart,
            PlayerEvent::LoadedMetadata => PlayerEventKind::LoadedMetadata,
            PlayerEvent::LoadedData => PlayerEventKind::LoadedData,
            PlayerEvent::CanPlay => PlayerEventKind::CanPlay,
            PlayerEvent::CanPlayThrough => PlayerEventKind::CanPlayThrough,
            PlayerEvent::Play => PlayerEventKind::Play,
            PlayerEvent::Playing => PlayerEventKind::Playing,
            PlayerEvent::Pause => PlayerEventKind::Pause,
            PlayerEvent::Seeking => PlayerEventKind::Seeking,
            PlayerEvent::Seeked => PlayerEventKind::Seeked,
            PlayerEvent::Waiting => PlayerEventKind::Waiting,
            PlayerEvent::TimeUpdate => PlayerEventKind::TimeUpdate,
            PlayerEvent::Progress { .. } => PlayerEventKind::Progress,
            PlayerEvent::VolumeChange { .. } => PlayerEventKind::VolumeChange,
            PlayerEvent::RateChange { .. } => PlayerEventKind::RateChange,
            PlayerEvent::Ended => PlayerEventKind::Ended,
            PlayerEvent::Error(_) => PlayerEventKind::Error,
            PlayerEvent::QualityChange { .. } => PlayerEventKind::QualityChange,
            PlayerEvent::FullscreenChange { .. } => PlayerEventKind::FullscreenChange,
            PlayerEvent::Pip { .. } => PlayerEventKind::Pip,
            PlayerEvent::Buffering { .. } => PlayerEventKind::Buffering,
            PlayerEvent::Ready { .. } => PlayerEventKind::Ready,
        }
    }
}

/// Event record delivered to listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    /// Playback position when the event was synthesized
    pub current_time: f64,
    pub duration: f64,
    #[serde(flatten)]
    pub event: PlayerEvent,
}

impl EventRecord {
    pub fn new(event: PlayerEvent, current_time: f64, duration: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            current_time,
            duration,
            event,
        }
    }

    pub fn event_name(&self) -> PlayerEventKind {
        self.event.kind()
    }
}
