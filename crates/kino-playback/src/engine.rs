//! Embedded streaming engine seam
//!
//! Segment fetching, demuxing and buffer appends belong to an external
//! segmented-stream engine (hls.js in a browser, a native HLS stack on
//! desktop). The adaptive controller talks to it through [`StreamingEngine`],
//! builds it through an [`EngineProvider`], and is fed its signals as
//! [`EngineEvent`]s.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Level index that hands selection to the engine's ABR heuristic
pub const AUTO_LEVEL: i32 = -1;

/// Handle to a live streaming engine instance
pub trait StreamingEngine: Send {
    /// Start loading a manifest
    fn load_source(&mut self, url: &str) -> Result<()>;

    /// Bind the engine to the controller's media element
    fn attach_media(&mut self);

    /// Resume fragment loading, from `position` when given
    fn start_load(&mut self, position: Option<f64>);

    fn stop_load(&mut self);

    /// Rebuild the decode pipeline in place after a media error
    fn recover_media_error(&mut self);

    /// Currently selected level, [`AUTO_LEVEL`] when the engine decides
    fn current_level(&self) -> i32;

    /// Force a level, or [`AUTO_LEVEL`] for automatic selection
    fn set_current_level(&mut self, level: i32);

    /// Release every resource held by the engine
    fn destroy(&mut self);
}

/// Factory and capability check for streaming engines
pub trait EngineProvider: Send + Sync {
    /// Whether the engine can run on this platform
    fn is_supported(&self) -> bool;

    /// Build a new engine instance
    fn create(&self, config: &EngineConfig) -> Result<Box<dyn StreamingEngine>>;
}

/// Provider for platforms without an embedded engine
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEngine;

impl EngineProvider for NoEngine {
    fn is_supported(&self) -> bool {
        false
    }

    fn create(&self, _config: &EngineConfig) -> Result<Box<dyn StreamingEngine>> {
        Err(crate::Error::engine("no streaming engine available"))
    }
}

/// A rendition as listed in the engine's parsed manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLevel {
    /// Bandwidth in bits per second
    pub bitrate: u64,
    pub width: u32,
    pub height: u32,
}

impl EngineLevel {
    pub fn new(bitrate: u64, width: u32, height: u32) -> Self {
        Self { bitrate, width, height }
    }
}

/// Fault families reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorType {
    /// Manifest, playlist or fragment loading
    Network,
    /// Media pipeline (buffer append, decode)
    Media,
    /// Transmuxing
    Mux,
    /// Key system / encrypted media
    KeySystem,
    Other,
}

impl EngineErrorType {
    /// Error type name as reported by the engine
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineErrorType::Network => "networkError",
            EngineErrorType::Media => "mediaError",
            EngineErrorType::Mux => "muxError",
            EngineErrorType::KeySystem => "keySystemError",
            EngineErrorType::Other => "otherError",
        }
    }
}

/// Signals raised by the streaming engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    MediaAttached,
    /// Manifest loaded (or reloaded) with its renditions
    ManifestParsed { levels: Vec<EngineLevel> },
    /// Rendition list changed without a new manifest
    LevelsUpdated { levels: Vec<EngineLevel> },
    /// The engine switched renditions
    LevelSwitched { level: usize },
    BufferAppending,
    BufferAppended,
    Error {
        error_type: EngineErrorType,
        details: String,
        fatal: bool,
    },
}

/// Caller-supplied engine overrides; unset fields keep the defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_buffer_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_max_buffer_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_buffer_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_buffer_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frag_loading_max_retry: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frag_loading_retry_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_loading_max_retry: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_loading_retry_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_loading_max_retry: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_loading_retry_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_worker: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_latency_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_level_to_player_size: Option<bool>,
    /// Engine-specific keys passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

macro_rules! overlay {
    ($target:expr, $source:expr, $wrap:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $source.$field {
                $target.$field = $wrap(value);
            }
        )+
    };
}

impl StreamingOptions {
    /// True when no option is set
    pub fn is_empty(&self) -> bool {
        *self == StreamingOptions::default()
    }

    /// Overlay `other` onto `self`; fields set in `other` win
    pub fn merge(&mut self, other: &StreamingOptions) {
        overlay!(self, other, Some;
            max_buffer_length,
            max_max_buffer_length,
            back_buffer_length,
            max_buffer_size,
            frag_loading_max_retry,
            frag_loading_retry_delay,
            manifest_loading_max_retry,
            manifest_loading_retry_delay,
            level_loading_max_retry,
            level_loading_retry_delay,
            enable_worker,
            low_latency_mode,
            start_level,
            cap_level_to_player_size,
        );
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Resolved engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Target forward buffer (seconds)
    pub max_buffer_length: f64,
    /// Hard ceiling on forward buffer (seconds)
    pub max_max_buffer_length: f64,
    /// Buffer kept behind the playhead (seconds)
    pub back_buffer_length: f64,
    /// Buffer size ceiling (bytes)
    pub max_buffer_size: u64,
    pub frag_loading_max_retry: u32,
    /// Retry delay in milliseconds
    pub frag_loading_retry_delay: u64,
    pub manifest_loading_max_retry: u32,
    pub manifest_loading_retry_delay: u64,
    pub level_loading_max_retry: u32,
    pub level_loading_retry_delay: u64,
    /// Transmux in a worker when available
    pub enable_worker: bool,
    pub low_latency_mode: bool,
    /// Initial level, -1 lets the engine pick
    pub start_level: i32,
    pub cap_level_to_player_size: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_buffer_length: 30.0,
            max_max_buffer_length: 600.0,
            back_buffer_length: 90.0,
            max_buffer_size: 60 * 1000 * 1000, // 60 MB
            frag_loading_max_retry: 6,
            frag_loading_retry_delay: 1000,
            manifest_loading_max_retry: 4,
            manifest_loading_retry_delay: 1000,
            level_loading_max_retry: 4,
            level_loading_retry_delay: 1000,
            enable_worker: true,
            low_latency_mode: false,
            start_level: AUTO_LEVEL,
            cap_level_to_player_size: false,
            extra: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Defaults with caller overrides applied
    pub fn merged(&self, options: &StreamingOptions) -> EngineConfig {
        let mut config = self.clone();
        overlay!(config, options, std::convert::identity;
            max_buffer_length,
            max_max_buffer_length,
            back_buffer_length,
            max_buffer_size,
            frag_loading_max_retry,
            frag_loading_retry_delay,
            manifest_loading_max_retry,
            manifest_loading_retry_delay,
            level_loading_max_retry,
            level_loading_retry_delay,
            enable_worker,
            low_latency_mode,
            start_level,
            cap_level_to_player_size,
        );
        for (key, value) in &options.extra {
            config.extra.insert(key.clone(), value.clone());
        }
        config
    }

    /// Configuration tuned for low-latency live streams
    pub fn low_latency() -> Self {
        Self {
            max_buffer_length: 6.0,
            back_buffer_length: 30.0,
            low_latency_mode: true,
            ..Default::default()
        }
    }

    /// Engine configuration for a set of caller options
    ///
    /// `lowLatencyMode: true` starts from the low-latency profile, everything
    /// else from the defaults. Explicit options win either way.
    pub fn for_options(options: &StreamingOptions) -> Self {
        let base = match options.low_latency_mode {
            Some(true) => Self::low_latency(),
            _ => Self::default(),
        };
        base.merged(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_empty() {
        assert!(StreamingOptions::default().is_empty());

        let options = StreamingOptions {
            enable_worker: Some(false),
            ..Default::default()
        };
        assert!(!options.is_empty());

        let mut passthrough = StreamingOptions::default();
        passthrough
            .extra
            .insert("debug".to_string(), serde_json::Value::Bool(true));
        assert!(!passthrough.is_empty());
    }

    #[test]
    fn test_config_merge_overrides_defaults() {
        let options = StreamingOptions {
            max_buffer_length: Some(12.0),
            frag_loading_max_retry: Some(2),
            enable_worker: Some(false),
            ..Default::default()
        };

        let config = EngineConfig::default().merged(&options);
        assert_eq!(config.max_buffer_length, 12.0);
        assert_eq!(config.frag_loading_max_retry, 2);
        assert!(!config.enable_worker);
        // Untouched fields keep their defaults
        assert_eq!(config.max_max_buffer_length, 600.0);
        assert_eq!(config.start_level, AUTO_LEVEL);
    }

    #[test]
    fn test_low_latency_profile_selected_by_options() {
        let live = EngineConfig::for_options(&StreamingOptions {
            low_latency_mode: Some(true),
            back_buffer_length: Some(10.0),
            ..Default::default()
        });
        assert!(live.low_latency_mode);
        assert_eq!(live.max_buffer_length, 6.0);
        assert_eq!(live.back_buffer_length, 10.0);

        let vod = EngineConfig::for_options(&StreamingOptions::default());
        assert_eq!(vod, EngineConfig::default());
    }

    #[test]
    fn test_options_merge_later_wins() {
        let mut options = StreamingOptions {
            max_buffer_length: Some(20.0),
            low_latency_mode: Some(true),
            ..Default::default()
        };
        options.merge(&StreamingOptions {
            max_buffer_length: Some(40.0),
            ..Default::default()
        });

        assert_eq!(options.max_buffer_length, Some(40.0));
        assert_eq!(options.low_latency_mode, Some(true));
    }

    #[test]
    fn test_options_json_passthrough() {
        let options: StreamingOptions =
            serde_json::from_str(r#"{ "maxBufferLength": 10, "abrEwmaDefaultEstimate": 500000 }"#)
                .unwrap();
        assert_eq!(options.max_buffer_length, Some(10.0));
        assert!(options.extra.contains_key("abrEwmaDefaultEstimate"));

        let config = EngineConfig::default().merged(&options);
        assert_eq!(config.extra["abrEwmaDefaultEstimate"], 500000);
    }
}
