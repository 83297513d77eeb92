//! Source configuration validation
//!
//! Runs at the factory boundary, before any element or engine is touched.

use crate::{
    types::{SourceConfig, SourceFormat},
    Error, Result,
};
use tracing::debug;

/// Check that a configuration can build a player
pub fn validate_config(config: &SourceConfig) -> Result<()> {
    if config.sources.is_empty() {
        return Err(Error::InvalidConfig(
            "at least one source is required".to_string(),
        ));
    }

    for (index, source) in config.sources.iter().enumerate() {
        if source.url.trim().is_empty() {
            return Err(Error::InvalidConfig(format!("source {} has an empty url", index)));
        }
        if source.format.parse::<SourceFormat>().is_err() {
            return Err(Error::InvalidConfig(format!(
                "source {} has unsupported type '{}'",
                index, source.format
            )));
        }
    }

    if let Some(volume) = config.initial_volume {
        if volume.is_nan() {
            return Err(Error::InvalidConfig("initialVolume must be a number".to_string()));
        }
    }

    debug!(sources = config.sources.len(), "Configuration validated");
    Ok(())
}

/// Additional requirements for the adaptive stream controller
pub fn validate_adaptive(config: &SourceConfig) -> Result<()> {
    validate_config(config)?;

    if config.adaptive_source().is_none() {
        return Err(Error::UnsupportedSource(
            "adaptive playback requires an hls source".to_string(),
        ));
    }

    match &config.streaming_options {
        Some(options) if !options.is_empty() => Ok(()),
        _ => Err(Error::UnsupportedSource(
            "adaptive playback requires streaming engine options".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StreamingOptions;
    use crate::types::VideoSource;

    fn hls_config() -> SourceConfig {
        SourceConfig::new(vec![VideoSource::new(
            "https://cdn.example.com/master.m3u8",
            SourceFormat::Hls,
        )])
        .with_streaming_options(StreamingOptions {
            max_buffer_length: Some(20.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_sources_rejected() {
        let err = validate_config(&SourceConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_blank_url_rejected() {
        let config = SourceConfig::new(vec![VideoSource::new("  ", SourceFormat::Mp4)]);
        assert!(matches!(validate_config(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut source = VideoSource::new("https://cdn.example.com/clip.flv", SourceFormat::Mp4);
        source.format = "flv".to_string();
        let config = SourceConfig::new(vec![source]);
        assert!(matches!(validate_config(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_adaptive_requires_options() {
        assert!(validate_adaptive(&hls_config()).is_ok());

        let mut config = hls_config();
        config.streaming_options = None;
        assert!(matches!(validate_adaptive(&config), Err(Error::UnsupportedSource(_))));

        config.streaming_options = Some(StreamingOptions::default());
        assert!(matches!(validate_adaptive(&config), Err(Error::UnsupportedSource(_))));
    }

    #[test]
    fn test_adaptive_requires_hls_source() {
        let config = SourceConfig::new(vec![VideoSource::new(
            "https://cdn.example.com/clip.mp4",
            SourceFormat::Mp4,
        )])
        .with_streaming_options(StreamingOptions {
            enable_worker: Some(true),
            ..Default::default()
        });
        assert!(matches!(validate_adaptive(&config), Err(Error::UnsupportedSource(_))));
    }
}
