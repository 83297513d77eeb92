//! CLI command implementations

use crate::output::{self, OutputFormat, SourceRow, ValidationReport};
use anyhow::{anyhow, bail, Context};
use kino_playback::{
    engine::EngineErrorType,
    simulated::{levels_from_master_playlist, SimulatedElement, SimulatedEngineProvider},
    validate_adaptive, validate_config, AdaptiveStreamController, EngineConfig, EngineEvent,
    EngineLevel, MediaError, MediaErrorCode, NativeEvent, Player, PlayerEventKind, PlayerFactory,
    PlayerKind, PlayerRegistry, RecoveryPolicy, SourceConfig, StreamMode, StreamingOptions,
    VideoSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Load a configuration file, or build a single-source configuration from a URL
fn load_config(input: &str) -> anyhow::Result<SourceConfig> {
    let path = Path::new(input);
    if path.is_file() {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", input))?;
        return Ok(SourceConfig::from_json(&json)?);
    }

    let source = VideoSource::from_url(input)
        .ok_or_else(|| anyhow!("'{}' is neither a configuration file nor a media URL", input))?;
    let mut config = SourceConfig::new(vec![source]);

    // Adaptive playback needs engine options; start from the built-in buffer target
    if config.adaptive_source().is_some() {
        config.streaming_options = Some(StreamingOptions {
            max_buffer_length: Some(EngineConfig::default().max_buffer_length),
            ..Default::default()
        });
    }
    Ok(config)
}

fn read_levels(path: &Path) -> anyhow::Result<Vec<EngineLevel>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read playlist {}", path.display()))?;
    let levels = levels_from_master_playlist(&content)?;
    if levels.is_empty() {
        bail!("Playlist {} lists no variants", path.display());
    }
    Ok(levels)
}

/// Typical five-rung ladder used when no playlist is given
fn default_ladder() -> Vec<EngineLevel> {
    vec![
        EngineLevel::new(400_000, 426, 240),
        EngineLevel::new(800_000, 640, 360),
        EngineLevel::new(1_400_000, 854, 480),
        EngineLevel::new(2_800_000, 1280, 720),
        EngineLevel::new(5_000_000, 1920, 1080),
    ]
}

fn parse_fault(name: &str) -> anyhow::Result<EngineErrorType> {
    match name.to_lowercase().as_str() {
        "network" => Ok(EngineErrorType::Network),
        "media" | "decode" => Ok(EngineErrorType::Media),
        "mux" => Ok(EngineErrorType::Mux),
        "key-system" | "keysystem" => Ok(EngineErrorType::KeySystem),
        "other" => Ok(EngineErrorType::Other),
        other => bail!("Unknown fault '{}' (expected network, media, mux, key-system, other)", other),
    }
}

/// Validate a configuration
pub fn validate(input: &str, format: &str) -> anyhow::Result<()> {
    let config = load_config(input)?;
    validate_config(&config)?;

    let kind = PlayerFactory::select_kind(&config);
    let engine_config = if kind == PlayerKind::Adaptive {
        validate_adaptive(&config)?;
        config
            .streaming_options
            .as_ref()
            .map(EngineConfig::for_options)
    } else {
        None
    };

    let report = ValidationReport {
        kind,
        sources: config.sources.iter().map(SourceRow::from).collect(),
        engine_config,
    };
    output::print_validation(&report, OutputFormat::from(format));
    Ok(())
}

/// Show the quality ladder a master playlist yields
pub fn qualities(playlist: &Path, format: &str) -> anyhow::Result<()> {
    let levels = read_levels(playlist)?;

    // Run the ladder through a controller so ordering matches playback
    let config = SourceConfig::new(vec![VideoSource::new(
        playlist.display().to_string(),
        kino_playback::SourceFormat::Hls,
    )])
    .with_streaming_options(StreamingOptions {
        start_level: Some(kino_playback::engine::AUTO_LEVEL),
        ..Default::default()
    });
    let mut controller = AdaptiveStreamController::new(
        SimulatedElement::new(),
        config,
        Arc::new(SimulatedEngineProvider::new()),
        RecoveryPolicy::default(),
    )?;
    controller.load()?;
    controller.handle_engine_event(EngineEvent::ManifestParsed { levels })?;

    output::print_levels(controller.levels(), OutputFormat::from(format));
    controller.destroy();
    Ok(())
}

/// Options for a simulated session
pub struct SimulateOptions {
    pub playlist: Option<PathBuf>,
    pub fault: Option<String>,
    pub native_hls: bool,
    pub duration: f64,
    pub escalate_after: Option<u32>,
}

fn pump(player: &mut Player<SimulatedElement>, element: &SimulatedElement) -> anyhow::Result<()> {
    for signal in element.take_signals() {
        player.handle_native_event(signal)?;
    }
    Ok(())
}

fn raise(
    player: &mut Player<SimulatedElement>,
    element: &SimulatedElement,
    signals: &[NativeEvent],
) -> anyhow::Result<()> {
    for &signal in signals {
        element.raise(signal);
    }
    pump(player, element)
}

/// Drive a scripted playback session and print the canonical event stream
pub async fn simulate(input: &str, options: SimulateOptions, format: &str) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);
    let config = load_config(input)?;
    let levels = match &options.playlist {
        Some(path) => read_levels(path)?,
        None => default_ladder(),
    };
    let fault = options.fault.as_deref().map(parse_fault).transpose()?;
    if !options.duration.is_finite() || options.duration <= 0.0 {
        bail!("Duration must be a positive number of seconds");
    }

    let provider = Arc::new(SimulatedEngineProvider::new());
    let factory = PlayerFactory::new(provider.clone()).with_recovery_policy(RecoveryPolicy {
        escalate_after: options.escalate_after,
    });
    let element = SimulatedElement::new();
    element.set_native_hls(options.native_hls);

    let mut player = factory.build(element.clone(), config)?;
    output::print_header(&player, format);

    player.emitter().set_max_listeners(PlayerEventKind::ALL.len());
    for kind in PlayerEventKind::ALL {
        player.on(kind, move |record| {
            output::print_event(record, format);
            Ok(())
        });
    }

    // Source selection
    player.load()?;
    pump(&mut player, &element)?;
    let engine_mode = player.adaptive_controller().and_then(|c| c.mode()) == Some(StreamMode::Engine);
    if engine_mode {
        player.handle_engine_event(EngineEvent::MediaAttached)?;
        player.handle_engine_event(EngineEvent::ManifestParsed {
            levels: levels.clone(),
        })?;
    }

    element.load_media(options.duration, 1920, 1080);
    raise(
        &mut player,
        &element,
        &[
            NativeEvent::LoadedMetadata,
            NativeEvent::LoadedData,
            NativeEvent::CanPlay,
            NativeEvent::CanPlayThrough,
        ],
    )?;

    if let Err(e) = player.play().await {
        warn!(error = %e, "Initial play rejected");
    }
    pump(&mut player, &element)?;

    let step = options.duration / 8.0;
    let mut position = 0.0;
    for tick in 1..=4 {
        position += step;
        element.set_position(position);
        element.set_buffered(vec![(0.0, (position + 10.0).min(options.duration))]);
        if engine_mode {
            player.handle_engine_event(EngineEvent::BufferAppending)?;
            player.handle_engine_event(EngineEvent::BufferAppended)?;
        }
        player.handle_native_event(NativeEvent::TimeUpdate)?;

        if tick == 2 {
            // Step down one rung below the top
            if let Some(quality) = player.get_available_qualities().get(2).cloned() {
                info!(quality = %quality, "Switching quality");
                player.set_quality(&quality);
            }
        }

        if tick == 3 {
            if let Some(error_type) = fault {
                inject_fault(&mut player, &element, error_type, engine_mode, &levels)?;
            }
        }
    }

    player.pause();
    player.seek(options.duration / 2.0);
    pump(&mut player, &element)?;

    if let Err(e) = player.play().await {
        warn!(error = %e, "Resume rejected");
    }
    pump(&mut player, &element)?;

    element.set_position(options.duration);
    raise(&mut player, &element, &[NativeEvent::Ended])?;

    output::print_stats(player.stats(), format);

    let mut registry = PlayerRegistry::new();
    registry.insert(player);
    output::print_registry(&registry.stats(), format);
    registry.destroy_all();

    let journal = provider.journal();
    info!(
        engines = journal.created,
        recoveries = journal.recover_media_calls,
        restarts = journal.start_loads.len(),
        "Session finished"
    );
    Ok(())
}

fn inject_fault(
    player: &mut Player<SimulatedElement>,
    element: &SimulatedElement,
    error_type: EngineErrorType,
    engine_mode: bool,
    levels: &[EngineLevel],
) -> anyhow::Result<()> {
    if !engine_mode {
        // Without an engine the fault surfaces as a media error on the element
        element.set_error(Some(MediaError::new(
            MediaErrorCode::Network,
            format!("injected {} fault", error_type.as_str()),
        )));
        return raise(player, element, &[NativeEvent::Error]);
    }

    player.handle_engine_event(EngineEvent::Error {
        error_type,
        details: format!("injected {} fault", error_type.as_str()),
        fatal: true,
    })?;

    // A rebuilt engine reparses the manifest before the stream is playable
    if matches!(
        error_type,
        EngineErrorType::Mux | EngineErrorType::KeySystem | EngineErrorType::Other
    ) {
        player.handle_engine_event(EngineEvent::ManifestParsed {
            levels: levels.to_vec(),
        })?;
    }
    raise(player, element, &[NativeEvent::CanPlay])
}
