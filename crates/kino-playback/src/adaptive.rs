//! Adaptive Stream Controller - segmented stream playback
//!
//! Layers over a [`MediaStateWrapper`] and coordinates:
//! - Capability probing (native playback vs embedded engine)
//! - Quality ladder discovery and level selection
//! - Buffering telemetry from the engine
//! - Fault classification and recovery

use crate::{
    element::{MediaElement, NativeEvent},
    engine::{
        EngineConfig, EngineErrorType, EngineEvent, EngineLevel, EngineProvider, StreamingEngine,
        StreamingOptions, AUTO_LEVEL,
    },
    types::*,
    validation::validate_adaptive,
    wrapper::{ControlFuture, MediaStateWrapper},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// How a segmented stream can be played on this host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCapability {
    /// The element plays the stream itself
    Native,
    /// The embedded engine is available
    Engine,
    Unsupported,
}

impl StreamCapability {
    /// Checked in priority order: native, then engine
    pub fn detect<E: MediaElement>(element: &E, provider: &dyn EngineProvider) -> Self {
        if element
            .can_play_type(SourceFormat::Hls.mime_type())
            .is_playable()
        {
            StreamCapability::Native
        } else if provider.is_supported() {
            StreamCapability::Engine
        } else {
            StreamCapability::Unsupported
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, StreamCapability::Unsupported)
    }
}

/// How repeated fatal faults are handled while a recovery is pending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryPolicy {
    /// Consecutive unrecovered fatal faults that force a full reinitialization.
    /// `None` never escalates.
    pub escalate_after: Option<u32>,
}

impl RecoveryPolicy {
    pub fn escalate_after(faults: u32) -> Self {
        Self {
            escalate_after: Some(faults),
        }
    }
}

/// Position and play state to restore after an engine rebuild
#[derive(Debug, Clone, Copy)]
struct PendingResume {
    position: f64,
    was_playing: bool,
}

/// Controller for HLS-style adaptive sources
pub struct AdaptiveStreamController<E: MediaElement> {
    wrapper: MediaStateWrapper<E>,
    provider: Arc<dyn EngineProvider>,
    engine: Option<Box<dyn StreamingEngine>>,
    options: StreamingOptions,
    engine_config: EngineConfig,
    policy: RecoveryPolicy,
    source: VideoSource,
    mode: Option<StreamMode>,
    /// Discovered renditions, highest first
    levels: Vec<QualityLevel>,
    /// Category of the fault whose recovery is in flight
    recovering: Option<ErrorCategory>,
    unrecovered_faults: u32,
    pending_resume: Option<PendingResume>,
    resume_play: Option<ControlFuture>,
    loaded: bool,
    destroyed: bool,
}

impl<E: MediaElement> AdaptiveStreamController<E> {
    /// Validate the configuration and wrap the element
    ///
    /// Fails with [`Error::UnsupportedSource`] when the configuration has no
    /// adaptive source or no streaming options. Nothing is attached until
    /// [`AdaptiveStreamController::load`].
    pub fn new(
        element: E,
        config: SourceConfig,
        provider: Arc<dyn EngineProvider>,
        policy: RecoveryPolicy,
    ) -> Result<Self> {
        validate_adaptive(&config)?;

        let source = config
            .adaptive_source()
            .cloned()
            .ok_or_else(|| Error::UnsupportedSource("no adaptive source".to_string()))?;
        let options = config.streaming_options.clone().unwrap_or_default();
        let engine_config = EngineConfig::for_options(&options);

        Ok(Self {
            wrapper: MediaStateWrapper::new(element, config),
            provider,
            engine: None,
            options,
            engine_config,
            policy,
            source,
            mode: None,
            levels: Vec::new(),
            recovering: None,
            unrecovered_faults: 0,
            pending_resume: None,
            resume_play: None,
            loaded: false,
            destroyed: false,
        })
    }

    /// Detect host support and start delivering the stream
    ///
    /// Native hosts get the URL attached and a `ready` event right away. With
    /// the engine, `ready` follows the manifest. A host with neither reports a
    /// non-fatal `unsupported-source` error. Later calls are no-ops.
    #[instrument(skip(self), fields(url = %self.source.url))]
    pub fn load(&mut self) -> Result<()> {
        if self.destroyed {
            return Err(Error::Destroyed);
        }
        if self.loaded {
            debug!("Stream already loaded");
            return Ok(());
        }
        self.loaded = true;
        self.initialize()
    }

    fn initialize(&mut self) -> Result<()> {
        let capability = StreamCapability::detect(self.wrapper.element(), self.provider.as_ref());
        info!(url = %self.source.url, capability = ?capability, "Initializing adaptive stream");

        match capability {
            StreamCapability::Native => {
                self.mode = Some(StreamMode::Native);
                self.wrapper.attach_source(&self.source);
                self.wrapper.publish(PlayerEvent::Ready {
                    mode: StreamMode::Native,
                });
                Ok(())
            }
            StreamCapability::Engine => self.start_engine(),
            StreamCapability::Unsupported => {
                self.mode = None;
                self.wrapper.report_error(PlaybackError::new(
                    ErrorCategory::UnsupportedSource,
                    "STREAM_UNSUPPORTED",
                    "segmented streams are not supported on this platform",
                    false,
                ));
                Ok(())
            }
        }
    }

    fn start_engine(&mut self) -> Result<()> {
        let mut engine = self.provider.create(&self.engine_config)?;
        engine.attach_media();
        engine.load_source(&self.source.url)?;

        debug!(config = ?self.engine_config, "Streaming engine started");
        self.engine = Some(engine);
        self.mode = Some(StreamMode::Engine);
        Ok(())
    }

    fn teardown_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.stop_load();
            engine.destroy();
            debug!("Streaming engine destroyed");
        }
        self.levels.clear();
    }

    /// Tear the engine down and build a fresh one
    fn rebuild(&mut self) -> Result<()> {
        self.teardown_engine();
        self.unrecovered_faults = 0;
        self.initialize().inspect_err(|e| {
            error!(code = e.error_code(), category = %e.category(), error = %e, "Engine reinitialization failed");
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn wrapper(&self) -> &MediaStateWrapper<E> {
        &self.wrapper
    }

    pub(crate) fn wrapper_mut(&mut self) -> &mut MediaStateWrapper<E> {
        &mut self.wrapper
    }

    /// Delivery mode, `None` when the host cannot play the stream
    pub fn mode(&self) -> Option<StreamMode> {
        self.mode
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    /// Caller overrides in effect
    pub fn options(&self) -> &StreamingOptions {
        &self.options
    }

    /// Resolved engine configuration used for the next engine build
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine_config
    }

    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    /// Discovered renditions, highest first
    pub fn levels(&self) -> &[QualityLevel] {
        &self.levels
    }

    /// Whether a fault recovery is waiting for the stream to become playable
    pub fn is_recovering(&self) -> bool {
        self.recovering.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Take the play request issued when restoring state after a rebuild
    pub fn take_resume_play(&mut self) -> Option<ControlFuture> {
        self.resume_play.take()
    }

    // =========================================================================
    // Signal handling
    // =========================================================================

    /// Process a signal raised by the streaming engine
    ///
    /// Returns `Err` only when a fault forces a reinitialization that fails.
    #[instrument(skip(self))]
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Result<()> {
        if self.destroyed {
            debug!("Ignoring engine event after destroy");
            return Ok(());
        }

        match event {
            EngineEvent::MediaAttached => {
                debug!("Media attached to streaming engine");
            }
            EngineEvent::ManifestParsed { levels } => {
                self.rebuild_levels(&levels);
                self.restore_quality();
                if let Some(category) = self.recovering.take() {
                    info!(category = %category, "Stream recovered on manifest reload");
                }
                self.unrecovered_faults = 0;
                self.wrapper.publish(PlayerEvent::Ready {
                    mode: StreamMode::Engine,
                });
            }
            EngineEvent::LevelsUpdated { levels } => {
                self.rebuild_levels(&levels);
            }
            EngineEvent::LevelSwitched { level } => match self.level_name(level) {
                Some(name) => self.wrapper.set_quality(&name),
                None => warn!(level, "Engine switched to an unknown level"),
            },
            EngineEvent::BufferAppending => self.wrapper.report_buffering(true),
            EngineEvent::BufferAppended => self.wrapper.report_buffering(false),
            EngineEvent::Error {
                error_type,
                details,
                fatal,
            } => {
                let category = match error_type {
                    EngineErrorType::Network => ErrorCategory::Network,
                    EngineErrorType::Media => ErrorCategory::Decode,
                    EngineErrorType::KeySystem => ErrorCategory::UnsupportedSource,
                    EngineErrorType::Mux | EngineErrorType::Other => ErrorCategory::Unknown,
                };
                let error = PlaybackError::new(category, error_type.as_str(), details.clone(), fatal)
                    .with_details(serde_json::json!({
                        "type": error_type.as_str(),
                        "details": details,
                    }));
                return self.handle_fault(error);
            }
        }
        Ok(())
    }

    /// Process a lifecycle signal raised by the element
    pub fn handle_native_event(&mut self, event: NativeEvent) -> Result<()> {
        if self.destroyed {
            debug!(event = ?event, "Ignoring native event after destroy");
            return Ok(());
        }

        if event == NativeEvent::Error && self.mode == Some(StreamMode::Engine) {
            let error = self.wrapper.native_error();
            return self.handle_fault(error);
        }

        self.wrapper.handle_native_event(event);

        if event == NativeEvent::CanPlay {
            self.on_playable();
        }
        Ok(())
    }

    fn on_playable(&mut self) {
        if let Some(category) = self.recovering.take() {
            info!(category = %category, "Stream recovered");
            self.unrecovered_faults = 0;
            if let Some(mode) = self.mode {
                self.wrapper.publish(PlayerEvent::Ready { mode });
            }
        }

        if let Some(resume) = self.pending_resume.take() {
            debug!(position = resume.position, was_playing = resume.was_playing, "Restoring playback");
            self.wrapper.seek(resume.position);
            if resume.was_playing {
                self.resume_play = Some(self.wrapper.play());
            }
        }
    }

    /// Surface a fault and, when fatal, attempt a single recovery
    fn handle_fault(&mut self, error: PlaybackError) -> Result<()> {
        let category = error.category;
        let fatal = error.fatal;
        self.wrapper.report_error(error);

        if !fatal || self.engine.is_none() {
            return Ok(());
        }

        if let Some(pending) = self.recovering {
            self.unrecovered_faults += 1;
            warn!(
                pending = %pending,
                category = %category,
                faults = self.unrecovered_faults,
                "Fatal fault while recovery is pending"
            );
            if let Some(threshold) = self.policy.escalate_after {
                if self.unrecovered_faults >= threshold {
                    warn!(threshold, "Escalating to full reinitialization");
                    self.recovering = Some(category);
                    return self.rebuild();
                }
            }
            return Ok(());
        }

        self.recovering = Some(category);
        match category {
            ErrorCategory::Network => {
                let position = self.wrapper.current_time();
                info!(position, "Recovering from network fault");
                if let Some(engine) = self.engine.as_mut() {
                    engine.start_load(Some(position));
                }
                Ok(())
            }
            ErrorCategory::Decode => {
                info!("Recovering from media fault");
                if let Some(engine) = self.engine.as_mut() {
                    engine.recover_media_error();
                }
                Ok(())
            }
            ErrorCategory::UnsupportedSource | ErrorCategory::Unknown => {
                warn!(category = %category, "Unrecoverable fault, reinitializing");
                self.rebuild()
            }
        }
    }

    fn rebuild_levels(&mut self, levels: &[EngineLevel]) {
        let mut discovered: Vec<QualityLevel> = levels
            .iter()
            .enumerate()
            .map(|(index, level)| QualityLevel::new(index, level.bitrate, level.width, level.height))
            .collect();
        discovered.sort_by(|a, b| b.height.cmp(&a.height).then(b.bitrate.cmp(&a.bitrate)));

        info!(count = discovered.len(), "Quality levels discovered");
        self.levels = discovered;
    }

    /// Carry a manual rung selection over to a freshly parsed manifest
    fn restore_quality(&mut self) {
        let current = self.wrapper.get_current_quality().to_string();
        if current == AUTO_QUALITY {
            return;
        }

        match self.levels.iter().find(|l| l.name == current) {
            Some(level) => {
                let index = level.level_index as i32;
                if let Some(engine) = self.engine.as_mut() {
                    if engine.current_level() != index {
                        debug!(quality = %current, level = index, "Reapplying selected quality");
                        engine.set_current_level(index);
                    }
                }
            }
            None => {
                warn!(quality = %current, "Selected quality not in the new manifest, back to auto");
                self.wrapper.set_quality(AUTO_QUALITY);
            }
        }
    }

    fn level_name(&self, index: usize) -> Option<String> {
        self.levels
            .iter()
            .find(|l| l.level_index == index)
            .map(|l| l.name.clone())
    }

    // =========================================================================
    // Quality control
    // =========================================================================

    /// `auto` followed by the discovered rung names, highest first
    pub fn get_available_qualities(&self) -> Vec<String> {
        let mut qualities = vec![AUTO_QUALITY.to_string()];
        for level in &self.levels {
            if !qualities.contains(&level.name) {
                qualities.push(level.name.clone());
            }
        }
        qualities
    }

    pub fn get_current_quality(&self) -> &str {
        self.wrapper.get_current_quality()
    }

    /// Select a rung by name, or `auto` for engine-driven selection
    ///
    /// Unknown names are ignored.
    #[instrument(skip(self))]
    pub fn set_quality(&mut self, quality: &str) {
        if self.destroyed {
            warn!("set_quality called on destroyed controller");
            return;
        }

        if quality == AUTO_QUALITY {
            if let Some(engine) = self.engine.as_mut() {
                engine.set_current_level(AUTO_LEVEL);
            }
            self.wrapper.set_quality(AUTO_QUALITY);
            return;
        }

        // Duplicate rungs resolve to the first (highest bitrate) level
        let Some(level_index) = self
            .levels
            .iter()
            .find(|l| l.name == quality)
            .map(|l| l.level_index)
        else {
            debug!("Unknown quality requested, ignoring");
            return;
        };

        if let Some(engine) = self.engine.as_mut() {
            engine.set_current_level(level_index as i32);
        }
        self.wrapper.set_quality(quality);
    }

    // =========================================================================
    // Reconfiguration and teardown
    // =========================================================================

    /// Merge new engine options and rebuild the engine
    ///
    /// Position and play state are restored at the next `canplay`.
    #[instrument(skip(self, options))]
    pub fn update_config(&mut self, options: StreamingOptions) -> Result<()> {
        if self.destroyed {
            return Err(Error::Destroyed);
        }

        self.options.merge(&options);
        self.engine_config = EngineConfig::for_options(&self.options);

        if self.mode != Some(StreamMode::Engine) {
            debug!("No engine running, options stored");
            return Ok(());
        }

        let element = self.wrapper.element();
        self.pending_resume = Some(PendingResume {
            position: element.current_time(),
            was_playing: !element.paused(),
        });
        self.recovering = None;

        info!("Rebuilding streaming engine with new options");
        self.rebuild()
    }

    /// Tear down the engine, then the wrapper. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        self.teardown_engine();
        self.recovering = None;
        self.pending_resume = None;
        self.resume_play = None;
        self.wrapper.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{SimulatedElement, SimulatedEngineProvider};
    use std::sync::Mutex;

    const MASTER: &str = "https://cdn.example.com/live/master.m3u8";

    fn hls_config() -> SourceConfig {
        SourceConfig::new(vec![VideoSource::new(MASTER, SourceFormat::Hls)]).with_streaming_options(
            StreamingOptions {
                max_buffer_length: Some(20.0),
                ..Default::default()
            },
        )
    }

    fn ladder() -> Vec<EngineLevel> {
        vec![
            EngineLevel::new(800_000, 640, 360),
            EngineLevel::new(5_000_000, 1920, 1080),
            EngineLevel::new(2_800_000, 1280, 720),
            EngineLevel::new(3_200_000, 1280, 720),
        ]
    }

    fn engine_controller() -> (
        AdaptiveStreamController<SimulatedElement>,
        SimulatedElement,
        Arc<SimulatedEngineProvider>,
    ) {
        let element = SimulatedElement::new();
        let provider = Arc::new(SimulatedEngineProvider::new());
        let mut controller = AdaptiveStreamController::new(
            element.clone(),
            hls_config(),
            provider.clone(),
            RecoveryPolicy::default(),
        )
        .unwrap();
        controller.load().unwrap();
        (controller, element, provider)
    }

    fn record(controller: &AdaptiveStreamController<SimulatedElement>) -> Arc<Mutex<Vec<PlayerEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in PlayerEventKind::ALL {
            let sink = Arc::clone(&events);
            controller.wrapper().on(kind, move |record| {
                sink.lock().unwrap().push(record.event.clone());
                Ok(())
            });
        }
        events
    }

    fn fatal(error_type: EngineErrorType) -> EngineEvent {
        EngineEvent::Error {
            error_type,
            details: "fault".to_string(),
            fatal: true,
        }
    }

    #[test]
    fn test_detect_priority() {
        let element = SimulatedElement::new();
        let provider = SimulatedEngineProvider::new();
        assert_eq!(StreamCapability::detect(&element, &provider), StreamCapability::Engine);

        element.set_native_hls(true);
        assert_eq!(StreamCapability::detect(&element, &provider), StreamCapability::Native);

        element.set_native_hls(false);
        let unsupported = SimulatedEngineProvider::unsupported();
        assert_eq!(
            StreamCapability::detect(&element, &unsupported),
            StreamCapability::Unsupported
        );
    }

    #[test]
    fn test_engine_initialization() {
        let (controller, _element, provider) = engine_controller();
        let journal = provider.journal();

        assert_eq!(controller.mode(), Some(StreamMode::Engine));
        assert_eq!(journal.created, 1);
        assert_eq!(journal.attach_count, 1);
        assert_eq!(journal.loads, vec![MASTER.to_string()]);
        assert_eq!(journal.configs[0].max_buffer_length, 20.0);
        assert_eq!(journal.configs[0].frag_loading_max_retry, 6);
    }

    #[test]
    fn test_nothing_attached_before_load() {
        let element = SimulatedElement::new();
        let provider = Arc::new(SimulatedEngineProvider::new());

        let controller =
            AdaptiveStreamController::new(element.clone(), hls_config(), provider.clone(), RecoveryPolicy::default())
                .unwrap();

        assert!(!controller.is_loaded());
        assert_eq!(controller.mode(), None);
        assert_eq!(element.src(), None);
        assert_eq!(provider.journal().created, 0);
    }

    #[test]
    fn test_native_initialization_emits_ready() {
        let element = SimulatedElement::new();
        element.set_native_hls(true);
        let provider = Arc::new(SimulatedEngineProvider::new());

        let mut controller =
            AdaptiveStreamController::new(element.clone(), hls_config(), provider.clone(), RecoveryPolicy::default())
                .unwrap();
        let events = record(&controller);

        controller.load().unwrap();
        controller.load().unwrap();

        assert_eq!(controller.mode(), Some(StreamMode::Native));
        assert_eq!(element.src().as_deref(), Some(MASTER));
        assert_eq!(provider.journal().created, 0);
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[PlayerEvent::Ready {
                mode: StreamMode::Native
            }]
        );
    }

    #[test]
    fn test_unsupported_host_reports_error() {
        let element = SimulatedElement::new();
        let provider = Arc::new(SimulatedEngineProvider::unsupported());

        let mut controller =
            AdaptiveStreamController::new(element, hls_config(), provider, RecoveryPolicy::default()).unwrap();
        let events = record(&controller);
        controller.load().unwrap();

        assert_eq!(controller.mode(), None);
        // Non-fatal: state unchanged, not counted
        assert_eq!(controller.wrapper().state(), PlaybackState::Idle);
        assert_eq!(controller.wrapper().stats().error_count, 0);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            PlayerEvent::Error(error) => {
                assert_eq!(error.category, ErrorCategory::UnsupportedSource);
                assert_eq!(error.code, "STREAM_UNSUPPORTED");
                assert!(!error.fatal);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_load_after_destroy_fails() {
        let mut controller = AdaptiveStreamController::new(
            SimulatedElement::new(),
            hls_config(),
            Arc::new(SimulatedEngineProvider::new()),
            RecoveryPolicy::default(),
        )
        .unwrap();
        controller.destroy();

        assert!(matches!(controller.load(), Err(Error::Destroyed)));
    }

    #[test]
    fn test_missing_options_rejected() {
        let mut config = hls_config();
        config.streaming_options = None;
        let result = AdaptiveStreamController::new(
            SimulatedElement::new(),
            config,
            Arc::new(SimulatedEngineProvider::new()),
            RecoveryPolicy::default(),
        );
        assert!(matches!(result, Err(Error::UnsupportedSource(_))));
    }

    #[test]
    fn test_quality_ladder_sorted_and_deduplicated() {
        let (mut controller, _element, _provider) = engine_controller();
        let events = record(&controller);

        controller
            .handle_engine_event(EngineEvent::ManifestParsed { levels: ladder() })
            .unwrap();

        assert_eq!(
            controller.get_available_qualities(),
            vec!["auto", "1080p", "720p", "360p"]
        );
        let heights: Vec<u32> = controller.levels().iter().map(|l| l.height).collect();
        assert_eq!(heights, vec![1080, 720, 720, 360]);
        // Ties broken by bitrate, highest first
        assert_eq!(controller.levels()[1].bitrate, 3_200_000);

        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[PlayerEvent::Ready {
                mode: StreamMode::Engine
            }]
        );
    }

    #[test]
    fn test_set_quality_selects_level() {
        let (mut controller, _element, provider) = engine_controller();
        controller
            .handle_engine_event(EngineEvent::ManifestParsed { levels: ladder() })
            .unwrap();

        controller.set_quality("720p");
        assert_eq!(controller.get_current_quality(), "720p");
        // First occurrence wins: the 3.2 Mbps rendition at index 3
        assert_eq!(provider.journal().level_requests, vec![3]);

        controller.set_quality("auto");
        assert_eq!(controller.get_current_quality(), "auto");
        assert_eq!(provider.journal().level_requests, vec![3, AUTO_LEVEL]);
        assert_eq!(controller.wrapper().stats().quality_changes, 2);
    }

    #[test]
    fn test_unknown_quality_is_noop() {
        let (mut controller, _element, provider) = engine_controller();
        controller
            .handle_engine_event(EngineEvent::ManifestParsed {
                levels: vec![EngineLevel::new(800_000, 640, 360)],
            })
            .unwrap();
        let events = record(&controller);

        controller.set_quality("1080p");

        assert_eq!(controller.get_current_quality(), "auto");
        assert_eq!(controller.wrapper().stats().quality_changes, 0);
        assert!(provider.journal().level_requests.is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_engine_level_switch_reported_once() {
        let (mut controller, _element, _provider) = engine_controller();
        controller
            .handle_engine_event(EngineEvent::ManifestParsed { levels: ladder() })
            .unwrap();
        let events = record(&controller);

        controller
            .handle_engine_event(EngineEvent::LevelSwitched { level: 1 })
            .unwrap();
        controller
            .handle_engine_event(EngineEvent::LevelSwitched { level: 1 })
            .unwrap();

        assert_eq!(controller.get_current_quality(), "1080p");
        assert_eq!(controller.wrapper().stats().quality_changes, 1);
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[PlayerEvent::QualityChange {
                from: "auto".into(),
                to: "1080p".into()
            }]
        );
    }

    #[test]
    fn test_buffering_telemetry() {
        let (mut controller, element, _provider) = engine_controller();
        let events = record(&controller);

        element.set_position(10.0);
        element.set_buffered(vec![(0.0, 16.5)]);
        controller.handle_engine_event(EngineEvent::BufferAppending).unwrap();

        element.set_buffered(vec![]);
        controller.handle_engine_event(EngineEvent::BufferAppended).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            events[0],
            PlayerEvent::Buffering {
                is_buffering: true,
                buffer_level: 6.5
            }
        );
        assert_eq!(
            events[1],
            PlayerEvent::Buffering {
                is_buffering: false,
                buffer_level: 0.0
            }
        );
        assert_eq!(controller.wrapper().stats().buffering_events, 1);
    }

    #[test]
    fn test_network_fault_restarts_load() {
        let (mut controller, element, provider) = engine_controller();
        element.set_position(42.0);

        controller.handle_engine_event(fatal(EngineErrorType::Network)).unwrap();

        assert_eq!(provider.journal().start_loads, vec![Some(42.0)]);
        assert_eq!(controller.wrapper().state(), PlaybackState::Error);
        assert!(controller.is_recovering());
    }

    #[test]
    fn test_decode_fault_recovers_once() {
        let (mut controller, _element, provider) = engine_controller();
        let events = record(&controller);

        controller.handle_engine_event(fatal(EngineErrorType::Media)).unwrap();
        // A second fault while recovering is surfaced only
        controller.handle_engine_event(fatal(EngineErrorType::Media)).unwrap();
        assert_eq!(provider.journal().recover_media_calls, 1);
        assert_eq!(controller.wrapper().stats().error_count, 2);

        controller.handle_native_event(NativeEvent::CanPlay).unwrap();
        assert!(!controller.is_recovering());

        let events = events.lock().unwrap();
        assert!(matches!(events.last(), Some(PlayerEvent::Ready { mode: StreamMode::Engine })));
    }

    #[test]
    fn test_non_fatal_fault_is_reported_only() {
        let (mut controller, _element, provider) = engine_controller();
        controller
            .handle_engine_event(EngineEvent::Error {
                error_type: EngineErrorType::Network,
                details: "fragLoadTimeOut".to_string(),
                fatal: false,
            })
            .unwrap();

        let journal = provider.journal();
        assert!(journal.start_loads.is_empty());
        assert!(!controller.is_recovering());
    }

    #[test]
    fn test_other_fault_reinitializes() {
        let (mut controller, _element, provider) = engine_controller();
        controller
            .handle_engine_event(EngineEvent::ManifestParsed { levels: ladder() })
            .unwrap();

        controller.handle_engine_event(fatal(EngineErrorType::Mux)).unwrap();

        let journal = provider.journal();
        assert_eq!(journal.created, 2);
        assert_eq!(journal.destroyed, 1);
        assert!(controller.levels().is_empty());
        assert!(controller.is_recovering());
    }

    #[test]
    fn test_failed_reinitialization_propagates() {
        let (mut controller, _element, provider) = engine_controller();
        provider.set_fail_create(true);

        let result = controller.handle_engine_event(fatal(EngineErrorType::Other));
        assert!(matches!(result, Err(Error::Engine(_))));
    }

    #[test]
    fn test_escalation_policy() {
        let element = SimulatedElement::new();
        let provider = Arc::new(SimulatedEngineProvider::new());
        let mut controller = AdaptiveStreamController::new(
            element,
            hls_config(),
            provider.clone(),
            RecoveryPolicy::escalate_after(2),
        )
        .unwrap();
        controller.load().unwrap();

        controller.handle_engine_event(fatal(EngineErrorType::Media)).unwrap();
        controller.handle_engine_event(fatal(EngineErrorType::Media)).unwrap();
        assert_eq!(provider.journal().created, 1);

        controller.handle_engine_event(fatal(EngineErrorType::Media)).unwrap();
        let journal = provider.journal();
        assert_eq!(journal.recover_media_calls, 1);
        assert_eq!(journal.created, 2);
    }

    #[test]
    fn test_native_media_error_drives_recovery() {
        let (mut controller, element, provider) = engine_controller();
        element.set_error(Some(crate::element::MediaError::new(
            crate::element::MediaErrorCode::Decode,
            "PIPELINE_ERROR_DECODE",
        )));

        controller.handle_native_event(NativeEvent::Error).unwrap();

        assert_eq!(provider.journal().recover_media_calls, 1);
        assert_eq!(controller.wrapper().stats().error_count, 1);
    }

    #[tokio::test]
    async fn test_update_config_restores_position() {
        let (mut controller, element, provider) = engine_controller();
        element.load_media(300.0, 1280, 720);
        controller.wrapper_mut().play().await.unwrap();
        element.set_position(95.0);

        controller
            .update_config(StreamingOptions {
                max_buffer_length: Some(8.0),
                ..Default::default()
            })
            .unwrap();

        let journal = provider.journal();
        assert_eq!(journal.created, 2);
        assert_eq!(journal.destroyed, 1);
        assert_eq!(journal.configs[1].max_buffer_length, 8.0);

        element.set_position(0.0);
        controller.handle_native_event(NativeEvent::CanPlay).unwrap();
        assert_eq!(element.current_time(), 95.0);

        let resume = controller.take_resume_play().expect("resume requested");
        assert!(resume.await.is_ok());
    }

    #[test]
    fn test_selected_quality_survives_rebuild() {
        let (mut controller, _element, provider) = engine_controller();
        controller
            .handle_engine_event(EngineEvent::ManifestParsed { levels: ladder() })
            .unwrap();
        controller.set_quality("720p");

        controller
            .update_config(StreamingOptions {
                back_buffer_length: Some(10.0),
                ..Default::default()
            })
            .unwrap();
        controller
            .handle_engine_event(EngineEvent::ManifestParsed { levels: ladder() })
            .unwrap();

        assert_eq!(controller.get_current_quality(), "720p");
        // The rebuilt engine starts on auto and gets the rung again
        assert_eq!(provider.journal().level_requests, vec![3, 3]);
        assert_eq!(controller.wrapper().stats().quality_changes, 1);
    }

    #[test]
    fn test_selected_quality_dropped_when_rung_disappears() {
        let (mut controller, _element, provider) = engine_controller();
        controller
            .handle_engine_event(EngineEvent::ManifestParsed { levels: ladder() })
            .unwrap();
        controller.set_quality("1080p");
        let events = record(&controller);

        controller.handle_engine_event(fatal(EngineErrorType::Mux)).unwrap();
        controller
            .handle_engine_event(EngineEvent::ManifestParsed {
                levels: vec![EngineLevel::new(800_000, 640, 360)],
            })
            .unwrap();

        assert_eq!(controller.get_current_quality(), "auto");
        assert_eq!(provider.journal().level_requests, vec![1]);
        let events = events.lock().unwrap();
        assert!(events.contains(&PlayerEvent::QualityChange {
            from: "1080p".into(),
            to: "auto".into()
        }));
    }

    #[test]
    fn test_destroy_tears_down_engine() {
        let (mut controller, element, provider) = engine_controller();
        controller
            .handle_engine_event(EngineEvent::ManifestParsed { levels: ladder() })
            .unwrap();
        record(&controller);

        controller.destroy();
        controller.destroy();

        let journal = provider.journal();
        assert_eq!(journal.stop_loads, 1);
        assert_eq!(journal.destroyed, 1);
        assert!(controller.levels().is_empty());
        assert_eq!(controller.wrapper().emitter().total_listener_count(), 0);
        assert_eq!(element.src(), None);
        assert!(controller.handle_engine_event(fatal(EngineErrorType::Network)).is_ok());
    }
}
