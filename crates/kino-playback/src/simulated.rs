//! Headless element and engine implementations
//!
//! [`SimulatedElement`] behaves like a media element without decoding
//! anything: properties are scripted by the driver and lifecycle signals the
//! real element would raise are queued for [`SimulatedElement::take_signals`].
//! [`SimulatedEngineProvider`] builds engines that record every call in a
//! shared [`EngineJournal`].

use crate::{
    element::{
        settled, CanPlayType, ElementAttributes, MediaElement, MediaError, NativeEvent,
        PlatformError, PlatformFuture,
    },
    engine::{EngineConfig, EngineLevel, EngineProvider, StreamingEngine, AUTO_LEVEL},
    types::{NetworkState, ReadyState, SourceFormat, TimeRange},
    Error, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug)]
struct ElementState {
    src: Option<String>,
    attributes: ElementAttributes,
    network_state: NetworkState,
    ready_state: ReadyState,
    error: Option<MediaError>,

    current_time: f64,
    duration: f64,
    paused: bool,
    ended: bool,

    volume: f64,
    muted: bool,
    playback_rate: f64,

    video_width: u32,
    video_height: u32,
    buffered: Vec<TimeRange>,
    seekable: Vec<TimeRange>,
    played: Vec<TimeRange>,

    native_hls: bool,
    autoplay_blocked: bool,
    fullscreen_supported: bool,
    fullscreen: bool,
    pip_supported: bool,
    pip: bool,

    /// Bumped by pause/load; a pending play settles as aborted when it changes
    play_generation: u64,
    load_count: u32,
    signals: Vec<NativeEvent>,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            src: None,
            attributes: ElementAttributes::default(),
            network_state: NetworkState::Empty,
            ready_state: ReadyState::HaveNothing,
            error: None,
            current_time: 0.0,
            duration: f64::NAN,
            paused: true,
            ended: false,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            video_width: 0,
            video_height: 0,
            buffered: Vec::new(),
            seekable: Vec::new(),
            played: Vec::new(),
            native_hls: false,
            autoplay_blocked: false,
            fullscreen_supported: false,
            fullscreen: false,
            pip_supported: false,
            pip: false,
            play_generation: 0,
            load_count: 0,
            signals: Vec::new(),
        }
    }
}

/// Scriptable media element handle; clones share state
#[derive(Debug, Clone, Default)]
pub struct SimulatedElement {
    inner: Arc<Mutex<ElementState>>,
}

impl SimulatedElement {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ElementState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain the signals raised since the last call
    pub fn take_signals(&self) -> Vec<NativeEvent> {
        std::mem::take(&mut self.state().signals)
    }

    /// Raise a signal as if the platform had fired it
    pub fn raise(&self, event: NativeEvent) {
        self.state().signals.push(event);
    }

    /// Pretend media metadata arrived
    pub fn load_media(&self, duration: f64, width: u32, height: u32) {
        let mut state = self.state();
        state.duration = duration;
        state.video_width = width;
        state.video_height = height;
        state.ready_state = ReadyState::HaveEnoughData;
        state.network_state = NetworkState::Idle;
        state.seekable = if duration.is_finite() {
            vec![TimeRange::new(0.0, duration)]
        } else {
            Vec::new()
        };
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        self.state().ready_state = ready_state;
    }

    pub fn set_buffered(&self, ranges: Vec<(f64, f64)>) {
        self.state().buffered = ranges
            .into_iter()
            .map(|(start, end)| TimeRange::new(start, end))
            .collect();
    }

    pub fn set_error(&self, error: Option<MediaError>) {
        self.state().error = error;
    }

    /// Move the playhead without raising seek signals
    pub fn set_position(&self, time: f64) {
        let mut state = self.state();
        state.current_time = time;
        if state.duration.is_finite() && time >= state.duration {
            state.ended = true;
        }
    }

    /// Whether `application/vnd.apple.mpegurl` is natively playable
    pub fn set_native_hls(&self, supported: bool) {
        self.state().native_hls = supported;
    }

    /// Reject `play()` as an autoplay policy would
    pub fn block_autoplay(&self, blocked: bool) {
        self.state().autoplay_blocked = blocked;
    }

    pub fn set_fullscreen_supported(&self, supported: bool) {
        self.state().fullscreen_supported = supported;
    }

    pub fn set_pip_supported(&self, supported: bool) {
        self.state().pip_supported = supported;
    }

    /// Attributes applied by the player
    pub fn attributes(&self) -> ElementAttributes {
        self.state().attributes.clone()
    }

    /// Number of `load()` calls
    pub fn load_count(&self) -> u32 {
        self.state().load_count
    }
}

impl MediaElement for SimulatedElement {
    fn current_time(&self) -> f64 {
        self.state().current_time
    }

    fn set_current_time(&mut self, time: f64) {
        let mut state = self.state();
        state.current_time = time;
        state.ended = false;
        state.signals.push(NativeEvent::Seeking);
        state.signals.push(NativeEvent::Seeked);
    }

    fn duration(&self) -> f64 {
        self.state().duration
    }

    fn paused(&self) -> bool {
        self.state().paused
    }

    fn ended(&self) -> bool {
        self.state().ended
    }

    fn volume(&self) -> f64 {
        self.state().volume
    }

    fn set_volume(&mut self, volume: f64) {
        let mut state = self.state();
        if state.volume != volume {
            state.volume = volume;
            state.signals.push(NativeEvent::VolumeChange);
        }
    }

    fn muted(&self) -> bool {
        self.state().muted
    }

    fn set_muted(&mut self, muted: bool) {
        let mut state = self.state();
        if state.muted != muted {
            state.muted = muted;
            state.signals.push(NativeEvent::VolumeChange);
        }
    }

    fn playback_rate(&self) -> f64 {
        self.state().playback_rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        let mut state = self.state();
        if state.playback_rate != rate {
            state.playback_rate = rate;
            state.signals.push(NativeEvent::RateChange);
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.state().ready_state
    }

    fn network_state(&self) -> NetworkState {
        self.state().network_state
    }

    fn video_width(&self) -> u32 {
        self.state().video_width
    }

    fn video_height(&self) -> u32 {
        self.state().video_height
    }

    fn buffered(&self) -> Vec<TimeRange> {
        self.state().buffered.clone()
    }

    fn seekable(&self) -> Vec<TimeRange> {
        self.state().seekable.clone()
    }

    fn played(&self) -> Vec<TimeRange> {
        self.state().played.clone()
    }

    fn error(&self) -> Option<MediaError> {
        self.state().error.clone()
    }

    fn src(&self) -> Option<String> {
        self.state().src.clone()
    }

    fn set_src(&mut self, src: Option<&str>) {
        let mut state = self.state();
        state.src = src.map(str::to_string);
        if state.src.is_none() {
            state.duration = f64::NAN;
            state.buffered.clear();
            state.seekable.clear();
        }
    }

    fn load(&mut self) {
        let mut state = self.state();
        state.load_count += 1;
        state.play_generation += 1;
        state.current_time = 0.0;
        state.paused = true;
        state.ended = false;
        state.error = None;
        state.ready_state = ReadyState::HaveNothing;

        if state.src.is_some() {
            state.network_state = NetworkState::Loading;
            state.signals.push(NativeEvent::LoadStart);
        } else {
            state.network_state = NetworkState::Empty;
        }
    }

    fn apply_attributes(&mut self, attributes: &ElementAttributes) {
        let mut state = self.state();
        state.muted = attributes.muted;
        state.attributes = attributes.clone();
    }

    fn can_play_type(&self, mime_type: &str) -> CanPlayType {
        match mime_type.parse::<SourceFormat>() {
            Ok(SourceFormat::Hls) if self.state().native_hls => CanPlayType::Maybe,
            Ok(SourceFormat::Mp4 | SourceFormat::Webm) => CanPlayType::Probably,
            Ok(SourceFormat::Ogg) => CanPlayType::Maybe,
            _ => CanPlayType::Empty,
        }
    }

    fn play(&mut self) -> PlatformFuture {
        let generation = {
            let mut state = self.state();
            if state.autoplay_blocked {
                debug!("Simulated play rejected by autoplay policy");
                return settled(Err(PlatformError::NotAllowed(
                    "play() failed because the user didn't interact with the document first"
                        .to_string(),
                )));
            }

            if state.paused {
                state.paused = false;
                state.signals.push(NativeEvent::Play);
                if state.ready_state >= ReadyState::HaveFutureData {
                    state.signals.push(NativeEvent::Playing);
                } else {
                    state.signals.push(NativeEvent::Waiting);
                }
            }
            state.play_generation
        };

        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            tokio::task::yield_now().await;
            let state = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if state.play_generation != generation || state.paused {
                Err(PlatformError::Aborted(
                    "the play() request was interrupted by a call to pause()".to_string(),
                ))
            } else {
                Ok(())
            }
        })
    }

    fn pause(&mut self) {
        let mut state = self.state();
        state.play_generation += 1;
        if !state.paused {
            state.paused = true;
            state.signals.push(NativeEvent::Pause);
        }
    }

    fn fullscreen_supported(&self) -> bool {
        self.state().fullscreen_supported
    }

    fn is_fullscreen(&self) -> bool {
        self.state().fullscreen
    }

    fn request_fullscreen(&mut self) -> PlatformFuture {
        settled(self.toggle_presentation(Presentation::Fullscreen, true))
    }

    fn exit_fullscreen(&mut self) -> PlatformFuture {
        settled(self.toggle_presentation(Presentation::Fullscreen, false))
    }

    fn pip_supported(&self) -> bool {
        self.state().pip_supported
    }

    fn is_pip(&self) -> bool {
        self.state().pip
    }

    fn request_pip(&mut self) -> PlatformFuture {
        settled(self.toggle_presentation(Presentation::PictureInPicture, true))
    }

    fn exit_pip(&mut self) -> PlatformFuture {
        settled(self.toggle_presentation(Presentation::PictureInPicture, false))
    }
}

#[derive(Debug, Clone, Copy)]
enum Presentation {
    Fullscreen,
    PictureInPicture,
}

impl SimulatedElement {
    fn toggle_presentation(
        &self,
        mode: Presentation,
        active: bool,
    ) -> std::result::Result<(), PlatformError> {
        let mut state = self.state();
        match mode {
            Presentation::Fullscreen => {
                if !state.fullscreen_supported {
                    return Err(PlatformError::NotSupported("fullscreen".to_string()));
                }
                if state.fullscreen != active {
                    state.fullscreen = active;
                    state.signals.push(NativeEvent::FullscreenChange);
                }
            }
            Presentation::PictureInPicture => {
                if !state.pip_supported {
                    return Err(PlatformError::NotSupported("picture-in-picture".to_string()));
                }
                if state.pip != active {
                    state.pip = active;
                    state.signals.push(if active {
                        NativeEvent::EnterPictureInPicture
                    } else {
                        NativeEvent::LeavePictureInPicture
                    });
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Simulated engine
// =============================================================================

/// Record of every call made on simulated engines
#[derive(Debug, Clone, Default)]
pub struct EngineJournal {
    /// Engines built by the provider
    pub created: u32,
    /// Configuration each engine was built with
    pub configs: Vec<EngineConfig>,
    pub loads: Vec<String>,
    pub attach_count: u32,
    pub start_loads: Vec<Option<f64>>,
    pub stop_loads: u32,
    pub recover_media_calls: u32,
    pub level_requests: Vec<i32>,
    pub destroyed: u32,
}

/// Provider of journaled engines
#[derive(Debug)]
pub struct SimulatedEngineProvider {
    supported: bool,
    fail_create: AtomicBool,
    journal: Arc<Mutex<EngineJournal>>,
}

impl SimulatedEngineProvider {
    pub fn new() -> Self {
        Self {
            supported: true,
            fail_create: AtomicBool::new(false),
            journal: Arc::new(Mutex::new(EngineJournal::default())),
        }
    }

    /// Provider for a host without engine support
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Make subsequent `create` calls fail
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the journal
    pub fn journal(&self) -> EngineJournal {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for SimulatedEngineProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineProvider for SimulatedEngineProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self, config: &EngineConfig) -> Result<Box<dyn StreamingEngine>> {
        if !self.supported {
            return Err(Error::engine("streaming engine is not supported"));
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::engine("failed to create streaming engine"));
        }

        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        journal.created += 1;
        journal.configs.push(config.clone());

        Ok(Box::new(SimulatedEngine {
            journal: Arc::clone(&self.journal),
            current_level: config.start_level,
        }))
    }
}

/// Engine handle that only records calls
#[derive(Debug)]
pub struct SimulatedEngine {
    journal: Arc<Mutex<EngineJournal>>,
    current_level: i32,
}

impl SimulatedEngine {
    fn journal(&self) -> MutexGuard<'_, EngineJournal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StreamingEngine for SimulatedEngine {
    fn load_source(&mut self, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(Error::engine("empty manifest url"));
        }
        self.journal().loads.push(url.to_string());
        Ok(())
    }

    fn attach_media(&mut self) {
        self.journal().attach_count += 1;
    }

    fn start_load(&mut self, position: Option<f64>) {
        self.journal().start_loads.push(position);
    }

    fn stop_load(&mut self) {
        self.journal().stop_loads += 1;
    }

    fn recover_media_error(&mut self) {
        self.journal().recover_media_calls += 1;
    }

    fn current_level(&self) -> i32 {
        self.current_level
    }

    fn set_current_level(&mut self, level: i32) {
        self.current_level = level;
        self.journal().level_requests.push(level);
    }

    fn destroy(&mut self) {
        self.current_level = AUTO_LEVEL;
        self.journal().destroyed += 1;
    }
}

/// Renditions listed in an HLS master playlist, in playlist order
///
/// Variants without a RESOLUTION attribute report a zero size.
pub fn levels_from_master_playlist(content: &str) -> Result<Vec<EngineLevel>> {
    let playlist = m3u8_rs::parse_master_playlist_res(content.as_bytes())
        .map_err(|e| Error::ManifestParse(format!("Failed to parse HLS master: {:?}", e)))?;

    Ok(playlist
        .variants
        .iter()
        .filter(|variant| !variant.is_i_frame)
        .map(|variant| {
            let (width, height) = variant
                .resolution
                .map(|r| (r.width as u32, r.height as u32))
                .unwrap_or((0, 0));
            EngineLevel::new(variant.bandwidth, width, height)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720
720p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080p.m3u8
";

    #[test]
    fn test_levels_from_master_playlist() {
        let levels = levels_from_master_playlist(MASTER).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], EngineLevel::new(800_000, 640, 360));
        assert_eq!(levels[2].height, 1080);
    }

    #[test]
    fn test_invalid_playlist() {
        assert!(matches!(
            levels_from_master_playlist("not a playlist"),
            Err(Error::ManifestParse(_))
        ));
    }

    #[test]
    fn test_element_signals() {
        let mut element = SimulatedElement::new();
        element.set_src(Some("clip.mp4"));
        element.load();
        element.load_media(10.0, 640, 360);
        element.set_volume(0.5);

        assert_eq!(
            element.take_signals(),
            vec![NativeEvent::LoadStart, NativeEvent::VolumeChange]
        );
        assert!(element.take_signals().is_empty());
    }

    #[tokio::test]
    async fn test_play_interrupted_by_pause() {
        let mut element = SimulatedElement::new();
        element.load_media(10.0, 640, 360);

        let request = element.play();
        element.pause();

        assert!(matches!(request.await, Err(PlatformError::Aborted(_))));
        assert_eq!(
            element.take_signals(),
            vec![NativeEvent::Play, NativeEvent::Playing, NativeEvent::Pause]
        );
    }

    #[tokio::test]
    async fn test_play_resolves() {
        let mut element = SimulatedElement::new();
        element.load_media(10.0, 640, 360);
        assert!(element.play().await.is_ok());
        assert!(!element.paused());
    }

    #[test]
    fn test_can_play_type() {
        let element = SimulatedElement::new();
        assert_eq!(element.can_play_type("video/mp4"), CanPlayType::Probably);
        assert_eq!(
            element.can_play_type("application/vnd.apple.mpegurl"),
            CanPlayType::Empty
        );
        element.set_native_hls(true);
        assert!(element
            .can_play_type("application/vnd.apple.mpegurl")
            .is_playable());
        assert_eq!(element.can_play_type("application/dash+xml"), CanPlayType::Empty);
    }

    #[test]
    fn test_engine_journal() {
        let provider = SimulatedEngineProvider::new();
        let mut engine = provider.create(&EngineConfig::default()).unwrap();
        engine.attach_media();
        engine.load_source("https://cdn.example.com/master.m3u8").unwrap();
        engine.set_current_level(2);
        engine.destroy();

        let journal = provider.journal();
        assert_eq!(journal.created, 1);
        assert_eq!(journal.attach_count, 1);
        assert_eq!(journal.level_requests, vec![2]);
        assert_eq!(journal.destroyed, 1);
    }
}
