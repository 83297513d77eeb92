//! Media State Wrapper - canonical view of a native media element
//!
//! Translates the element's lifecycle signals into:
//! - A single active [`PlaybackState`]
//! - A [`Metadata`] snapshot refreshed once metadata is available
//! - Monotonic [`Stats`] counters and timers
//! - Canonical [`EventRecord`]s published through the emitter

use crate::{
    element::{ElementAttributes, MediaElement, MediaErrorCode, NativeEvent, PlatformFuture},
    emitter::{EventEmitter, ListenerId, ListenerResult},
    types::*,
    Error, Result,
};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Emitter type carried by every player
pub type PlayerEmitter = EventEmitter<PlayerEventKind, EventRecord>;

/// Future returned by asynchronous control calls
pub type ControlFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

fn done(result: Result<()>) -> ControlFuture {
    Box::pin(std::future::ready(result))
}

/// Open timers feeding the cumulative stats
#[derive(Debug, Default)]
struct Timers {
    load_started: Option<Instant>,
    play_started: Option<Instant>,
    pause_started: Option<Instant>,
}

/// Canonical playback state machine around a media element
pub struct MediaStateWrapper<E: MediaElement> {
    element: E,
    config: SourceConfig,
    state: PlaybackState,
    metadata: Metadata,
    stats: Stats,
    emitter: PlayerEmitter,
    current_quality: String,
    timers: Timers,
    /// Seek applied on the first loadedmetadata
    pending_position: Option<f64>,
    destroyed: bool,
}

impl<E: MediaElement> MediaStateWrapper<E> {
    /// Wrap an element and apply the configuration's presentation attributes
    ///
    /// No source is attached; see [`MediaStateWrapper::attach_source`].
    pub fn new(mut element: E, config: SourceConfig) -> Self {
        element.apply_attributes(&ElementAttributes::from(&config));

        if let Some(volume) = config.initial_volume {
            if !volume.is_nan() {
                element.set_volume(volume.clamp(0.0, 1.0));
            }
        }
        if let Some(rate) = config.initial_rate {
            if rate.is_finite() && rate > 0.0 {
                element.set_playback_rate(rate);
            }
        }

        let pending_position = config.initial_position.filter(|p| p.is_finite() && *p > 0.0);

        Self {
            element,
            config,
            state: PlaybackState::Idle,
            metadata: Metadata {
                duration: f64::NAN,
                ..Default::default()
            },
            stats: Stats::default(),
            emitter: PlayerEmitter::new(),
            current_quality: AUTO_QUALITY.to_string(),
            timers: Timers::default(),
            pending_position,
            destroyed: false,
        }
    }

    /// Pick the first source the element reports it can play
    ///
    /// Falls back to the first declared source.
    pub fn select_source(&self) -> Option<VideoSource> {
        self.config
            .sources
            .iter()
            .find(|s| {
                s.source_format()
                    .is_some_and(|f| self.element.can_play_type(f.mime_type()).is_playable())
            })
            .or_else(|| self.config.sources.first())
            .cloned()
    }

    /// Attach a source URL directly to the element and start loading it
    pub fn attach_source(&mut self, source: &VideoSource) {
        if self.destroyed {
            warn!("attach_source called on destroyed player");
            return;
        }
        info!(url = %source.url, format = %source.format, "Attaching source");

        if let Some(quality) = &source.quality {
            self.current_quality = quality.clone();
        }
        self.element.set_src(Some(&source.url));
        self.element.load();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Emitter handle for subscribing to canonical events
    pub fn emitter(&self) -> &PlayerEmitter {
        &self.emitter
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn current_time(&self) -> f64 {
        self.element.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.element.duration()
    }

    /// Seconds buffered ahead of the playhead, 0 when unknown
    pub fn buffer_level(&self) -> f64 {
        let position = self.element.current_time();
        self.element
            .buffered()
            .last()
            .map(|range| (range.end - position).max(0.0))
            .filter(|level| level.is_finite())
            .unwrap_or(0.0)
    }

    /// Subscribe to a canonical event
    pub fn on<F>(&self, event: PlayerEventKind, listener: F) -> ListenerId
    where
        F: Fn(&EventRecord) -> ListenerResult + Send + Sync + 'static,
    {
        self.emitter.on(event, listener)
    }

    /// Subscribe to the next occurrence of a canonical event
    pub fn once<F>(&self, event: PlayerEventKind, listener: F) -> ListenerId
    where
        F: Fn(&EventRecord) -> ListenerResult + Send + Sync + 'static,
    {
        self.emitter.once(event, listener)
    }

    pub fn off(&self, event: PlayerEventKind, id: ListenerId) -> bool {
        self.emitter.off(event, id)
    }

    // =========================================================================
    // Native signal handling
    // =========================================================================

    /// Process a lifecycle signal raised by the element
    pub fn handle_native_event(&mut self, event: NativeEvent) {
        if self.destroyed {
            debug!(event = ?event, "Ignoring native event after destroy");
            return;
        }

        let now = Instant::now();
        let canonical = match event {
            NativeEvent::LoadStart => {
                self.transition(PlaybackState::Loading);
                self.timers.load_started = Some(now);
                PlayerEvent::LoadStart
            }
            NativeEvent::LoadedMetadata => {
                if let Some(position) = self.pending_position.take() {
                    debug!(position, "Applying initial position");
                    self.seek(position);
                }
                PlayerEvent::LoadedMetadata
            }
            NativeEvent::LoadedData => {
                if let Some(started) = self.timers.load_started.take() {
                    self.stats.load_time += now.duration_since(started).as_secs_f64();
                }
                PlayerEvent::LoadedData
            }
            NativeEvent::CanPlay => {
                self.transition(PlaybackState::CanPlay);
                PlayerEvent::CanPlay
            }
            NativeEvent::CanPlayThrough => PlayerEvent::CanPlayThrough,
            NativeEvent::Play => {
                self.transition(PlaybackState::Play);
                self.close_pause_timer(now);
                PlayerEvent::Play
            }
            NativeEvent::Playing => {
                self.transition(PlaybackState::Playing);
                self.close_pause_timer(now);
                if self.timers.play_started.is_none() {
                    self.timers.play_started = Some(now);
                }
                PlayerEvent::Playing
            }
            NativeEvent::Pause => {
                self.transition(PlaybackState::Paused);
                self.close_play_timer(now);
                self.timers.pause_started = Some(now);
                PlayerEvent::Pause
            }
            NativeEvent::Seeking => {
                self.transition(PlaybackState::Seeking);
                self.stats.seek_count += 1;
                PlayerEvent::Seeking
            }
            NativeEvent::Seeked => PlayerEvent::Seeked,
            NativeEvent::Waiting | NativeEvent::Stalled => {
                self.transition(PlaybackState::Waiting);
                self.close_play_timer(now);
                self.stats.buffering_events += 1;
                PlayerEvent::Waiting
            }
            NativeEvent::TimeUpdate => PlayerEvent::TimeUpdate,
            NativeEvent::Progress => PlayerEvent::Progress {
                loaded: self.element.buffered().last().map_or(0.0, |r| r.end),
                total: self.element.duration(),
            },
            NativeEvent::VolumeChange => PlayerEvent::VolumeChange {
                volume: self.element.volume(),
                muted: self.element.muted(),
            },
            NativeEvent::RateChange => PlayerEvent::RateChange {
                rate: self.element.playback_rate(),
            },
            NativeEvent::Ended => {
                self.transition(PlaybackState::Ended);
                self.close_play_timer(now);
                PlayerEvent::Ended
            }
            NativeEvent::Error => {
                let error = self.native_error();
                self.apply_error(&error);
                PlayerEvent::Error(error)
            }
            NativeEvent::FullscreenChange => PlayerEvent::FullscreenChange {
                fullscreen: self.element.is_fullscreen(),
            },
            NativeEvent::EnterPictureInPicture => PlayerEvent::Pip { active: true },
            NativeEvent::LeavePictureInPicture => PlayerEvent::Pip { active: false },
        };

        self.refresh_metadata();
        self.publish(canonical);
    }

    /// Classify the element's current media error
    pub fn native_error(&self) -> PlaybackError {
        match self.element.error() {
            Some(media_error) => {
                let category = match media_error.code {
                    MediaErrorCode::Network => ErrorCategory::Network,
                    MediaErrorCode::Decode => ErrorCategory::Decode,
                    MediaErrorCode::SrcNotSupported => ErrorCategory::UnsupportedSource,
                    MediaErrorCode::Aborted => ErrorCategory::Unknown,
                };
                PlaybackError::new(category, media_error.code.as_str(), media_error.message, true)
            }
            None => PlaybackError::new(
                ErrorCategory::Unknown,
                "MEDIA_ERR_UNKNOWN",
                "media element reported an error without details",
                true,
            ),
        }
    }

    /// Surface an error on the event stream
    ///
    /// Fatal errors move the state to `error` and count towards the stats.
    pub fn report_error(&mut self, error: PlaybackError) {
        if self.destroyed {
            debug!(error = %error, "Ignoring error after destroy");
            return;
        }
        self.apply_error(&error);
        self.refresh_metadata();
        self.publish(PlayerEvent::Error(error));
    }

    fn apply_error(&mut self, error: &PlaybackError) {
        if error.fatal {
            warn!(category = %error.category, code = %error.code, message = %error.message, "Fatal playback error");
            self.transition(PlaybackState::Error);
            self.close_play_timer(Instant::now());
            self.stats.error_count += 1;
        } else {
            debug!(category = %error.category, code = %error.code, "Non-fatal playback error");
        }
    }

    /// Publish a `buffering` event with the current buffer level
    pub fn report_buffering(&mut self, is_buffering: bool) {
        if self.destroyed {
            return;
        }
        if is_buffering {
            self.stats.buffering_events += 1;
        }
        let buffer_level = self.buffer_level();
        self.publish(PlayerEvent::Buffering {
            is_buffering,
            buffer_level,
        });
    }

    /// Publish an arbitrary canonical event
    pub fn publish(&self, event: PlayerEvent) {
        let kind = event.kind();
        let record = EventRecord::new(event, self.element.current_time(), self.element.duration());
        self.emitter.emit(kind, &record);
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }

    fn close_play_timer(&mut self, now: Instant) {
        if let Some(started) = self.timers.play_started.take() {
            self.stats.play_time += now.duration_since(started).as_secs_f64();
        }
    }

    fn close_pause_timer(&mut self, now: Instant) {
        if let Some(started) = self.timers.pause_started.take() {
            self.stats.pause_time += now.duration_since(started).as_secs_f64();
        }
    }

    fn refresh_metadata(&mut self) {
        let ready_state = self.element.ready_state();
        if ready_state < ReadyState::HaveMetadata {
            return;
        }

        self.metadata = Metadata {
            duration: self.element.duration(),
            video_width: self.element.video_width(),
            video_height: self.element.video_height(),
            buffered: self.element.buffered(),
            seekable: self.element.seekable(),
            played: self.element.played(),
            network_state: self.element.network_state(),
            ready_state,
        };
    }

    // =========================================================================
    // Playback control
    // =========================================================================

    /// Request playback
    ///
    /// The state only becomes `playing` on the element's `playing` signal. If
    /// the platform rejects the request an `error` event (category
    /// `unknown`, non-fatal) is published and the future resolves to `Err`.
    pub fn play(&mut self) -> ControlFuture {
        if self.destroyed {
            return done(Err(Error::Destroyed));
        }

        let request = self.element.play();
        let emitter = self.emitter.clone();
        let current_time = self.element.current_time();
        let duration = self.element.duration();

        Box::pin(async move {
            match request.await {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!(error = %e, "Play request rejected");
                    let error = PlaybackError::new(
                        ErrorCategory::Unknown,
                        "PLAY_REJECTED",
                        e.to_string(),
                        false,
                    );
                    let record = EventRecord::new(PlayerEvent::Error(error), current_time, duration);
                    emitter.emit(PlayerEventKind::Error, &record);
                    Err(Error::PlaybackRejected(e.to_string()))
                }
            }
        })
    }

    pub fn pause(&mut self) {
        if self.guard("pause") {
            self.element.pause();
        }
    }

    /// Pause and rewind to the start
    pub fn stop(&mut self) {
        if self.guard("stop") {
            self.element.pause();
            self.element.set_current_time(0.0);
        }
    }

    /// Seek to `time`; requests outside `[0, duration]` are ignored
    #[instrument(skip(self))]
    pub fn seek(&mut self, time: f64) {
        if !self.guard("seek") {
            return;
        }

        let duration = self.element.duration();
        let out_of_range = !time.is_finite() || time < 0.0 || (duration.is_finite() && time > duration);
        if out_of_range {
            debug!(time, duration, "Ignoring out-of-range seek");
            return;
        }
        self.element.set_current_time(time);
    }

    /// Set volume, clamped to `[0, 1]`
    pub fn set_volume(&mut self, volume: f64) {
        if !self.guard("set_volume") {
            return;
        }
        if volume.is_nan() {
            debug!("Ignoring NaN volume");
            return;
        }
        self.element.set_volume(volume.clamp(0.0, 1.0));
    }

    pub fn volume(&self) -> f64 {
        self.element.volume()
    }

    pub fn mute(&mut self) {
        if self.guard("mute") {
            self.element.set_muted(true);
        }
    }

    pub fn unmute(&mut self) {
        if self.guard("unmute") {
            self.element.set_muted(false);
        }
    }

    pub fn toggle_mute(&mut self) {
        if self.guard("toggle_mute") {
            let muted = self.element.muted();
            self.element.set_muted(!muted);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.element.muted()
    }

    /// Set the playback rate; non-finite or non-positive rates are ignored
    pub fn set_playback_rate(&mut self, rate: f64) {
        if !self.guard("set_playback_rate") {
            return;
        }
        if !rate.is_finite() || rate <= 0.0 {
            warn!(rate, "Ignoring invalid playback rate");
            return;
        }
        self.element.set_playback_rate(rate);
    }

    pub fn playback_rate(&self) -> f64 {
        self.element.playback_rate()
    }

    // =========================================================================
    // Quality bookkeeping
    // =========================================================================

    /// Record a quality switch and publish `qualitychange`
    ///
    /// Switching to the quality already in effect is not a change.
    #[instrument(skip(self))]
    pub fn set_quality(&mut self, quality: &str) {
        if !self.guard("set_quality") || quality == self.current_quality {
            return;
        }

        let from = std::mem::replace(&mut self.current_quality, quality.to_string());
        self.stats.quality_changes += 1;
        info!(from = %from, to = %quality, "Quality changed");
        self.publish(PlayerEvent::QualityChange {
            from,
            to: quality.to_string(),
        });
    }

    pub fn get_current_quality(&self) -> &str {
        &self.current_quality
    }

    /// `auto` followed by the declared quality tags
    pub fn get_available_qualities(&self) -> Vec<String> {
        let mut qualities = vec![AUTO_QUALITY.to_string()];
        let declared = self
            .config
            .qualities
            .iter()
            .flatten()
            .cloned()
            .chain(self.config.sources.iter().filter_map(|s| s.quality.clone()));

        for quality in declared {
            if !qualities.contains(&quality) {
                qualities.push(quality);
            }
        }
        qualities
    }

    // =========================================================================
    // Fullscreen and picture-in-picture
    // =========================================================================

    pub fn is_fullscreen(&self) -> bool {
        self.element.is_fullscreen()
    }

    pub fn enter_fullscreen(&mut self) -> ControlFuture {
        if !self.guard("enter_fullscreen") || !self.element.fullscreen_supported() {
            return done(Ok(()));
        }
        if self.element.is_fullscreen() {
            return done(Ok(()));
        }
        platform_call(self.element.request_fullscreen())
    }

    pub fn exit_fullscreen(&mut self) -> ControlFuture {
        if !self.guard("exit_fullscreen") || !self.element.fullscreen_supported() {
            return done(Ok(()));
        }
        if !self.element.is_fullscreen() {
            return done(Ok(()));
        }
        platform_call(self.element.exit_fullscreen())
    }

    pub fn toggle_fullscreen(&mut self) -> ControlFuture {
        if self.element.is_fullscreen() {
            self.exit_fullscreen()
        } else {
            self.enter_fullscreen()
        }
    }

    pub fn is_pip(&self) -> bool {
        self.element.is_pip()
    }

    pub fn enter_pip(&mut self) -> ControlFuture {
        if !self.guard("enter_pip") || !self.element.pip_supported() {
            return done(Ok(()));
        }
        if self.element.is_pip() {
            return done(Ok(()));
        }
        platform_call(self.element.request_pip())
    }

    pub fn exit_pip(&mut self) -> ControlFuture {
        if !self.guard("exit_pip") || !self.element.pip_supported() {
            return done(Ok(()));
        }
        if !self.element.is_pip() {
            return done(Ok(()));
        }
        platform_call(self.element.exit_pip())
    }

    pub fn toggle_pip(&mut self) -> ControlFuture {
        if self.element.is_pip() {
            self.exit_pip()
        } else {
            self.enter_pip()
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stop playback, detach the source and release every listener
    ///
    /// Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        let now = Instant::now();
        self.close_play_timer(now);
        self.close_pause_timer(now);

        self.element.pause();
        self.element.set_src(None);
        self.element.load();
        self.emitter.destroy();

        info!("Player destroyed");
    }

    /// Returns false (and logs) when the player is destroyed
    fn guard(&self, operation: &'static str) -> bool {
        if self.destroyed {
            warn!(operation, "Control call on destroyed player ignored");
        }
        !self.destroyed
    }
}

fn platform_call(request: PlatformFuture) -> ControlFuture {
    Box::pin(async move { request.await.map_err(Error::from) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{MediaError, MediaErrorCode};
    use crate::simulated::SimulatedElement;
    use std::sync::{Arc, Mutex};

    fn progressive_config() -> SourceConfig {
        SourceConfig::new(vec![
            VideoSource::new("https://cdn.example.com/clip-720.mp4", SourceFormat::Mp4)
                .with_quality("720p"),
        ])
    }

    fn loaded_wrapper() -> (MediaStateWrapper<SimulatedElement>, SimulatedElement) {
        let element = SimulatedElement::new();
        let mut wrapper = MediaStateWrapper::new(element.clone(), progressive_config());
        if let Some(source) = wrapper.select_source() {
            wrapper.attach_source(&source);
        }
        element.load_media(120.0, 1280, 720);
        (wrapper, element)
    }

    fn record_events(wrapper: &MediaStateWrapper<SimulatedElement>) -> Arc<Mutex<Vec<EventRecord>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in PlayerEventKind::ALL {
            let sink = Arc::clone(&events);
            wrapper.on(kind, move |record| {
                sink.lock().unwrap().push(record.clone());
                Ok(())
            });
        }
        events
    }

    #[test]
    fn test_initial_state() {
        let (wrapper, element) = loaded_wrapper();
        assert_eq!(wrapper.state(), PlaybackState::Idle);
        assert_eq!(wrapper.get_current_quality(), "720p");
        assert_eq!(element.src().as_deref(), Some("https://cdn.example.com/clip-720.mp4"));
    }

    #[test]
    fn test_state_follows_native_signals() {
        let (mut wrapper, _element) = loaded_wrapper();

        let steps = [
            (NativeEvent::LoadStart, PlaybackState::Loading),
            (NativeEvent::CanPlay, PlaybackState::CanPlay),
            (NativeEvent::Play, PlaybackState::Play),
            (NativeEvent::Playing, PlaybackState::Playing),
            (NativeEvent::Waiting, PlaybackState::Waiting),
            (NativeEvent::Playing, PlaybackState::Playing),
            (NativeEvent::Seeking, PlaybackState::Seeking),
            (NativeEvent::Pause, PlaybackState::Paused),
            (NativeEvent::Ended, PlaybackState::Ended),
            (NativeEvent::LoadStart, PlaybackState::Loading),
        ];

        for (signal, expected) in steps {
            wrapper.handle_native_event(signal);
            assert_eq!(wrapper.state(), expected, "after {:?}", signal);
        }
    }

    #[test]
    fn test_events_are_republished() {
        let (mut wrapper, element) = loaded_wrapper();
        let events = record_events(&wrapper);

        element.set_position(3.0);
        wrapper.handle_native_event(NativeEvent::LoadStart);
        wrapper.handle_native_event(NativeEvent::TimeUpdate);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_name(), PlayerEventKind::LoadStart);
        assert_eq!(events[1].event_name(), PlayerEventKind::TimeUpdate);
        assert_eq!(events[1].current_time, 3.0);
        assert_eq!(events[1].duration, 120.0);
    }

    #[test]
    fn test_metadata_refreshed_after_metadata_available() {
        let element = SimulatedElement::new();
        let mut wrapper = MediaStateWrapper::new(element.clone(), progressive_config());

        wrapper.handle_native_event(NativeEvent::LoadStart);
        assert!(wrapper.metadata().duration.is_nan());

        element.load_media(90.0, 1920, 1080);
        element.set_buffered(vec![(0.0, 30.0)]);
        wrapper.handle_native_event(NativeEvent::LoadedMetadata);

        let metadata = wrapper.metadata();
        assert_eq!(metadata.duration, 90.0);
        assert_eq!(metadata.video_height, 1080);
        assert_eq!(metadata.buffered_end(), Some(30.0));
        assert!(metadata.ready_state >= ReadyState::HaveMetadata);
    }

    #[test]
    fn test_stats_counters() {
        let (mut wrapper, _element) = loaded_wrapper();

        wrapper.handle_native_event(NativeEvent::LoadStart);
        wrapper.handle_native_event(NativeEvent::LoadedData);
        wrapper.handle_native_event(NativeEvent::Playing);
        wrapper.handle_native_event(NativeEvent::Seeking);
        wrapper.handle_native_event(NativeEvent::Seeking);
        wrapper.handle_native_event(NativeEvent::Stalled);
        wrapper.handle_native_event(NativeEvent::Pause);
        wrapper.handle_native_event(NativeEvent::Play);

        let stats = wrapper.stats();
        assert_eq!(stats.seek_count, 2);
        assert_eq!(stats.buffering_events, 1);
        assert_eq!(stats.error_count, 0);
        assert!(stats.load_time >= 0.0);
        assert!(stats.play_time >= 0.0);
        assert!(stats.pause_time >= 0.0);
    }

    #[test]
    fn test_native_error_is_fatal_and_counted() {
        let (mut wrapper, element) = loaded_wrapper();
        let events = record_events(&wrapper);

        element.set_error(Some(MediaError::new(MediaErrorCode::Decode, "bad frame")));
        wrapper.handle_native_event(NativeEvent::Error);

        assert_eq!(wrapper.state(), PlaybackState::Error);
        assert_eq!(wrapper.stats().error_count, 1);

        let events = events.lock().unwrap();
        match &events[0].event {
            PlayerEvent::Error(error) => {
                assert_eq!(error.category, ErrorCategory::Decode);
                assert_eq!(error.code, "MEDIA_ERR_DECODE");
                assert!(error.fatal);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_non_fatal_error_keeps_state() {
        let (mut wrapper, _element) = loaded_wrapper();
        wrapper.handle_native_event(NativeEvent::Playing);

        wrapper.report_error(PlaybackError::new(
            ErrorCategory::Network,
            "FRAG_LOAD_ERROR",
            "fragment retry",
            false,
        ));

        assert_eq!(wrapper.state(), PlaybackState::Playing);
        assert_eq!(wrapper.stats().error_count, 0);
    }

    #[test]
    fn test_seek_out_of_range_is_ignored() {
        let (mut wrapper, element) = loaded_wrapper();

        wrapper.seek(30.0);
        assert_eq!(element.current_time(), 30.0);

        wrapper.seek(-1.0);
        wrapper.seek(500.0);
        wrapper.seek(f64::NAN);
        assert_eq!(element.current_time(), 30.0);

        wrapper.seek(120.0);
        assert_eq!(element.current_time(), 120.0);
    }

    #[test]
    fn test_volume_is_clamped() {
        let (mut wrapper, element) = loaded_wrapper();

        wrapper.set_volume(1.7);
        assert_eq!(element.volume(), 1.0);
        wrapper.set_volume(-0.3);
        assert_eq!(element.volume(), 0.0);
        wrapper.set_volume(0.25);
        assert_eq!(element.volume(), 0.25);
        wrapper.set_volume(f64::NAN);
        assert_eq!(element.volume(), 0.25);
    }

    #[test]
    fn test_mute_controls() {
        let (mut wrapper, element) = loaded_wrapper();
        wrapper.mute();
        assert!(element.muted());
        wrapper.toggle_mute();
        assert!(!element.muted());
        wrapper.toggle_mute();
        wrapper.unmute();
        assert!(!element.muted());
    }

    #[test]
    fn test_playback_rate_validation() {
        let (mut wrapper, element) = loaded_wrapper();
        wrapper.set_playback_rate(1.5);
        assert_eq!(element.playback_rate(), 1.5);
        wrapper.set_playback_rate(0.0);
        wrapper.set_playback_rate(f64::INFINITY);
        assert_eq!(element.playback_rate(), 1.5);
    }

    #[test]
    fn test_stop_rewinds() {
        let (mut wrapper, element) = loaded_wrapper();
        wrapper.seek(42.0);
        wrapper.stop();
        assert!(element.paused());
        assert_eq!(element.current_time(), 0.0);
    }

    #[test]
    fn test_base_quality_bookkeeping() {
        let (mut wrapper, _element) = loaded_wrapper();
        let events = record_events(&wrapper);

        wrapper.set_quality("480p");
        wrapper.set_quality("480p");

        assert_eq!(wrapper.get_current_quality(), "480p");
        assert_eq!(wrapper.stats().quality_changes, 1);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].event,
            PlayerEvent::QualityChange {
                from: "720p".into(),
                to: "480p".into()
            }
        );
    }

    #[test]
    fn test_available_qualities_from_config() {
        let element = SimulatedElement::new();
        let mut config = progressive_config();
        config.qualities = Some(vec!["1080p".into(), "720p".into()]);
        let wrapper = MediaStateWrapper::new(element, config);

        assert_eq!(wrapper.get_available_qualities(), vec!["auto", "1080p", "720p"]);
    }

    #[test]
    fn test_initial_attributes_applied() {
        let element = SimulatedElement::new();
        let mut config = progressive_config()
            .with_autoplay(true)
            .with_initial_position(15.0);
        config.muted = Some(true);
        config.initial_volume = Some(3.0);
        config.initial_rate = Some(1.25);

        let mut wrapper = MediaStateWrapper::new(element.clone(), config);
        assert!(element.attributes().autoplay);
        assert!(element.muted());
        assert_eq!(element.volume(), 1.0);
        assert_eq!(element.playback_rate(), 1.25);

        element.load_media(60.0, 640, 360);
        wrapper.handle_native_event(NativeEvent::LoadedMetadata);
        assert_eq!(element.current_time(), 15.0);
    }

    #[tokio::test]
    async fn test_play_rejection_emits_error() {
        let (mut wrapper, element) = loaded_wrapper();
        let events = record_events(&wrapper);
        element.block_autoplay(true);

        let result = wrapper.play().await;
        assert!(matches!(result, Err(Error::PlaybackRejected(_))));

        let events = events.lock().unwrap();
        match &events[0].event {
            PlayerEvent::Error(error) => {
                assert_eq!(error.category, ErrorCategory::Unknown);
                assert!(!error.fatal);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(wrapper.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_fullscreen_without_capability_is_noop() {
        let (mut wrapper, element) = loaded_wrapper();
        element.set_fullscreen_supported(false);

        assert!(wrapper.enter_fullscreen().await.is_ok());
        assert!(!wrapper.is_fullscreen());
    }

    #[tokio::test]
    async fn test_fullscreen_and_pip_toggles() {
        let (mut wrapper, element) = loaded_wrapper();
        element.set_fullscreen_supported(true);
        element.set_pip_supported(true);

        wrapper.toggle_fullscreen().await.unwrap();
        assert!(wrapper.is_fullscreen());
        wrapper.toggle_fullscreen().await.unwrap();
        assert!(!wrapper.is_fullscreen());

        wrapper.enter_pip().await.unwrap();
        assert!(wrapper.is_pip());
        wrapper.exit_pip().await.unwrap();
        assert!(!wrapper.is_pip());
    }

    #[test]
    fn test_destroy_twice() {
        let (mut wrapper, element) = loaded_wrapper();
        record_events(&wrapper);

        wrapper.destroy();
        wrapper.destroy();

        assert!(wrapper.is_destroyed());
        assert_eq!(wrapper.emitter().total_listener_count(), 0);
        assert_eq!(element.src(), None);

        // Later signals and controls are ignored
        wrapper.handle_native_event(NativeEvent::Playing);
        wrapper.set_volume(0.1);
        assert_eq!(wrapper.state(), PlaybackState::Idle);
    }
}
