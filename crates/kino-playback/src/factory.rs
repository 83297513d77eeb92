//! Player Factory - configuration validation, controller selection and the
//! live player registry

use crate::{
    adaptive::{AdaptiveStreamController, RecoveryPolicy, StreamCapability},
    element::MediaElement,
    engine::{EngineProvider, NoEngine},
    player::{Player, PlayerKind},
    types::*,
    validation::validate_config,
    wrapper::MediaStateWrapper,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Coarse per-player footprint used by [`RegistryStats`]
const PLAYER_BASE_BYTES: usize = 4 * 1024;
const LISTENER_BYTES: usize = 128;
const LEVEL_BYTES: usize = 96;

/// Builds players from source configurations
pub struct PlayerFactory {
    provider: Arc<dyn EngineProvider>,
    recovery: RecoveryPolicy,
}

impl Default for PlayerFactory {
    fn default() -> Self {
        Self::new(Arc::new(NoEngine))
    }
}

impl PlayerFactory {
    /// Create a factory using `provider` for adaptive streams
    pub fn new(provider: Arc<dyn EngineProvider>) -> Self {
        Self {
            provider,
            recovery: RecoveryPolicy::default(),
        }
    }

    pub fn with_recovery_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.recovery = policy;
        self
    }

    pub fn provider(&self) -> &Arc<dyn EngineProvider> {
        &self.provider
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        self.recovery
    }

    /// Controller family for a configuration: adaptive, then DASH, then progressive
    pub fn select_kind(config: &SourceConfig) -> PlayerKind {
        if config.adaptive_source().is_some() {
            PlayerKind::Adaptive
        } else if config.dash_source().is_some() {
            PlayerKind::Dash
        } else {
            PlayerKind::Progressive
        }
    }

    /// Validate and build a player without registering it
    ///
    /// The player is inert until [`Player::load`].
    #[instrument(skip(self, element, config), fields(sources = config.sources.len()))]
    pub fn build<E: MediaElement>(&self, element: E, config: SourceConfig) -> Result<Player<E>> {
        validate_config(&config)?;

        let kind = Self::select_kind(&config);
        let player = match kind {
            PlayerKind::Adaptive => Player::adaptive(AdaptiveStreamController::new(
                element,
                config,
                Arc::clone(&self.provider),
                self.recovery,
            )?),
            PlayerKind::Dash | PlayerKind::Progressive => {
                Player::standard(kind, MediaStateWrapper::new(element, config))
            }
        };

        info!(player = %player.id(), kind = %kind, "Player created");
        Ok(player)
    }

    /// Validate, build and register a player
    pub fn create<E: MediaElement>(
        &self,
        registry: &mut PlayerRegistry<E>,
        element: E,
        config: SourceConfig,
    ) -> Result<PlayerId> {
        let player = self.build(element, config)?;
        Ok(registry.insert(player))
    }

    /// Like [`PlayerFactory::create`], but refuses adaptive configurations the
    /// host cannot play before anything is constructed
    pub fn create_smart<E: MediaElement>(
        &self,
        registry: &mut PlayerRegistry<E>,
        element: E,
        config: SourceConfig,
    ) -> Result<PlayerId> {
        validate_config(&config)?;

        if Self::select_kind(&config) == PlayerKind::Adaptive {
            let capability = StreamCapability::detect(&element, self.provider.as_ref());
            if !capability.is_supported() {
                warn!("No native or engine support for adaptive streams");
                return Err(Error::UnsupportedSource(
                    "adaptive streaming is not supported on this platform".to_string(),
                ));
            }
        }

        self.create(registry, element, config)
    }

    /// Create one player per entry
    ///
    /// Entries are independent: a failure leaves earlier players registered.
    pub fn create_batch<E, I>(&self, registry: &mut PlayerRegistry<E>, entries: I) -> Vec<Result<PlayerId>>
    where
        E: MediaElement,
        I: IntoIterator<Item = (E, SourceConfig)>,
    {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, (element, config))| {
                self.create(registry, element, config).inspect_err(|e| {
                    warn!(index, code = e.error_code(), error = %e, "Batch entry failed");
                })
            })
            .collect()
    }

    /// Create a new player on `element` from a registered player's configuration
    pub fn clone_player<E: MediaElement>(
        &self,
        registry: &mut PlayerRegistry<E>,
        id: PlayerId,
        element: E,
    ) -> Result<PlayerId> {
        let config = registry
            .get(id)
            .map(|player| player.config().clone())
            .ok_or_else(|| Error::PlayerNotFound(id.to_string()))?;
        self.create(registry, element, config)
    }
}

/// Snapshot of the registry's contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub players: usize,
    pub adaptive: usize,
    pub dash: usize,
    pub progressive: usize,
    pub listeners: usize,
    /// Rough memory estimate, not a measurement
    pub estimated_bytes: usize,
}

/// Live players, in creation order
pub struct PlayerRegistry<E: MediaElement> {
    players: Vec<Player<E>>,
}

impl<E: MediaElement> Default for PlayerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MediaElement> PlayerRegistry<E> {
    pub fn new() -> Self {
        Self { players: Vec::new() }
    }

    pub fn insert(&mut self, player: Player<E>) -> PlayerId {
        let id = player.id();
        self.players.push(player);
        id
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player<E>> {
        self.players.iter().find(|p| p.id() == id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player<E>> {
        self.players.iter_mut().find(|p| p.id() == id)
    }

    /// Stop tracking a player without destroying it
    pub fn remove(&mut self, id: PlayerId) -> Option<Player<E>> {
        let index = self.players.iter().position(|p| p.id() == id)?;
        Some(self.players.remove(index))
    }

    /// Destroy and unregister a player; returns false if it was not tracked
    pub fn destroy(&mut self, id: PlayerId) -> bool {
        match self.remove(id) {
            Some(mut player) => {
                player.destroy();
                true
            }
            None => false,
        }
    }

    /// Destroy every tracked player
    pub fn destroy_all(&mut self) {
        let count = self.players.len();
        for mut player in self.players.drain(..) {
            player.destroy();
        }
        info!(count, "All players destroyed");
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(Player::id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player<E>> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            players: self.players.len(),
            ..Default::default()
        };

        for player in &self.players {
            match player.kind() {
                PlayerKind::Adaptive => stats.adaptive += 1,
                PlayerKind::Dash => stats.dash += 1,
                PlayerKind::Progressive => stats.progressive += 1,
            }

            let listeners = player.emitter().total_listener_count();
            let levels = player.adaptive_controller().map_or(0, |c| c.levels().len());
            stats.listeners += listeners;
            stats.estimated_bytes +=
                PLAYER_BASE_BYTES + listeners * LISTENER_BYTES + levels * LEVEL_BYTES;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StreamingOptions;
    use crate::simulated::{SimulatedElement, SimulatedEngineProvider};

    fn factory() -> PlayerFactory {
        PlayerFactory::new(Arc::new(SimulatedEngineProvider::new()))
    }

    fn mp4_config() -> SourceConfig {
        SourceConfig::new(vec![VideoSource::new(
            "https://cdn.example.com/clip.mp4",
            SourceFormat::Mp4,
        )])
    }

    fn hls_config() -> SourceConfig {
        SourceConfig::new(vec![
            VideoSource::new("https://cdn.example.com/clip.mp4", SourceFormat::Mp4),
            VideoSource::new("https://cdn.example.com/master.m3u8", SourceFormat::Hls),
        ])
        .with_streaming_options(StreamingOptions {
            enable_worker: Some(false),
            ..Default::default()
        })
    }

    #[test]
    fn test_selection_priority() {
        assert_eq!(PlayerFactory::select_kind(&hls_config()), PlayerKind::Adaptive);
        assert_eq!(PlayerFactory::select_kind(&mp4_config()), PlayerKind::Progressive);

        let dash = mp4_config().with_source(VideoSource::new(
            "https://cdn.example.com/manifest.mpd",
            SourceFormat::Dash,
        ));
        assert_eq!(PlayerFactory::select_kind(&dash), PlayerKind::Dash);
    }

    #[test]
    fn test_create_registers_player() {
        let mut registry = PlayerRegistry::new();
        let element = SimulatedElement::new();

        let id = factory()
            .create(&mut registry, element.clone(), mp4_config())
            .unwrap();
        assert_eq!(element.src(), None);
        registry.get_mut(id).unwrap().load().unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(id).unwrap().kind(), PlayerKind::Progressive);
        assert_eq!(element.src().as_deref(), Some("https://cdn.example.com/clip.mp4"));
    }

    #[test]
    fn test_dash_attached_directly() {
        let mut registry = PlayerRegistry::new();
        let element = SimulatedElement::new();
        let config = SourceConfig::new(vec![VideoSource::new(
            "https://cdn.example.com/manifest.mpd",
            SourceFormat::Dash,
        )]);

        let id = factory().create(&mut registry, element.clone(), config).unwrap();
        registry.get_mut(id).unwrap().load().unwrap();
        assert_eq!(registry.get(id).unwrap().kind(), PlayerKind::Dash);
        assert_eq!(element.src().as_deref(), Some("https://cdn.example.com/manifest.mpd"));
    }

    #[test]
    fn test_load_is_deferred_until_requested() {
        let mut registry = PlayerRegistry::new();
        let provider = Arc::new(SimulatedEngineProvider::new());
        let factory = PlayerFactory::new(provider.clone());
        let element = SimulatedElement::new();

        let id = factory.create(&mut registry, element.clone(), hls_config()).unwrap();
        let player = registry.get_mut(id).unwrap();
        assert!(!player.is_loaded());
        assert_eq!(provider.journal().created, 0);
        assert_eq!(player.adaptive_controller().and_then(|c| c.mode()), None);

        player.load().unwrap();
        player.load().unwrap();
        assert!(player.is_loaded());
        assert_eq!(provider.journal().created, 1);
        assert_eq!(provider.journal().loads, vec!["https://cdn.example.com/master.m3u8"]);

        player.destroy();
        assert!(matches!(player.load(), Err(Error::Destroyed)));
    }

    #[test]
    fn test_empty_sources_rejected_before_construction() {
        let mut registry = PlayerRegistry::new();
        let element = SimulatedElement::new();

        let result = factory().create(&mut registry, element.clone(), SourceConfig::default());

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert!(registry.is_empty());
        assert_eq!(element.load_count(), 0);
        assert_eq!(element.attributes(), Default::default());
    }

    #[test]
    fn test_create_smart_rejects_unsupported_host() {
        let mut registry = PlayerRegistry::new();
        let factory = PlayerFactory::new(Arc::new(SimulatedEngineProvider::unsupported()));

        let result = factory.create_smart(&mut registry, SimulatedElement::new(), hls_config());
        assert!(matches!(result, Err(Error::UnsupportedSource(_))));
        assert!(registry.is_empty());

        // Progressive configurations skip the capability check
        assert!(factory
            .create_smart(&mut registry, SimulatedElement::new(), mp4_config())
            .is_ok());
    }

    #[test]
    fn test_create_smart_native_support() {
        let mut registry = PlayerRegistry::new();
        let factory = PlayerFactory::default();
        let element = SimulatedElement::new();
        element.set_native_hls(true);

        let id = factory.create_smart(&mut registry, element, hls_config()).unwrap();
        let player = registry.get_mut(id).unwrap();
        player.load().unwrap();
        assert_eq!(player.kind(), PlayerKind::Adaptive);
        assert_eq!(
            player.adaptive_controller().and_then(|c| c.mode()),
            Some(StreamMode::Native)
        );
    }

    #[test]
    fn test_batch_is_not_atomic() {
        let mut registry = PlayerRegistry::new();
        let results = factory().create_batch(
            &mut registry,
            vec![
                (SimulatedElement::new(), mp4_config()),
                (SimulatedElement::new(), SourceConfig::default()),
                (SimulatedElement::new(), hls_config()),
            ],
        );

        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clone_player() {
        let mut registry = PlayerRegistry::new();
        let factory = factory();
        let original = factory
            .create(&mut registry, SimulatedElement::new(), hls_config())
            .unwrap();

        let copy = factory
            .clone_player(&mut registry, original, SimulatedElement::new())
            .unwrap();

        assert_ne!(original, copy);
        assert_eq!(registry.get(copy).unwrap().kind(), PlayerKind::Adaptive);

        let missing = factory.clone_player(&mut registry, PlayerId::new(), SimulatedElement::new());
        assert!(matches!(missing, Err(Error::PlayerNotFound(_))));
    }

    #[test]
    fn test_registry_destroy_and_stats() {
        let mut registry = PlayerRegistry::new();
        let factory = factory();
        let a = factory
            .create(&mut registry, SimulatedElement::new(), mp4_config())
            .unwrap();
        factory
            .create(&mut registry, SimulatedElement::new(), hls_config())
            .unwrap();

        registry.get(a).unwrap().on(PlayerEventKind::Play, |_| Ok(()));

        let stats = registry.stats();
        assert_eq!(stats.players, 2);
        assert_eq!(stats.adaptive, 1);
        assert_eq!(stats.progressive, 1);
        assert_eq!(stats.listeners, 1);
        assert!(stats.estimated_bytes >= 2 * PLAYER_BASE_BYTES);

        assert!(registry.destroy(a));
        assert!(!registry.destroy(a));
        assert_eq!(registry.len(), 1);

        registry.destroy_all();
        assert!(registry.is_empty());
    }
}
