//! Speculative view engine
//!
//! Routes operations to the overlay and the scheduler according to each
//! channel's [`ChannelSemantics`].

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::warn;

use crate::config::{ChannelConfig, ChannelSemantics, EngineConfig};
use crate::core::{ConfigError, Derivation, Epoch, Mutation, Stamped};
use crate::deferred::{Completion, DeferredScheduler, PublishOutcome, ReadyComputation};
use crate::overlay::{MutationHandle, MutationOverlay, Resolution};

use super::snapshot::ViewSnapshot;

/// Errors from the view engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The channel's semantics do not include the requested operation.
    #[error("{operation} is not supported on a channel with {semantics} semantics")]
    SemanticsMismatch {
        /// Operation that was attempted.
        operation: &'static str,
        /// Semantics configured for the channel.
        semantics: ChannelSemantics,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Speculative view engine
///
/// The engine is generic over:
/// - `K`: the channel key
/// - `T`: the authoritative / live value type
/// - `U`: the derived (settled) value type
///
/// It manages:
/// - A [`MutationOverlay`] for channels with overlay semantics
/// - A [`DeferredScheduler`] for channels with deferred semantics
/// - An optional default derivation, settled automatically on every live
///   update with the channel's configured coalesce window
pub struct SpeculativeView<K, T, U = T> {
    /// Channel configuration
    config: EngineConfig<K>,

    /// Speculative writes
    overlay: MutationOverlay<K, T>,

    /// Deferred reads
    deferred: DeferredScheduler<K, T, U>,

    /// Derivation settled on every live update
    derivation: Option<Arc<dyn Derivation<T, U>>>,
}

impl<K, T, U> SpeculativeView<K, T, U>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: Clone + 'static,
    U: 'static,
{
    /// Create an engine with a validated configuration
    pub fn new(config: EngineConfig<K>) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            overlay: MutationOverlay::new(),
            deferred: DeferredScheduler::new(),
            derivation: None,
        })
    }

    /// Register the derivation settled on every live update
    pub fn with_derivation<F>(mut self, compute: F) -> Self
    where
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.derivation = Some(Arc::new(compute));
        self
    }

    /// Register an already shared derivation
    pub fn set_derivation(&mut self, derivation: Arc<dyn Derivation<T, U>>) {
        self.derivation = Some(derivation);
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig<K> {
        &self.config
    }

    /// Configuration that applies to a channel
    pub fn channel_config(&self, channel: &K) -> ChannelConfig {
        self.config.channel(channel)
    }

    /// Overlay for inspection
    pub fn overlay(&self) -> &MutationOverlay<K, T> {
        &self.overlay
    }

    /// Scheduler for inspection
    pub fn deferred(&self) -> &DeferredScheduler<K, T, U> {
        &self.deferred
    }

    fn require(&self, channel: &K, operation: &'static str, overlay: bool) -> Result<(), EngineError> {
        let semantics = self.config.channel(channel).semantics;
        let supported = if overlay {
            semantics.supports_overlay()
        } else {
            semantics.supports_deferred()
        };
        if supported {
            Ok(())
        } else {
            warn!(?channel, operation, %semantics, "operation rejected by channel semantics");
            Err(EngineError::SemanticsMismatch {
                operation,
                semantics,
            })
        }
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Propose a speculative mutation
    pub fn propose<F>(&mut self, channel: K, apply: F) -> Result<MutationHandle<K>, EngineError>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.require(&channel, "propose", true)?;
        Ok(self.overlay.propose(channel, apply))
    }

    /// Propose a speculative mutation with a presentation label
    pub fn propose_labeled<F>(
        &mut self,
        channel: K,
        label: impl Into<String>,
        apply: F,
    ) -> Result<MutationHandle<K>, EngineError>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.require(&channel, "propose", true)?;
        Ok(self.overlay.propose_labeled(channel, label, apply))
    }

    /// Propose an already shared mutation
    pub fn propose_shared(
        &mut self,
        channel: K,
        label: Option<String>,
        mutation: Arc<dyn Mutation<T>>,
    ) -> Result<MutationHandle<K>, EngineError> {
        self.require(&channel, "propose", true)?;
        Ok(self.overlay.propose_shared(channel, label, mutation))
    }

    /// Confirm a mutation with its authoritative result
    pub fn reconcile(&mut self, handle: &MutationHandle<K>, new_base: T) -> Resolution {
        self.overlay.reconcile(handle, new_base)
    }

    /// Drop a mutation whose operation failed
    pub fn revert(&mut self, handle: &MutationHandle<K>) -> Resolution {
        self.overlay.revert(handle)
    }

    /// Set the authoritative base of a channel
    pub fn set_base(&mut self, channel: K, base: T) -> Result<(), EngineError> {
        self.require(&channel, "set_base", true)?;
        self.overlay.set_base(channel, base);
        Ok(())
    }

    /// Stamp a new authoritative fetch on a channel
    ///
    /// Hand the result back through [`refresh`](Self::refresh) with the
    /// returned epoch.
    pub fn begin_fetch(&mut self, channel: &K) -> Result<Epoch, EngineError> {
        self.require(channel, "begin_fetch", true)?;
        Ok(self.overlay.begin_epoch(channel))
    }

    /// Apply an epoch-stamped fetch result; `Ok(false)` if it was stale
    pub fn refresh(&mut self, channel: &K, result: Stamped<T>) -> Result<bool, EngineError> {
        self.require(channel, "refresh", true)?;
        Ok(self.overlay.refresh(channel, result))
    }

    /// Drop mutations proposed before the channel's latest fetch
    pub fn discard_stale(&mut self, channel: &K) -> usize {
        self.overlay.discard_stale(channel)
    }

    /// Fold the channel's pending mutations over a caller-supplied base
    pub fn view(&self, channel: &K, base: T) -> T {
        self.overlay.view(channel, base)
    }

    /// Merged view over the cached base
    pub fn merged(&self, channel: &K) -> Option<T> {
        self.overlay.merged(channel)
    }

    // -------------------------------------------------------------------------
    // Deferred reads
    // -------------------------------------------------------------------------

    /// Update the live value of a channel
    ///
    /// If a derivation is registered it is settled with the channel's
    /// coalesce window.
    pub fn set_live(&mut self, channel: K, value: T) -> Result<Epoch, EngineError> {
        self.set_live_at(channel, value, Instant::now())
    }

    /// [`set_live`](Self::set_live) at a given time
    pub fn set_live_at(&mut self, channel: K, value: T, now: Instant) -> Result<Epoch, EngineError> {
        self.require(&channel, "set_live", false)?;
        let window = self.config.channel(&channel).coalesce_window();
        let epoch = self.deferred.set_live_at(channel.clone(), value, now);
        if let Some(derivation) = &self.derivation {
            self.deferred
                .settle_shared_at(channel, Arc::clone(derivation), window, now);
        }
        Ok(epoch)
    }

    /// Request a derivation with the channel's coalesce window
    pub fn settle<F>(&mut self, channel: K, compute: F) -> Result<(), EngineError>
    where
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.require(&channel, "settle", false)?;
        let window = self.config.channel(&channel).coalesce_window();
        self.deferred.settle(channel, compute, window);
        Ok(())
    }

    /// Dispatch every due derivation at a given time
    pub fn poll_at(&mut self, now: Instant) -> Vec<ReadyComputation<K, T, U>> {
        self.deferred.poll_at(now)
    }

    /// Publish a finished derivation
    pub fn publish(&mut self, completion: Completion<K, U>) -> PublishOutcome {
        self.deferred.publish(completion)
    }

    /// Dispatch, run and publish every due derivation inline
    pub fn run_due_at(&mut self, now: Instant) -> usize {
        self.deferred.run_due_at(now)
    }

    /// Time until the next derivation becomes due
    pub fn time_until_due_at(&self, now: Instant) -> Option<std::time::Duration> {
        self.deferred.time_until_due_at(now)
    }

    /// Whether the settled value lags the live value
    pub fn is_catching_up(&self, channel: &K) -> bool {
        self.deferred.is_catching_up(channel)
    }

    /// Live value of a channel
    pub fn live(&self, channel: &K) -> Option<&T> {
        self.deferred.live(channel)
    }

    /// Settled value of a channel
    pub fn settled(&self, channel: &K) -> Option<&U> {
        self.deferred.settled(channel)
    }
}

impl<K, T, U> SpeculativeView<K, T, U>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: Clone + 'static,
    U: Clone + 'static,
{
    /// Render one channel for the presentation layer
    pub fn snapshot(&self, channel: &K) -> ViewSnapshot<T, U> {
        let pair = self.deferred.pair(channel);
        ViewSnapshot {
            view: self.overlay.merged(channel),
            pending_mutations: self.overlay.pending_count(channel),
            live: pair.map(|p| p.live().clone()),
            settled: pair.and_then(|p| p.settled().cloned()),
            catching_up: pair.is_some_and(|p| p.is_catching_up()),
        }
    }
}

impl<K: fmt::Debug, T, U> fmt::Debug for SpeculativeView<K, T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeculativeView")
            .field("config", &self.config)
            .field("overlay", &self.overlay)
            .field("deferred", &self.deferred)
            .field("has_derivation", &self.derivation.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfigBuilder;
    use std::time::Duration;

    type Engine = SpeculativeView<&'static str, String, usize>;

    fn create_engine() -> Engine {
        let config = EngineConfigBuilder::new()
            .coalesce_window(Duration::from_millis(30))
            .channel(
                "todos",
                ChannelConfig::default().with_semantics(ChannelSemantics::Overlay),
            )
            .channel("search", ChannelConfig::typing())
            .build()
            .unwrap();

        SpeculativeView::new(config)
            .unwrap()
            .with_derivation(|query: &String| query.len())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config: EngineConfig<&str> = EngineConfig::default();
        config.default_channel = config
            .default_channel
            .with_coalesce_window(Duration::from_secs(3600));

        let result: Result<Engine, _> = SpeculativeView::new(config);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_semantics_enforced() {
        let mut engine = create_engine();

        let err = engine.set_live("todos", "x".into()).unwrap_err();
        assert_eq!(
            err,
            EngineError::SemanticsMismatch {
                operation: "set_live",
                semantics: ChannelSemantics::Overlay
            }
        );

        assert!(engine.propose("search", |s| s).is_err());
        assert!(engine.set_base("search", String::new()).is_err());
    }

    #[test]
    fn test_overlay_channel() {
        let mut engine = create_engine();
        engine.set_base("todos", "a".into()).unwrap();

        let handle = engine
            .propose_labeled("todos", "append", |s: String| s + "b")
            .unwrap();
        assert_eq!(engine.merged(&"todos").as_deref(), Some("ab"));

        let snapshot = engine.snapshot(&"todos");
        assert!(snapshot.is_pending());
        assert!(!snapshot.catching_up);

        engine.reconcile(&handle, "ab".into());
        assert!(engine.snapshot(&"todos").is_quiescent());
    }

    #[test]
    fn test_live_update_settles_with_registered_derivation() {
        let mut engine = create_engine();
        let start = Instant::now();

        engine.set_live_at("search", "ru".into(), start).unwrap();
        engine
            .set_live_at("search", "rust".into(), start + Duration::from_millis(100))
            .unwrap();

        let snapshot = engine.snapshot(&"search");
        assert!(snapshot.catching_up);
        assert_eq!(snapshot.live.map(|l| l.value), Some("rust".to_string()));

        // typing() preset: 300ms window from the last input
        assert_eq!(engine.run_due_at(start + Duration::from_millis(350)), 0);
        assert_eq!(engine.run_due_at(start + Duration::from_millis(400)), 1);

        assert_eq!(engine.settled(&"search"), Some(&4));
        assert!(!engine.is_catching_up(&"search"));
    }

    #[test]
    fn test_set_shared_derivation() {
        let config = EngineConfigBuilder::new()
            .coalesce_window(Duration::ZERO)
            .build()
            .unwrap();
        let mut engine: Engine = SpeculativeView::new(config).unwrap();
        let now = Instant::now();

        // Without a derivation a live update settles nothing.
        engine.set_live_at("query", "abc".into(), now).unwrap();
        assert_eq!(engine.run_due_at(now), 0);

        let count_vowels: Arc<dyn Derivation<String, usize>> =
            Arc::new(|s: &String| s.chars().filter(|c| "aeiou".contains(*c)).count());
        engine.set_derivation(count_vowels);
        engine.set_live_at("query", "abode".into(), now).unwrap();

        assert_eq!(engine.run_due_at(now), 1);
        assert_eq!(engine.settled(&"query"), Some(&3));
    }

    #[test]
    fn test_default_channel_supports_both() {
        let mut engine = create_engine();
        let now = Instant::now();

        engine.set_base("draft", "hello".into()).unwrap();
        engine.propose("draft", |s: String| s.to_uppercase()).unwrap();
        engine.set_live_at("draft", "hello".into(), now).unwrap();
        engine.run_due_at(now + Duration::from_millis(30));

        let snapshot = engine.snapshot(&"draft");
        assert_eq!(snapshot.view.as_deref(), Some("HELLO"));
        assert_eq!(snapshot.settled.map(|s| s.value), Some(5));
    }

    #[test]
    fn test_fetch_refresh_and_discard() {
        let mut engine = create_engine();

        let stale_fetch = engine.begin_fetch(&"todos").unwrap();
        let handle = engine.propose("todos", |s: String| s + "!").unwrap();
        let fetch = engine.begin_fetch(&"todos").unwrap();

        assert!(!engine.refresh(&"todos", Stamped::new(stale_fetch, "old".into())).unwrap());
        assert!(engine.refresh(&"todos", Stamped::new(fetch, "new".into())).unwrap());
        assert_eq!(engine.merged(&"todos").as_deref(), Some("new!"));

        assert_eq!(engine.discard_stale(&"todos"), 1);
        assert_eq!(engine.revert(&handle), Resolution::AlreadyResolved);
        assert_eq!(engine.merged(&"todos").as_deref(), Some("new"));
    }
}
