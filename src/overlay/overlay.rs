//! Mutation overlay
//!
//! Coordinates speculative writes across channels. Generic over the channel
//! key `K` and the authoritative value type `T`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::{Epoch, Mutation, Stamped};
use crate::epoch::EpochTracker;

use super::mutation::{MutationHandle, MutationId, MutationInfo, Resolution, SpeculativeMutation};
use super::queue::MutationQueue;

/// Counters describing overlay activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayStats {
    /// Mutations proposed
    pub proposed: u64,
    /// Mutations removed by reconciliation
    pub reconciled: u64,
    /// Mutations removed by reversion
    pub reverted: u64,
    /// Mutations removed because their epoch went stale
    pub discarded: u64,
    /// Resolutions that found the handle already gone
    pub duplicate_resolutions: u64,
    /// Authoritative refreshes rejected as stale
    pub stale_refreshes: u64,
}

/// Optimistic mutation overlay
///
/// The overlay manages:
/// - Epoch tracking per channel
/// - An authoritative base and a pending mutation queue per channel
/// - Reconciliation and reversion of pending mutations
///
/// # Example
///
/// ```
/// use speculative_view::overlay::MutationOverlay;
///
/// let mut overlay = MutationOverlay::new();
/// overlay.set_base("likes", 10);
///
/// let like = overlay.propose("likes", |n: u32| n + 1);
/// assert_eq!(overlay.merged(&"likes"), Some(11));
///
/// // The server confirms.
/// overlay.reconcile(&like, 11);
/// assert_eq!(overlay.merged(&"likes"), Some(11));
/// assert!(!overlay.is_pending(&"likes"));
/// ```
pub struct MutationOverlay<K, T> {
    /// Epochs per channel
    epochs: EpochTracker<K>,

    /// Base and pending queue per channel
    channels: HashMap<K, MutationQueue<T>>,

    /// Next mutation id (shared across channels)
    next_id: u64,

    /// Activity counters
    stats: OverlayStats,
}

impl<K, T> Default for MutationOverlay<K, T> {
    fn default() -> Self {
        Self {
            epochs: EpochTracker::default(),
            channels: HashMap::new(),
            next_id: 1,
            stats: OverlayStats::default(),
        }
    }
}

impl<K, T> MutationOverlay<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: 'static,
{
    /// Create an empty overlay
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch tracker for inspection
    pub fn epochs(&self) -> &EpochTracker<K> {
        &self.epochs
    }

    /// Activity counters
    pub fn stats(&self) -> OverlayStats {
        self.stats
    }

    /// Stamp a new triggering input on a channel
    ///
    /// Pending mutations keep their older stamp; call
    /// [`discard_stale`](Self::discard_stale) to drop them.
    pub fn begin_epoch(&mut self, channel: &K) -> Epoch {
        self.epochs.begin_epoch(channel)
    }

    /// Current epoch of a channel
    pub fn current_epoch(&self, channel: &K) -> Epoch {
        self.epochs.current_epoch(channel)
    }

    /// Propose a speculative mutation
    ///
    /// The mutation is stamped with the channel's current epoch and is part
    /// of the merged view as soon as this returns.
    pub fn propose<F>(&mut self, channel: K, apply: F) -> MutationHandle<K>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.push(channel, None, Arc::new(apply))
    }

    /// Propose a speculative mutation with a presentation label
    pub fn propose_labeled<F>(
        &mut self,
        channel: K,
        label: impl Into<String>,
        apply: F,
    ) -> MutationHandle<K>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.push(channel, Some(label.into()), Arc::new(apply))
    }

    /// Propose a typed mutation (a struct implementing [`Mutation`])
    pub fn propose_mutation<M>(
        &mut self,
        channel: K,
        label: Option<String>,
        mutation: M,
    ) -> MutationHandle<K>
    where
        M: Mutation<T> + 'static,
    {
        self.push(channel, label, Arc::new(mutation))
    }

    /// Propose an already shared mutation
    pub fn propose_shared(
        &mut self,
        channel: K,
        label: Option<String>,
        mutation: Arc<dyn Mutation<T>>,
    ) -> MutationHandle<K> {
        self.push(channel, label, mutation)
    }

    fn push(
        &mut self,
        channel: K,
        label: Option<String>,
        apply: Arc<dyn Mutation<T>>,
    ) -> MutationHandle<K> {
        let id = MutationId::new(self.next_id);
        self.next_id += 1;
        let epoch = self.epochs.current_epoch(&channel);

        trace!(?channel, %id, %epoch, "mutation proposed");
        self.channels
            .entry(channel.clone())
            .or_default()
            .push(SpeculativeMutation::new(id, epoch, label, apply));
        self.stats.proposed += 1;

        MutationHandle { channel, id, epoch }
    }

    /// Fold the channel's pending mutations over a caller-supplied base
    pub fn view(&self, channel: &K, base: T) -> T {
        match self.channels.get(channel) {
            Some(queue) => queue.fold(base),
            None => base,
        }
    }

    /// Confirm a mutation with the authoritative result of its operation
    ///
    /// Sets the channel's base to `new_base` and removes the mutation.
    /// Remaining mutations keep folding over the new base in proposal order.
    /// A handle that was already resolved is a no-op and leaves the base
    /// untouched.
    pub fn reconcile(&mut self, handle: &MutationHandle<K>, new_base: T) -> Resolution {
        let Some(queue) = self.channels.get_mut(&handle.channel) else {
            return self.already_resolved(handle, "reconcile");
        };
        if queue.remove(handle.id).is_none() {
            return self.already_resolved(handle, "reconcile");
        }

        queue.set_base(new_base);
        self.stats.reconciled += 1;
        debug!(channel = ?handle.channel, id = %handle.id, remaining = queue.len(), "mutation reconciled");
        Resolution::Resolved
    }

    /// Drop a mutation whose operation failed
    ///
    /// The base is left unchanged. A handle that was already resolved is a
    /// no-op.
    pub fn revert(&mut self, handle: &MutationHandle<K>) -> Resolution {
        let removed = self
            .channels
            .get_mut(&handle.channel)
            .and_then(|queue| queue.remove(handle.id));
        if removed.is_none() {
            return self.already_resolved(handle, "revert");
        }

        self.stats.reverted += 1;
        debug!(channel = ?handle.channel, id = %handle.id, "mutation reverted");
        Resolution::Resolved
    }

    fn already_resolved(&mut self, handle: &MutationHandle<K>, op: &'static str) -> Resolution {
        self.stats.duplicate_resolutions += 1;
        trace!(channel = ?handle.channel, id = %handle.id, op, "handle already resolved");
        Resolution::AlreadyResolved
    }

    /// Set the authoritative base (e.g. after the initial fetch)
    pub fn set_base(&mut self, channel: K, base: T) {
        self.channels.entry(channel).or_default().set_base(base);
    }

    /// Apply an epoch-stamped authoritative fetch result
    ///
    /// Returns `false`, leaving the base untouched, if a newer epoch was
    /// begun on the channel after the fetch was issued.
    pub fn refresh(&mut self, channel: &K, result: Stamped<T>) -> bool {
        if let Err(stale) = self.epochs.fence(channel, result.epoch) {
            self.stats.stale_refreshes += 1;
            debug!(?channel, received = %stale.received, current = %stale.current, "stale refresh discarded");
            return false;
        }

        self.channels
            .entry(channel.clone())
            .or_default()
            .set_base(result.value);
        true
    }

    /// Drop every mutation stamped with an epoch older than the channel's
    /// current epoch
    ///
    /// Returns the number of mutations dropped. Handles of dropped mutations
    /// become no-ops.
    pub fn discard_stale(&mut self, channel: &K) -> usize {
        let current = self.epochs.current_epoch(channel);
        let dropped = self
            .channels
            .get_mut(channel)
            .map_or(0, |queue| queue.remove_older_than(current));

        if dropped > 0 {
            self.stats.discarded += dropped as u64;
            debug!(?channel, %current, dropped, "stale mutations discarded");
        }
        dropped
    }

    /// Cached authoritative base of a channel
    pub fn base(&self, channel: &K) -> Option<&T> {
        self.channels.get(channel).and_then(MutationQueue::base)
    }

    /// Whether a mutation is still pending
    pub fn contains(&self, handle: &MutationHandle<K>) -> bool {
        self.channels
            .get(&handle.channel)
            .is_some_and(|queue| queue.contains(handle.id))
    }

    /// Whether the channel has unconfirmed mutations
    pub fn is_pending(&self, channel: &K) -> bool {
        self.pending_count(channel) > 0
    }

    /// Number of unconfirmed mutations on a channel
    pub fn pending_count(&self, channel: &K) -> usize {
        self.channels.get(channel).map_or(0, MutationQueue::len)
    }

    /// Summaries of the channel's pending mutations, in proposal order
    pub fn pending(&self, channel: &K) -> impl Iterator<Item = MutationInfo<'_>> {
        self.channels
            .get(channel)
            .into_iter()
            .flat_map(MutationQueue::infos)
    }
}

impl<K, T> MutationOverlay<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: Clone + 'static,
{
    /// Merged view over the cached base, if one has been supplied
    pub fn merged(&self, channel: &K) -> Option<T> {
        self.channels.get(channel).and_then(MutationQueue::merged)
    }
}

impl<K: fmt::Debug, T> fmt::Debug for MutationOverlay<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationOverlay")
            .field("epochs", &self.epochs)
            .field("channels", &self.channels.len())
            .field("next_id", &self.next_id)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_overlay() -> MutationOverlay<&'static str, i64> {
        MutationOverlay::new()
    }

    #[test]
    fn test_propose_is_visible_immediately() {
        let mut overlay = create_overlay();

        overlay.propose("count", |n| n + 1);

        assert_eq!(overlay.view(&"count", 10), 11);
        assert!(overlay.is_pending(&"count"));
    }

    #[test]
    fn test_reconcile_single() {
        let mut overlay = create_overlay();

        let a = overlay.propose("count", |n| n + 1);
        assert_eq!(overlay.view(&"count", 10), 11);

        assert_eq!(overlay.reconcile(&a, 11), Resolution::Resolved);
        assert_eq!(overlay.merged(&"count"), Some(11));
        assert_eq!(overlay.pending_count(&"count"), 0);
    }

    #[test]
    fn test_reconcile_out_of_order() {
        let mut overlay = create_overlay();
        overlay.set_base("count", 10);

        let a = overlay.propose("count", |n| n + 1);
        let b = overlay.propose("count", |n| n + 2);
        assert_eq!(overlay.merged(&"count"), Some(13));

        // Server applied B first
        overlay.reconcile(&b, 12);
        assert_eq!(overlay.merged(&"count"), Some(13));

        overlay.reconcile(&a, 13);
        assert_eq!(overlay.merged(&"count"), Some(13));
        assert!(!overlay.is_pending(&"count"));
    }

    #[test]
    fn test_revert() {
        let mut overlay = create_overlay();
        overlay.set_base("count", 10);

        let a = overlay.propose("count", |n| n + 1);
        assert_eq!(overlay.revert(&a), Resolution::Resolved);

        assert_eq!(overlay.merged(&"count"), Some(10));
        assert_eq!(overlay.base(&"count"), Some(&10));
    }

    #[test]
    fn test_double_resolution_is_noop() {
        let mut overlay = create_overlay();
        overlay.set_base("count", 10);

        let a = overlay.propose("count", |n| n + 1);
        overlay.revert(&a);

        assert_eq!(overlay.revert(&a), Resolution::AlreadyResolved);
        assert_eq!(overlay.reconcile(&a, 99), Resolution::AlreadyResolved);
        assert_eq!(overlay.merged(&"count"), Some(10));
        assert_eq!(overlay.stats().duplicate_resolutions, 2);
    }

    #[test]
    fn test_unknown_channel_handle_is_noop() {
        let mut overlay = create_overlay();
        let handle = MutationHandle {
            channel: "nowhere",
            id: MutationId::new(42),
            epoch: Epoch::ZERO,
        };

        assert_eq!(overlay.revert(&handle), Resolution::AlreadyResolved);
        assert_eq!(overlay.reconcile(&handle, 1), Resolution::AlreadyResolved);
        assert!(overlay.base(&"nowhere").is_none());
    }

    #[test]
    fn test_view_is_stable() {
        let mut overlay = create_overlay();
        overlay.propose("count", |n| n * 3);
        overlay.propose("count", |n| n - 1);

        let first = overlay.view(&"count", 4);
        let second = overlay.view(&"count", 4);
        assert_eq!(first, 11);
        assert_eq!(first, second);
    }

    #[test]
    fn test_channels_are_isolated() {
        let mut overlay = create_overlay();

        overlay.propose("a", |n| n + 100);
        assert_eq!(overlay.view(&"b", 1), 1);
        assert!(!overlay.is_pending(&"b"));
    }

    #[test]
    fn test_propose_uses_current_epoch() {
        let mut overlay = create_overlay();

        let a = overlay.propose("count", |n| n + 1);
        assert_eq!(a.epoch, Epoch::ZERO);

        let epoch = overlay.begin_epoch(&"count");
        let b = overlay.propose("count", |n| n + 1);
        assert_eq!(b.epoch, epoch);
        assert!(a.id < b.id);
        assert!(overlay.epochs().is_current(&"count", epoch));
        assert_eq!(overlay.epochs().channel_count(), 1);
    }

    #[test]
    fn test_refresh_is_fenced() {
        let mut overlay = create_overlay();

        let first = overlay.begin_epoch(&"list");
        let second = overlay.begin_epoch(&"list");

        assert!(overlay.refresh(&"list", Stamped::new(second, 2)));
        assert!(!overlay.refresh(&"list", Stamped::new(first, 1)));
        assert_eq!(overlay.base(&"list"), Some(&2));
        assert_eq!(overlay.stats().stale_refreshes, 1);
    }

    #[test]
    fn test_discard_stale() {
        let mut overlay = create_overlay();
        overlay.set_base("count", 0);

        let old = overlay.propose("count", |n| n + 1);
        overlay.begin_epoch(&"count");
        let fresh = overlay.propose("count", |n| n + 10);

        assert_eq!(overlay.discard_stale(&"count"), 1);
        assert!(!overlay.contains(&old));
        assert!(overlay.contains(&fresh));
        assert_eq!(overlay.merged(&"count"), Some(10));

        // A late completion for the discarded mutation is inert
        assert_eq!(overlay.reconcile(&old, 1), Resolution::AlreadyResolved);
        assert_eq!(overlay.merged(&"count"), Some(10));
    }

    #[test]
    fn test_pending_labels() {
        let mut overlay: MutationOverlay<&str, Vec<String>> = MutationOverlay::new();

        overlay.propose_labeled("todos", "add milk", |mut items: Vec<String>| {
            items.push("milk".into());
            items
        });
        overlay.propose("todos", |items: Vec<String>| items);

        let labels: Vec<_> = overlay.pending(&"todos").map(|info| info.label).collect();
        assert_eq!(labels, vec![Some("add milk"), None]);
        assert_eq!(overlay.pending(&"other").count(), 0);
    }

    struct Rename(&'static str);

    impl Mutation<String> for Rename {
        fn apply(&self, _base: String) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_typed_mutation() {
        let mut overlay: MutationOverlay<u32, String> = MutationOverlay::new();
        overlay.set_base(7, "draft".to_string());

        let handle = overlay.propose_mutation(7, Some("rename".into()), Rename("final"));
        assert_eq!(overlay.merged(&7).as_deref(), Some("final"));

        overlay.revert(&handle);
        assert_eq!(overlay.merged(&7).as_deref(), Some("draft"));
    }

    #[test]
    fn test_stats() {
        let mut overlay = create_overlay();

        let a = overlay.propose("count", |n| n + 1);
        let b = overlay.propose("count", |n| n + 1);
        overlay.reconcile(&a, 1);
        overlay.revert(&b);

        let stats = overlay.stats();
        assert_eq!(stats.proposed, 2);
        assert_eq!(stats.reconciled, 1);
        assert_eq!(stats.reverted, 1);
    }
}
