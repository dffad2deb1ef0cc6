//! Per-channel mutation queue
//!
//! Holds the last authoritative base handed to the channel and the pending
//! mutations in proposal order.

use crate::core::Epoch;

use super::mutation::{MutationId, MutationInfo, SpeculativeMutation};

/// Authoritative base plus ordered speculative mutations for one channel
#[derive(Debug, Clone)]
pub struct MutationQueue<T> {
    /// Last authoritative value, if the caller has supplied one
    base: Option<T>,
    /// Pending mutations, ordered by proposal
    pending: Vec<SpeculativeMutation<T>>,
}

impl<T> Default for MutationQueue<T> {
    fn default() -> Self {
        Self {
            base: None,
            pending: Vec::new(),
        }
    }
}

impl<T> MutationQueue<T> {
    /// Create an empty queue with no base
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached authoritative base
    pub fn base(&self) -> Option<&T> {
        self.base.as_ref()
    }

    /// Replace the cached authoritative base
    pub fn set_base(&mut self, base: T) {
        self.base = Some(base);
    }

    /// Append a mutation; proposal order is queue order
    pub fn push(&mut self, mutation: SpeculativeMutation<T>) {
        debug_assert!(
            self.pending.last().is_none_or(|last| last.id() < mutation.id()),
            "mutations must be pushed in proposal order"
        );
        self.pending.push(mutation);
    }

    /// Remove a mutation by id, returning it if it was pending
    pub fn remove(&mut self, id: MutationId) -> Option<SpeculativeMutation<T>> {
        // Ids are issued in increasing order, so the queue is sorted by id.
        let index = self.pending.binary_search_by_key(&id, |m| m.id()).ok()?;
        Some(self.pending.remove(index))
    }

    /// Remove every mutation stamped with an epoch older than `epoch`
    ///
    /// Returns the number of mutations removed.
    pub fn remove_older_than(&mut self, epoch: Epoch) -> usize {
        let before = self.pending.len();
        self.pending.retain(|m| m.epoch() >= epoch);
        before - self.pending.len()
    }

    /// Whether a mutation is still pending
    pub fn contains(&self, id: MutationId) -> bool {
        self.pending.binary_search_by_key(&id, |m| m.id()).is_ok()
    }

    /// Fold the pending mutations over `base`, in proposal order
    pub fn fold(&self, base: T) -> T {
        self.pending.iter().fold(base, |acc, m| m.apply(acc))
    }

    /// Number of pending mutations
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no mutations are pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending mutations in proposal order
    pub fn iter(&self) -> impl Iterator<Item = &SpeculativeMutation<T>> {
        self.pending.iter()
    }

    /// Presentation summaries of pending mutations, in proposal order
    pub fn infos(&self) -> impl Iterator<Item = MutationInfo<'_>> {
        self.pending.iter().map(SpeculativeMutation::info)
    }
}

impl<T: Clone> MutationQueue<T> {
    /// Fold the pending mutations over the cached base
    pub fn merged(&self) -> Option<T> {
        self.base.clone().map(|base| self.fold(base))
    }
}
