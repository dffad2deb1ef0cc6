//! Epoch tracker
//!
//! Tracks the greatest epoch issued per channel. Only that epoch is current;
//! everything below it is permanently stale.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::trace;

use crate::core::{Epoch, StaleEpoch};

/// Result of checking an epoch against a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The epoch is the channel's current epoch
    Current,
    /// A newer epoch has been issued since
    Stale {
        /// The epoch that was checked
        received: Epoch,
        /// The channel's current epoch
        current: Epoch,
    },
}

impl Freshness {
    /// Whether the checked epoch was current
    pub fn is_current(&self) -> bool {
        matches!(self, Freshness::Current)
    }
}

/// Per-channel epoch allocator
///
/// Channels are independent; there is no global epoch. A channel that has
/// never been seen is at [`Epoch::ZERO`].
#[derive(Debug, Clone)]
pub struct EpochTracker<K> {
    /// Greatest epoch issued per channel
    current: HashMap<K, Epoch>,
}

impl<K> Default for EpochTracker<K> {
    fn default() -> Self {
        Self {
            current: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> EpochTracker<K> {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next epoch for a channel
    ///
    /// See [`Epoch::next`] for the limit of the epoch space.
    pub fn begin_epoch(&mut self, channel: &K) -> Epoch {
        let slot = self.current.entry(channel.clone()).or_default();
        let epoch = slot.next();
        *slot = epoch;
        trace!(%epoch, "epoch allocated");
        epoch
    }

    /// Current epoch of a channel
    pub fn current_epoch(&self, channel: &K) -> Epoch {
        self.current.get(channel).copied().unwrap_or(Epoch::ZERO)
    }

    /// Check whether `epoch` is the channel's current epoch
    pub fn is_current(&self, channel: &K, epoch: Epoch) -> bool {
        self.current_epoch(channel) == epoch
    }

    /// Classify an epoch against the channel
    pub fn check(&self, channel: &K, epoch: Epoch) -> Freshness {
        let current = self.current_epoch(channel);
        if epoch == current {
            Freshness::Current
        } else {
            Freshness::Stale {
                received: epoch,
                current,
            }
        }
    }

    /// Fence a completion: `Ok` only if `epoch` is still current
    ///
    /// ```
    /// use speculative_view::epoch::EpochTracker;
    ///
    /// let mut epochs = EpochTracker::new();
    /// let first = epochs.begin_epoch(&"search");
    /// let _second = epochs.begin_epoch(&"search");
    ///
    /// assert!(epochs.fence(&"search", first).is_err());
    /// ```
    pub fn fence(&self, channel: &K, epoch: Epoch) -> Result<(), StaleEpoch> {
        match self.check(channel, epoch) {
            Freshness::Current => Ok(()),
            Freshness::Stale { received, current } => Err(StaleEpoch { received, current }),
        }
    }

    /// Number of channels that have allocated at least one epoch
    pub fn channel_count(&self) -> usize {
        self.current.len()
    }
}
