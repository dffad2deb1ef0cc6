//! Live/settled value pair

use crate::core::{Epoch, Stamped};

/// A value with an urgent reading and a lagging, derived reading
///
/// `live` is written synchronously on every input. `settled` only moves
/// when a derivation result is published, and never moves back to an
/// older epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredPair<T, U = T> {
    live: Stamped<T>,
    settled: Option<Stamped<U>>,
}

impl<T, U> DeferredPair<T, U> {
    /// Create a pair with a live value and nothing settled yet
    pub fn new(live: Stamped<T>) -> Self {
        Self {
            live,
            settled: None,
        }
    }

    /// Live reading
    pub fn live(&self) -> &Stamped<T> {
        &self.live
    }

    /// Settled reading, if any result has been published
    pub fn settled(&self) -> Option<&Stamped<U>> {
        self.settled.as_ref()
    }

    /// Epoch of the settled reading ([`Epoch::ZERO`] if none)
    pub fn settled_epoch(&self) -> Epoch {
        self.settled.as_ref().map_or(Epoch::ZERO, |s| s.epoch)
    }

    /// Whether the settled reading lags the live one
    pub fn is_catching_up(&self) -> bool {
        self.settled
            .as_ref()
            .is_none_or(|settled| settled.epoch < self.live.epoch)
    }

    /// Replace the live reading
    ///
    /// Live readings only move forward; an older stamp is ignored.
    pub fn set_live(&mut self, live: Stamped<T>) -> bool {
        if live.epoch < self.live.epoch {
            return false;
        }
        self.live = live;
        true
    }

    /// Publish a settled reading
    ///
    /// Rejected if it is older than the current settled reading or newer
    /// than the live reading it must have been derived from.
    pub fn publish(&mut self, settled: Stamped<U>) -> bool {
        if settled.epoch < self.settled_epoch() || settled.epoch > self.live.epoch {
            return false;
        }
        self.settled = Some(settled);
        true
    }

    /// Split into the two readings
    pub fn into_parts(self) -> (Stamped<T>, Option<Stamped<U>>) {
        (self.live, self.settled)
    }
}
