//! Epoch tokens and epoch-stamped values.

use std::fmt;

use super::constants::INITIAL_EPOCH;

/// A per-channel, strictly increasing token stamped on a triggering input.
///
/// Epochs from different channels are unrelated and must never be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    /// The epoch of a channel that has seen no input yet.
    pub const ZERO: Epoch = Epoch(INITIAL_EPOCH);

    /// Wrap a raw epoch value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw epoch value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The epoch that follows this one.
    ///
    /// `u64::MAX` is a hard limit of the epoch space: a channel would need
    /// 2^64 inputs to reach it. Debug builds panic there; release builds
    /// saturate, after which the channel's epochs stop increasing.
    pub const fn next(self) -> Self {
        debug_assert!(self.0 < u64::MAX, "epoch space exhausted");
        Self(self.0.saturating_add(1))
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<u64> for Epoch {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A value together with the epoch it was produced under.
///
/// Every asynchronous completion handed back to the engine travels as a
/// `Stamped` so the engine can fence it against the channel's current epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped<T> {
    /// Epoch the value belongs to.
    pub epoch: Epoch,
    /// The value itself.
    pub value: T,
}

impl<T> Stamped<T> {
    /// Stamp a value with an epoch.
    pub fn new(epoch: Epoch, value: T) -> Self {
        Self { epoch, value }
    }

    /// Borrow the value, keeping the stamp.
    pub fn as_ref(&self) -> Stamped<&T> {
        Stamped {
            epoch: self.epoch,
            value: &self.value,
        }
    }

    /// Transform the value, keeping the stamp.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Stamped<U> {
        Stamped {
            epoch: self.epoch,
            value: f(self.value),
        }
    }

    /// Drop the stamp.
    pub fn into_value(self) -> T {
        self.value
    }
}
