//! Error types shared across the engine layers.

use std::time::Duration;

use thiserror::Error;

use super::types::Epoch;

/// A completion or handle was stamped with an epoch that is no longer current.
///
/// Staleness is not a failure of the operation; callers that use
/// [`EpochTracker::fence`](crate::epoch::EpochTracker::fence) typically
/// drop the result and return early.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("stale epoch: received {received}, current {current}")]
pub struct StaleEpoch {
    /// Epoch the result was produced under.
    pub received: Epoch,
    /// Channel's current epoch.
    pub current: Epoch,
}

/// Errors in engine configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Coalesce window exceeds the accepted maximum.
    #[error("coalesce window {window:?} exceeds maximum {max:?}")]
    WindowTooLarge {
        /// Configured window.
        window: Duration,
        /// Maximum accepted window.
        max: Duration,
    },
}
