//! Speculative View - Epoch Tracker
//!
//! Implements:
//! - Per-channel monotonic epoch allocation
//! - Freshness checks for asynchronous completions
//! - `?`-friendly fencing of stale results
//!
//! Every asynchronous result must travel with the epoch it was produced
//! under and pass [`EpochTracker::is_current`] before it may touch visible
//! state. The overlay and the scheduler are both built on this check.

mod tracker;

pub use tracker::*;
