//! Input coalescing
//!
//! Tracks when a channel last received live input so a burst of updates can
//! be collapsed into one trailing computation.

use std::time::{Duration, Instant};

/// Quiescence tracker for one channel
#[derive(Debug, Clone, Default)]
pub struct Coalescer {
    /// Time of the most recent live input
    last_input: Option<Instant>,
    /// Inputs seen since the last dispatch
    burst_len: u32,
}

impl Coalescer {
    /// Create a coalescer that has seen no input
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a live input
    pub fn touch(&mut self) {
        self.touch_at(Instant::now());
    }

    /// Record a live input at a given time
    pub fn touch_at(&mut self, now: Instant) {
        self.last_input = Some(now);
        self.burst_len = self.burst_len.saturating_add(1);
    }

    /// Time of the most recent live input
    pub fn last_input(&self) -> Option<Instant> {
        self.last_input
    }

    /// Inputs recorded since the last [`reset_burst`](Self::reset_burst)
    pub fn burst_len(&self) -> u32 {
        self.burst_len
    }

    /// Start counting a new burst (call on dispatch)
    pub fn reset_burst(&mut self) {
        self.burst_len = 0;
    }

    /// Check if the channel has been quiet for `window`
    pub fn is_quiescent(&self, window: Duration) -> bool {
        self.is_quiescent_at(Instant::now(), window)
    }

    /// Check if the channel has been quiet for `window` at a given time
    pub fn is_quiescent_at(&self, now: Instant, window: Duration) -> bool {
        self.last_input
            .is_none_or(|last| now.saturating_duration_since(last) >= window)
    }

    /// Time left until the channel is quiescent at a given time
    pub fn time_until_quiescent_at(&self, now: Instant, window: Duration) -> Duration {
        self.last_input.map_or(Duration::ZERO, |last| {
            window.saturating_sub(now.saturating_duration_since(last))
        })
    }
}
