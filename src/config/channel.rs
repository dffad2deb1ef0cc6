//! Channel configuration

use std::fmt;
use std::time::Duration;

use crate::core::{ConfigError, DEFAULT_COALESCE_WINDOW, MAX_COALESCE_WINDOW, TYPING_COALESCE_WINDOW};

/// Which engine components a channel uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChannelSemantics {
    /// Speculative writes only (mutation overlay)
    Overlay,
    /// Deferred reads only (live/settled pair)
    Deferred,
    /// Both writes and deferred reads
    #[default]
    Both,
}

impl ChannelSemantics {
    /// Whether the channel accepts speculative mutations
    pub fn supports_overlay(self) -> bool {
        matches!(self, ChannelSemantics::Overlay | ChannelSemantics::Both)
    }

    /// Whether the channel accepts live updates
    pub fn supports_deferred(self) -> bool {
        matches!(self, ChannelSemantics::Deferred | ChannelSemantics::Both)
    }
}

impl fmt::Display for ChannelSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSemantics::Overlay => f.write_str("overlay"),
            ChannelSemantics::Deferred => f.write_str("deferred"),
            ChannelSemantics::Both => f.write_str("both"),
        }
    }
}

/// Whole milliseconds in `window`, rounded up and saturating at `u64::MAX`
fn window_millis(window: Duration) -> u64 {
    let mut millis = window.as_millis();
    if window.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Configuration for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelConfig {
    /// Quiet period before a deferred computation is dispatched, in milliseconds
    pub coalesce_window_ms: u64,
    /// Components the channel uses
    pub semantics: ChannelSemantics,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: window_millis(DEFAULT_COALESCE_WINDOW),
            semantics: ChannelSemantics::Both,
        }
    }
}

impl ChannelConfig {
    /// Create config that dispatches derivations as soon as they are polled
    pub fn immediate() -> Self {
        Self {
            coalesce_window_ms: 0,
            ..Self::default()
        }
    }

    /// Create config tuned for keystroke-driven input (debounced search)
    pub fn typing() -> Self {
        Self {
            coalesce_window_ms: window_millis(TYPING_COALESCE_WINDOW),
            semantics: ChannelSemantics::Deferred,
        }
    }

    /// Set the coalesce window
    ///
    /// Sub-millisecond windows round up to the next millisecond; windows too
    /// large for `u64` milliseconds saturate (and then fail validation).
    pub fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window_ms = window_millis(window);
        self
    }

    /// Set the channel semantics
    pub fn with_semantics(mut self, semantics: ChannelSemantics) -> Self {
        self.semantics = semantics;
        self
    }

    /// Coalesce window as Duration
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    /// Check the config against engine limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = self.coalesce_window();
        if window > MAX_COALESCE_WINDOW {
            return Err(ConfigError::WindowTooLarge {
                window,
                max: MAX_COALESCE_WINDOW,
            });
        }
        Ok(())
    }
}
