//! Speculative View - Configuration
//!
//! Per-channel configuration surface:
//! - [`ChannelSemantics`]: whether a channel takes writes, reads, or both
//! - [`ChannelConfig`]: semantics plus the coalesce window
//! - [`EngineConfig`]: a default channel config with per-channel overrides
//!
//! With the `serde` feature, [`ChannelSemantics`] and [`ChannelConfig`] can be
//! loaded from any serde format.

mod channel;
mod engine;

pub use channel::*;
pub use engine::*;
