//! Speculative View - View Façade
//!
//! Combines the mutation overlay and the deferred scheduler behind one
//! per-channel configuration, and renders both into a single
//! [`ViewSnapshot`] for the presentation layer.

mod engine;
mod snapshot;

pub use engine::*;
pub use snapshot::*;
