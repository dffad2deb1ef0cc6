//! Speculative View - Mutation Overlay
//!
//! Implements:
//! - Speculative mutations shown before the write they represent completes
//! - A merged view folded from the authoritative base and the pending queue
//! - Out-of-order reconciliation against authoritative results
//! - Idempotent reversion on failure
//! - Epoch-fenced authoritative refreshes
//!
//! The merged view is never stored. It is always
//! `queue.fold(base, |acc, m| m.apply(acc))`, so whichever order
//! confirmations arrive in, the remaining mutations are replayed in the
//! order they were proposed.

mod mutation;
#[allow(clippy::module_inception)]
mod overlay;
mod queue;

pub use mutation::*;
pub use overlay::*;
pub use queue::*;
