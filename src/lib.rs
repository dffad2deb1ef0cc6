//! # Speculative View
//!
//! Reconciles **what the user sees now** with **what is eventually
//! authoritative**.
//!
//! A responsive UI has to show a result before the true result exists: a
//! like counter bumps before the server confirms it, a search box shows the
//! typed text before the expensive filter has run. This crate sequences
//! those values so that:
//!
//! - **Stale results never win**: every asynchronous completion carries an
//!   [`Epoch`] and is discarded unless it is still current
//! - **Writes appear instantly**: speculative mutations are folded over the
//!   authoritative base and roll back cleanly on failure
//! - **Expensive reads lag gracefully**: bursts of live input are coalesced
//!   into one trailing derivation, with a catching-up flag in between
//!
//! ## Feature Flags
//!
//! - `runtime` (default): tokio consumer task, debounce timers and
//!   snapshot subscriptions
//! - `serde`: `Serialize`/`Deserialize` for channel configuration
//!
//! ## Modules
//!
//! - [`core`]: Epoch token, collaborator traits, constants and errors
//! - [`epoch`]: Per-channel epoch tracker
//! - [`overlay`]: Optimistic mutation overlay
//! - [`deferred`]: Deferred computation scheduler
//! - [`config`]: Channel configuration
//! - [`view`]: Façade combining overlay and scheduler per channel
//! - `runtime`: Async driver (requires `runtime` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use speculative_view::prelude::*;
//!
//! let mut overlay: MutationOverlay<&str, u32> = MutationOverlay::new();
//! overlay.set_base("likes", 10);
//!
//! // The like shows up before the server has answered.
//! let like = overlay.propose("likes", |n| n + 1);
//! assert_eq!(overlay.merged(&"likes"), Some(11));
//!
//! // The server rejected it.
//! overlay.revert(&like);
//! assert_eq!(overlay.merged(&"likes"), Some(10));
//!
//! // Typing "abc" quickly runs the expensive filter once.
//! let mut search: DeferredScheduler<&str, String, usize> = DeferredScheduler::new();
//! let start = Instant::now();
//! for (i, text) in ["a", "ab", "abc"].into_iter().enumerate() {
//!     let now = start + Duration::from_millis(i as u64 * 20);
//!     search.set_live_at("search", text.to_string(), now);
//!     search.settle_at("search", |q: &String| q.len(), Duration::from_millis(150), now);
//! }
//! assert!(search.is_catching_up(&"search"));
//!
//! let ran = search.run_due_at(start + Duration::from_millis(200));
//! assert_eq!(ran, 1);
//! assert_eq!(search.settled(&"search"), Some(&3));
//! assert!(!search.is_catching_up(&"search"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod config;
pub mod deferred;
pub mod epoch;
pub mod overlay;
pub mod view;

// Async driver (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    pub use crate::config::{ChannelConfig, ChannelSemantics, EngineConfig, EngineConfigBuilder};
    pub use crate::deferred::{Completion, DeferredScheduler, PublishOutcome, ReadyComputation};
    pub use crate::epoch::{EpochTracker, Freshness};
    pub use crate::overlay::{MutationHandle, MutationOverlay, Resolution};
    pub use crate::view::{EngineError, SpeculativeView, ViewSnapshot};

    #[cfg(feature = "runtime")]
    pub use crate::runtime::{EngineHandle, OptimisticError, RuntimeError, spawn};
}

// Re-export commonly used items at crate root
pub use crate::core::{Derivation, Epoch, Mutation, Stamped, StaleEpoch};
pub use crate::epoch::EpochTracker;
pub use crate::overlay::MutationOverlay;
pub use crate::deferred::DeferredScheduler;
pub use crate::view::SpeculativeView;
