//! Speculative View - Async Runtime
//!
//! Drives a [`SpeculativeView`](crate::view::SpeculativeView) from tokio:
//!
//! - **Consumer task**: [`EngineTask`] owns the engine and applies commands
//!   one at a time, so every completion is serialised before it touches
//!   engine state
//! - **Handles**: [`EngineHandle`] is a cheap, cloneable front end for
//!   proposing writes, updating live values and reading snapshots
//! - **Timers**: debounce deadlines are awaited inside the consumer loop
//! - **Derivations**: due computations run on the blocking pool and are
//!   posted back to the consumer for the epoch check
//! - **Subscriptions**: per-channel `watch` receivers of [`ViewSnapshot`]s
//!
//! ```text
//! ┌──────────────┐  commands   ┌──────────────────────────────┐
//! │ EngineHandle │ ──────────► │ EngineTask (single consumer) │
//! └──────────────┘             │   SpeculativeView            │
//!        ▲                     └──────┬───────────────▲───────┘
//!        │ watch::Receiver            │ spawn_blocking │ Completed
//!        └── ViewSnapshot ◄───────────┘                │
//!                                 derivation ──────────┘
//! ```
//!
//! [`ViewSnapshot`]: crate::view::ViewSnapshot

mod command;
mod error;
mod handle;
mod task;

pub use error::*;
pub use handle::*;
pub use task::*;
