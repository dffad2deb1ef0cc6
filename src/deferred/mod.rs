//! Speculative View - Deferred Computation Scheduler
//!
//! Implements:
//! - Live/settled value pairs with a derived catching-up flag
//! - Trailing debounce of bursts of live updates
//! - Dispatch of expensive derivations once a channel is quiescent
//! - Epoch-fenced publishing of derivation results
//!
//! The scheduler never runs anything on its own and never cancels work.
//! Callers (or the `runtime` driver) poll it for due computations, run them
//! wherever they like, and hand the results back through
//! [`DeferredScheduler::publish`], which drops anything computed for a
//! superseded input.

mod coalescer;
mod pair;
mod scheduler;

pub use coalescer::*;
pub use pair::*;
pub use scheduler::*;
