//! Speculative View - Core traits, types, and constants.
//!
//! This module provides the foundational pieces shared by every layer:
//! the epoch token, the collaborator traits for mutations and derivations,
//! and the error types. It has no optional dependencies.

mod constants;
mod error;
mod traits;
mod types;

pub use constants::*;
pub use error::*;
pub use traits::*;
pub use types::*;
