//! Engine constants and configuration defaults.
//!
//! None of these values carry correctness weight: staleness is decided by
//! epochs, never by timing. They only shape how eagerly work is dispatched.

use std::time::Duration;

// =============================================================================
// EPOCHS
// =============================================================================

/// Epoch every channel starts at before its first triggering input.
pub const INITIAL_EPOCH: u64 = 0;

// =============================================================================
// COALESCING
// =============================================================================

/// Default quiet period before a deferred computation is dispatched.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(150);

/// Coalesce window used by the `typing` preset (debounced search boxes).
pub const TYPING_COALESCE_WINDOW: Duration = Duration::from_millis(300);

/// Largest coalesce window accepted by configuration validation.
pub const MAX_COALESCE_WINDOW: Duration = Duration::from_secs(60);

// =============================================================================
// RUNTIME
// =============================================================================

/// Capacity of the command queue feeding the engine task.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;
