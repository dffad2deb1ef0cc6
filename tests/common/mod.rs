#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use std::sync::Once;
use std::time::{Duration, Instant};

use proptest::prelude::ProptestConfig;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Default number of cases for property tests.
pub const DEFAULT_CASES: u32 = 256;

/// Initialize test logging.
///
/// Honors `RUST_LOG`, defaulting to `trace` for this crate. The first call
/// wins; later calls are no-ops.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("speculative_view=trace"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Proptest configuration used by the property suites.
pub fn test_proptest_config() -> ProptestConfig {
    ProptestConfig::with_cases(DEFAULT_CASES)
}

/// Offset from a fixed start instant.
pub fn at(start: Instant, millis: u64) -> Instant {
    start + Duration::from_millis(millis)
}
