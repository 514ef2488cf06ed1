//! Opt-in `tracing` subscriber for binaries and tests.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static LOGGING_INIT_ONCE: Once = Once::new();

/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// Safe to call repeatedly; does nothing if a global subscriber is already set.
pub fn init_logging() {
    LOGGING_INIT_ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    });
}
