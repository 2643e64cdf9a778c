//! Logging setup on top of tracing-subscriber

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the global subscriber
///
/// `RUST_LOG` overrides the level; otherwise `info`, or `debug` when
/// `verbose` is set.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Subscriber for tests; safe to call more than once
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
