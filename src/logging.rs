//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Default filter when RUST_LOG is unset
pub const DEFAULT_FILTER: &str = "intake=info";

/// Install the global fmt subscriber, writing to stderr
///
/// `verbose` raises the default to debug. Safe to call more than once.
pub fn init(verbose: bool) {
    let default = if verbose { "intake=debug" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
