//! Log output setup
//!
//! Filtering comes from `RUST_LOG` (default: `info`). JSON output is meant
//! for log shippers; the plain formatter is for terminals.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Returns `false` if one was already installed.
pub fn init_logging(json: bool) -> bool {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    let result = if json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.with_target(false).try_init()
    };
    result.is_ok()
}
