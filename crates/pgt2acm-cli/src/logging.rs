//! Log setup
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for the
//! conversion summary (or its JSON form).

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `--debug`.
pub fn init(debug: bool) {
    let default = if debug { "debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .try_init();
}
