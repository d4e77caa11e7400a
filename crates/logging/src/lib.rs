//! RelayCraft Logging
//!
//! Installs the process-wide `tracing` subscriber. `RUST_LOG` always wins
//! over the built-in defaults.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,relaycraft=debug"
    } else {
        "info"
    }
}

/// Build the filter used by [`init_logging`]
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter(verbose))
        .try_init();
}
