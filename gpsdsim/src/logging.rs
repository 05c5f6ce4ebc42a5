//! Logging infrastructure bootstrap.
//!
//! Installs the global `tracing` subscriber with console output.
//! Configurable via the `RUST_LOG` environment variable; the `--debug`
//! flag lowers the default filter.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence when set; otherwise `debug` selects between
/// the `info` and `debug` default filters.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(debug: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_filter = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()
}
