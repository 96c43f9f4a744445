//! Structured logging initialisation
//!
//! Two output formats are supported:
//! - [`LogFormat::Human`]: readable lines on stderr (development, CLI).
//! - [`LogFormat::Json`]: newline-delimited JSON (server deployments).
//!
//! `RUST_LOG` overrides the caller-supplied `level` when set
//! (e.g. `"info"`, `"warn,liveguard::core::session=debug"`).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Selects the output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Human,
    Json,
}

/// Build the filter from `RUST_LOG`, falling back to `level`
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialise the global tracing subscriber.
///
/// Logs go to stderr so event output on stdout stays machine-readable.
/// A second call is a no-op.
pub fn init_logging(format: LogFormat, level: &str) {
    let filter = env_filter(level);

    let result = match format {
        LogFormat::Human => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
