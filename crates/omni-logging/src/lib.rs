//! # omni-logging
//!
//! Structured logging with `tracing`.
//!
//! Everything in the relay logs through `tracing` macros with structured
//! fields. [`init_subscriber`] installs the process-wide subscriber once at
//! startup: stderr output, compact or JSON lines, filtered by `RUST_LOG` when
//! set and by the configured [`LogLevel`] otherwise.

#![deny(unsafe_code)]

pub mod types;

pub use types::{LogFormat, LogLevel};

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - Minimum level when `RUST_LOG` is not set.
/// * `format` - Human-readable compact lines or one JSON object per line.
pub fn init_subscriber(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init is a no-op if a global default is already set
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
}
