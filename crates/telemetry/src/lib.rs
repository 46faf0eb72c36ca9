//! Logging bootstrap for the dnd-schema binaries.

use anyhow::anyhow;
use dnd_schema_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(rust_log.as_deref(), &settings.level)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match settings.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;

    tracing::debug!(
        target: "dnd-schema-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );

    Ok(())
}

/// A set but unparsable `RUST_LOG` is an error, not a silent fallback.
fn build_filter(rust_log: Option<&str>, level: &str) -> anyhow::Result<EnvFilter> {
    match rust_log.filter(|directives| !directives.trim().is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| anyhow!("invalid RUST_LOG '{}': {}", directives, e)),
        None => EnvFilter::try_new(level)
            .map_err(|e| anyhow!("invalid log level '{}': {}", level, e)),
    }
}
