//! Structured logging.
//!
//! Every component logs through `tracing` with a `[sc-NN]` prefix and
//! structured fields. This module installs the global subscriber: an
//! `EnvFilter` and at most one formatting layer.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|e| TelemetryError::Config(format!("log filter {:?}: {e}", config.log_filter)))?;

    let json = (config.log_format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_target(true)
    });
    let pretty = (config.log_format == LogFormat::Pretty)
        .then(|| fmt::layer().compact().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        format = config.log_format.as_str(),
        "[sc-telemetry] Logging initialised"
    );
    Ok(())
}
