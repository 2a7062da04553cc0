//! # Channel Telemetry
//!
//! Logging and metrics for the state channel node.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use channel_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env()?;
//! init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SC_SERVICE_NAME` | `state-channel-node` | Service name in logs |
//! | `SC_LOG_LEVEL` | `info` | Log filter directive (falls back to `RUST_LOG`) |
//! | `SC_LOG_FORMAT` | `pretty` (`json` in containers) | `pretty`, `json` or `off` |

mod config;
mod logging;
mod metrics;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, APPS_INSTALLED, APPS_UNINSTALLED, CHANNELS_CREATED,
    CONSISTENCY_FAULTS, METHOD_CALLS, METHOD_LATENCY, PROTOCOL_MESSAGES, REGISTRY,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the global log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
