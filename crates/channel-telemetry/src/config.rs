//! Telemetry configuration from environment variables.

use crate::TelemetryError;
use std::env;
use std::str::FromStr;

/// How log lines are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
    /// Nothing is written; the filter still applies to other layers.
    Off,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
            Self::Off => "off",
        }
    }
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "off" | "none" => Ok(Self::Off),
            other => Err(TelemetryError::Config(format!("unknown log format {other:?}"))),
        }
    }
}

/// Logging settings of one node process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Attached to the startup line so interleaved node logs can be told apart.
    pub service_name: String,
    /// Level (`info`) or a full `EnvFilter` directive (`sc_04_virtual_router=debug`).
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "state-channel-node".to_string(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl TelemetryConfig {
    /// Defaults overridden by `SC_SERVICE_NAME`, `SC_LOG_LEVEL` (then
    /// `RUST_LOG`) and `SC_LOG_FORMAT`. Inside a container the format
    /// defaults to JSON.
    pub fn from_env() -> Result<Self, TelemetryError> {
        let in_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let defaults = Self::default();

        let log_format = match env::var("SC_LOG_FORMAT") {
            Ok(value) => value.parse()?,
            Err(_) if in_container => LogFormat::Json,
            Err(_) => defaults.log_format,
        };

        Ok(Self {
            service_name: env::var("SC_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_filter: env::var("SC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_filter),
            log_format,
        })
    }
}
