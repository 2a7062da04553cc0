//! # Node Configuration
//!
//! Runtime parameters of one node. Every field has a sane default and an
//! environment override.
//!
//! | Variable | Default | Field |
//! |----------|---------|-------|
//! | `SC_STORE_PREFIX` | `sc-node` | `store_key_prefix` |
//! | `SC_DEDUP_WINDOW_SECS` | `120` | `dedup_window_secs` |
//! | `SC_REQUEST_TIMEOUT_MS` | unset | `request_timeout` |

use channel_telemetry::TelemetryConfig;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Prefix of every key the node writes to its store collaborator.
    pub store_key_prefix: String,
    /// How long a processed inbound message id is remembered.
    pub dedup_window_secs: u64,
    /// Upper bound on a method call. `None` waits for the protocol to finish.
    pub request_timeout: Option<Duration>,
    /// Logging and metrics.
    pub telemetry: TelemetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            store_key_prefix: "sc-node".to_string(),
            dedup_window_secs: 120,
            request_timeout: None,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Defaults overridden from the environment. Unparsable values are
    /// reported rather than ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let telemetry =
            TelemetryConfig::from_env().map_err(|e| ConfigError::Telemetry(e.to_string()))?;
        let mut config = Self {
            telemetry,
            ..Self::default()
        };

        if let Ok(prefix) = env::var("SC_STORE_PREFIX") {
            config.store_key_prefix = prefix;
        }
        if let Ok(secs) = env::var("SC_DEDUP_WINDOW_SECS") {
            config.dedup_window_secs = secs.parse().map_err(|_| ConfigError::InvalidValue {
                var: "SC_DEDUP_WINDOW_SECS",
                value: secs.clone(),
            })?;
        }
        if let Ok(ms) = env::var("SC_REQUEST_TIMEOUT_MS") {
            let ms: u64 = ms.parse().map_err(|_| ConfigError::InvalidValue {
                var: "SC_REQUEST_TIMEOUT_MS",
                value: ms.clone(),
            })?;
            config.request_timeout = Some(Duration::from_millis(ms));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_key_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyStorePrefix);
        }
        if self.dedup_window_secs == 0 {
            return Err(ConfigError::ZeroDedupWindow);
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        Ok(())
    }

    /// Store key holding the node's signing seed.
    pub fn mnemonic_key(&self) -> String {
        format!("{}/MNEMONIC", self.store_key_prefix)
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Store key prefix must not be empty")]
    EmptyStorePrefix,

    #[error("Dedup window must be at least one second")]
    ZeroDedupWindow,

    /// A zero timeout would fail every call.
    #[error("Request timeout must be positive when set")]
    ZeroRequestTimeout,

    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Invalid telemetry settings: {0}")]
    Telemetry(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.mnemonic_key(), "sc-node/MNEMONIC");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = NodeConfig {
            store_key_prefix: " ".to_string(),
            ..NodeConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyStorePrefix));

        let config = NodeConfig {
            dedup_window_secs: 0,
            ..NodeConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDedupWindow));

        let config = NodeConfig {
            request_timeout: Some(Duration::ZERO),
            ..NodeConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRequestTimeout));
    }
}
