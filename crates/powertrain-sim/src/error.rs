//! Error types for the simulation driver.

use std::path::PathBuf;

use powertrain_core::PowertrainError;
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Unsupported config file extension: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),

    #[error(transparent)]
    Powertrain(#[from] PowertrainError),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by [`crate::Simulation`] and its handle.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Powertrain error: {0}")]
    Powertrain(#[from] PowertrainError),

    #[error("Control channel closed")]
    ControlClosed,

    #[error("Simulation task failed: {0}")]
    TaskFailed(String),
}

/// Errors returned by a [`crate::TelemetrySink`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Telemetry sink closed")]
    Closed,

    #[error("Telemetry write failed: {0}")]
    Write(String),
}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tire_error_converts_to_config_error() {
        let err: ConfigError = PowertrainError::InvalidTireSpec {
            spec: "bad".to_string(),
        }
        .into();
        assert!(matches!(err, ConfigError::Powertrain(_)));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_config_error_nests_in_sim_error() {
        let err: SimError = ConfigError::invalid("dt", "must be positive").into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration value for dt: must be positive"
        );
    }
}
