//! Error types for the mixcal CLI.

use mixcal_optimiser::prelude::{CalibrationError, ConfigError};
use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Calibration run failed
    #[error("Calibration failed: {0}")]
    Calibration(#[from] CalibrationError),

    /// Input file missing
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Invalid command-line argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Report could not be written
    #[error("Output error: {0}")]
    Output(String),
}

impl CliError {
    /// Create an invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an output error
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }
}

/// CLI result type
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CliError::invalid_argument("noise sigma must be non-negative");
        assert!(err.to_string().contains("noise sigma"));

        let err: CliError = CalibrationError::not_connected("calibrate").into();
        assert!(err.to_string().starts_with("Calibration failed"));
    }
}
