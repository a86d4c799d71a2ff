//! Error and warning types for calibration runs.

use crate::config::ConfigError;
use crate::report::RunMode;
use crate::stage::CalibrationStage;
use mixcal_core::types::{MeasurementError, SolverError, TraceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Calibration error type.
///
/// Every variant is fatal for the current run. Nothing is retried: a failed
/// read after an actuator write leaves the hardware state ambiguous.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    /// A run was requested before the instruments were connected.
    #[error("Instruments not connected: call connect() before {operation}")]
    NotConnected {
        /// Operation that was refused
        operation: &'static str,
    },

    /// The actuator or spectrum source failed.
    #[error("Measurement error: {0}")]
    Measurement(#[from] MeasurementError),

    /// A captured trace could not be analysed.
    #[error("Invalid trace: {0}")]
    InvalidTrace(#[from] TraceError),

    /// Configuration rejected at the configure transition.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Solver rejected its input or options.
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// The cancellation flag was raised.
    #[error("Calibration cancelled during {stage}")]
    Cancelled {
        /// Stage that observed the flag
        stage: CalibrationStage,
    },

    /// The session already ran in the other mode.
    #[error("Run mode conflict: session already ran in {active} mode, refusing {requested}")]
    RunModeConflict {
        /// Mode the session is bound to
        active: RunMode,
        /// Mode that was requested
        requested: RunMode,
    },
}

impl CalibrationError {
    /// Create a not-connected error.
    pub fn not_connected(operation: &'static str) -> Self {
        Self::NotConnected { operation }
    }

    /// Whether the session was not connected.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }

    /// Whether the error came from the instruments.
    pub fn is_measurement(&self) -> bool {
        matches!(self, Self::Measurement(_))
    }
}

/// A stage hit its iteration limit without meeting both tolerances.
///
/// Non-fatal: the best vertex is still used and the warning is kept in the
/// report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    /// Stage that did not converge
    pub stage: CalibrationStage,
    /// Repetition index (1-based), if the stage repeats
    pub repetition: Option<usize>,
    /// Iterations performed
    pub iterations: usize,
    /// Best cost reached
    pub cost: f64,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repetition {
            Some(rep) => write!(
                f,
                "{} (repetition {}) did not converge in {} iterations; best cost {:.6}",
                self.stage, rep, self.iterations, self.cost
            ),
            None => write!(
                f,
                "{} did not converge in {} iterations; best cost {:.6}",
                self.stage, self.iterations, self.cost
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CalibrationError::not_connected("calibrate");
        assert!(err.to_string().contains("calibrate"));

        let err: CalibrationError = MeasurementError::communication("timeout").into();
        assert!(err.is_measurement());
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_conflict_display() {
        let err = CalibrationError::RunModeConflict {
            active: RunMode::TwoStage,
            requested: RunMode::GlobalSpur,
        };
        let msg = err.to_string();
        assert!(msg.contains("two_stage"));
        assert!(msg.contains("global_spur"));
    }

    #[test]
    fn test_warning_display() {
        let warning = ConvergenceWarning {
            stage: CalibrationStage::OptimizeImage,
            repetition: Some(2),
            iterations: 50,
            cost: -71.5,
        };
        let msg = warning.to_string();
        assert!(msg.contains("optimize_image"));
        assert!(msg.contains("repetition 2"));
        assert!(msg.contains("50 iterations"));
    }
}
