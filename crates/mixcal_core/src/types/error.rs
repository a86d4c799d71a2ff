//! Error types for structured error handling.
//!
//! This module provides:
//! - `TraceError`: Degenerate or inconsistent spectrum traces
//! - `MeasurementError`: Failures reported by an instrument facade
//! - `SolverError`: Errors from the simplex minimiser

use thiserror::Error;

/// Trace validation errors.
///
/// Raised by the peak extractor when a trace cannot be analysed. The
/// extractor never guesses around a degenerate trace.
///
/// # Examples
/// ```
/// use mixcal_core::types::TraceError;
///
/// let err = TraceError::TooShort { got: 1, need: 2 };
/// assert_eq!(format!("{}", err), "Trace too short: got 1 samples, need at least 2");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TraceError {
    /// Not enough samples to look for local maxima.
    #[error("Trace too short: got {got} samples, need at least {need}")]
    TooShort {
        /// Number of samples provided
        got: usize,
        /// Minimum number of samples required
        need: usize,
    },

    /// Frequency and amplitude vectors differ in length.
    #[error("Trace length mismatch: {frequencies} frequencies, {amplitudes} amplitudes")]
    LengthMismatch {
        /// Number of frequency points
        frequencies: usize,
        /// Number of amplitude points
        amplitudes: usize,
    },

    /// Average sample spacing is not a positive finite number.
    #[error("Invalid sample spacing: {spacing} Hz per sample")]
    InvalidSpacing {
        /// Computed average spacing
        spacing: f64,
    },

    /// Requested peak separation is negative or not finite.
    #[error("Invalid minimum peak separation: {0} Hz")]
    InvalidSeparation(f64),
}

/// Instrument facade errors.
///
/// Any failure while writing to the actuator or reading the spectrum
/// source. The optimiser treats every one of these as fatal for the
/// current run; it never retries.
///
/// # Examples
/// ```
/// use mixcal_core::types::MeasurementError;
///
/// let err = MeasurementError::communication("socket reset");
/// assert!(format!("{}", err).contains("socket reset"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeasurementError {
    /// Transport-level failure (timeout, dropped connection, I/O error).
    #[error("Instrument communication failed: {0}")]
    Communication(String),

    /// The instrument answered, but with unusable data.
    #[error("Malformed measurement data: {0}")]
    MalformedData(String),

    /// The handle was used after it had been closed.
    #[error("Instrument handle closed: {0}")]
    Closed(String),
}

impl MeasurementError {
    /// Create a communication error.
    pub fn communication(msg: impl Into<String>) -> Self {
        Self::Communication(msg.into())
    }

    /// Create a malformed-data error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedData(msg.into())
    }

    /// Create a closed-handle error.
    pub fn closed(msg: impl Into<String>) -> Self {
        Self::Closed(msg.into())
    }
}

/// Simplex solver errors.
///
/// Hitting the iteration limit is not an error: the solver returns its best
/// vertex flagged as non-converged instead.
///
/// # Examples
/// ```
/// use mixcal_core::types::SolverError;
///
/// let err = SolverError::DimensionMismatch { expected: 2, got: 4 };
/// assert!(format!("{}", err).contains("expected 2"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverError {
    /// The starting vector is empty.
    #[error("Empty parameter vector")]
    EmptyParameters,

    /// A parameter vector does not match the objective's dimension.
    #[error("Parameter dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension the objective accepts
        expected: usize,
        /// Dimension that was supplied
        got: usize,
    },

    /// Solver options are out of range.
    #[error("Invalid solver configuration: {0}")]
    InvalidConfig(String),

    /// The cancellation flag was raised between iterations.
    #[error("Minimisation interrupted after {iterations} iterations")]
    Interrupted {
        /// Iterations completed before the interruption
        iterations: usize,
    },
}
