//! Core data types for actuator settings, spectra and errors.
//!
//! This module provides:
//! - `actuator`: DC offset and gain/phase imbalance settings ([`ActuatorState`])
//! - `spectrum`: Measured traces, extracted peaks and the measurement method selector
//! - `error`: Structured error types for traces, instrument I/O and the solver
//!
//! # Re-exports
//!
//! For convenience, commonly used types are re-exported at this module level:
//! - [`ActuatorState`], [`LoOffsets`], [`GainPhase`] from `actuator`
//! - [`Trace`], [`Peak`], [`PeakSet`], [`Measurement`], [`MeasurementMethod`] from `spectrum`
//! - [`TraceError`], [`MeasurementError`], [`SolverError`] from `error`

pub mod actuator;
pub mod error;
pub mod spectrum;

// Re-export commonly used types at module level
pub use actuator::{ActuatorState, GainPhase, LoOffsets};
pub use error::{MeasurementError, SolverError, TraceError};
pub use spectrum::{Measurement, MeasurementMethod, Peak, PeakSet, Trace};
