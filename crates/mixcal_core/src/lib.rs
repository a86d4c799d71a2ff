//! # mixcal_core: Foundation for IQ Mixer Calibration
//!
//! ## Layer 1 (Foundation) Role
//!
//! mixcal_core serves as the bottom layer of the calibration workspace, providing:
//! - Actuator and spectrum data types (`types`)
//! - Error types: `TraceError`, `MeasurementError`, `SolverError` (`types::error`)
//! - Derivative-free Nelder-Mead simplex solver (`math::solvers`)
//! - Spectral peak extraction and the summed-spur metric (`math::spectral`)
//! - Capability traits for the IQ actuator and the spectrum source (`traits`)
//!
//! ## Zero Dependency Principle
//!
//! Layer 1 has no dependencies on other mixcal_* crates, with minimal external dependencies:
//! - thiserror: Error derivation
//! - serde: Serialisation support (optional)
//!
//! Nothing in this crate talks to hardware. The traits in [`traits::instruments`]
//! describe what the optimiser needs; transports live elsewhere.
//!
//! ## Usage Examples
//!
//! ```rust
//! use mixcal_core::math::spectral::PeakExtractor;
//! use mixcal_core::types::Trace;
//!
//! // 101 samples over 10 MHz with one tone at -60 dBm
//! let mut amplitudes = vec![-100.0; 101];
//! amplitudes[50] = -60.0;
//! let trace = Trace::uniform(0.0, 10.0e6, amplitudes).unwrap();
//!
//! let extractor = PeakExtractor::new(-75.0).with_min_spacing(0.5e6);
//! let metric = extractor.spur_metric(&trace).unwrap();
//! assert!((metric - 1e-6).abs() < 1e-15);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Enable serialisation for traces, peaks, actuator state and results

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod math;
pub mod traits;
pub mod types;
