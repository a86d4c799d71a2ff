//! # mixcal_sim
//!
//! Software stand-ins for an IQ modulator and a spectrum analyser.
//!
//! The bench models a modulator with DC offsets and gain/phase imbalance
//! feeding an analyser with a noisy floor, so the calibration loop can run
//! end to end without hardware. Handles implement the `mixcal_core`
//! instrument traits; the [`SimulatedBench`] that created them keeps a view
//! of the shared state for inspection and fault injection.
//!
//! ## Architecture Position
//!
//! Layer 2, beside `mixcal_optimiser`. Depends only on `mixcal_core`.
//!
//! ## Example
//!
//! ```
//! use mixcal_sim::{MixerModel, SimulatedBench};
//!
//! let model = MixerModel::default();
//! let ideal = model.ideal_corrections();
//! assert_eq!(ideal.to_params(), [0.01, 0.02, 0.1, 0.05]);
//!
//! let bench = SimulatedBench::new(model);
//! let (_actuator, _analyzer) = bench.instruments();
//! assert_eq!(bench.counters().total(), 0);
//! ```

#![warn(missing_docs)]

pub mod actuator;
pub mod analyzer;
pub mod bench;
pub mod model;

pub use actuator::SimulatedActuator;
pub use analyzer::SimulatedAnalyzer;
pub use bench::{AnalyzerSettings, CallCounters, SimulatedBench};
pub use model::{Corrections, MixerModel, SpurTone, Tone, REFERENCE_AMPLITUDE};
