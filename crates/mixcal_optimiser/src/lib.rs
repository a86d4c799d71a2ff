//! # mixcal_optimiser
//!
//! Closed-loop calibration of an analog IQ modulator.
//!
//! The optimiser treats a spectrum-measuring instrument as a black-box cost
//! function and nulls three impairments by derivative-free minimisation:
//! LO leakage (I/Q DC offsets), the image sideband (gain/phase imbalance) and
//! broadband spurs (all four settings at once).
//!
//! ## Architecture Position
//!
//! Layer 2. Depends on `mixcal_core` (L1) for data types, the simplex solver,
//! the spur metric and the instrument traits. Concrete instruments are
//! injected; this crate never names one.
//!
//! ## Modules
//!
//! - `config`: Immutable run configuration loaded from TOML
//! - `objective`: LO leakage, image and global spur objectives
//! - `driver`: Simplex driver with convergence warnings and cancellation
//! - `session`: Connection lifecycle and the two run modes
//! - `report`: Per-stage records and the final report
//! - `stage`: Stage identifiers and progress callbacks
//!
//! ## Example
//!
//! ```rust,ignore
//! use mixcal_optimiser::prelude::*;
//!
//! let config = CalibrationConfig::load_with_env_and_validate(path)?;
//! let mut session = CalibrationSession::new(config, actuator, analyzer);
//! session.connect()?;
//! let report = session.calibrate()?;
//! for warning in session.disconnect() {
//!     eprintln!("teardown: {}", warning);
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod objective;
pub mod report;
pub mod session;
pub mod stage;

pub use error::{CalibrationError, ConvergenceWarning};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{CalibrationConfig, ConfigError, OptimizerOptions};
    pub use crate::driver::MinimizationDriver;
    pub use crate::error::{CalibrationError, ConvergenceWarning};
    pub use crate::objective::{
        GlobalSpurObjective, ImageObjective, LoLeakageObjective, Objective, SweepSettings,
    };
    pub use crate::report::{
        CalibrationReport, RepetitionRecord, ResidualMetric, RunMode, SpectrumComparison,
        StageOutcome,
    };
    pub use crate::session::{CalibrationSession, SessionState};
    pub use crate::stage::{CalibrationStage, ProgressCallback};
}
