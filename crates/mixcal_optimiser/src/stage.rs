//! Calibration stages and progress reporting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One step of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStage {
    /// Applying the measurement setup
    Configure,
    /// Reading the wanted sideband power
    SignalPower,
    /// Wideband sweep before optimisation
    BaselineSweep,
    /// Nulling LO leakage with the I/Q offsets
    OptimizeLo,
    /// Nulling the image with gain/phase
    OptimizeImage,
    /// Four-parameter spur minimisation
    GlobalOptimize,
    /// Wideband sweep after optimisation
    FinalSweep,
    /// Assembling the report
    Report,
}

impl CalibrationStage {
    /// Stage name as used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::SignalPower => "signal_power",
            Self::BaselineSweep => "baseline_sweep",
            Self::OptimizeLo => "optimize_lo",
            Self::OptimizeImage => "optimize_image",
            Self::GlobalOptimize => "global_optimize",
            Self::FinalSweep => "final_sweep",
            Self::Report => "report",
        }
    }

    /// Whether the stage runs the simplex solver.
    pub fn is_optimisation(&self) -> bool {
        matches!(
            self,
            Self::OptimizeLo | Self::OptimizeImage | Self::GlobalOptimize
        )
    }
}

impl fmt::Display for CalibrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress callback type: `(stage, fraction of the run completed)`.
///
/// The fraction is in `[0, 1]` and never decreases within one run.
pub type ProgressCallback = Arc<dyn Fn(CalibrationStage, f64) + Send + Sync>;

/// Report progress if a callback is installed.
pub(crate) fn report_progress(
    progress: &Option<ProgressCallback>,
    stage: CalibrationStage,
    fraction: f64,
) {
    if let Some(cb) = progress {
        cb(stage, fraction.clamp(0.0, 1.0));
    }
}
