//! Calibration report and per-stage records.

use crate::error::ConvergenceWarning;
use crate::stage::CalibrationStage;
use mixcal_core::math::solvers::OptimizationResult;
use mixcal_core::math::spectral::mw_to_dbm;
use mixcal_core::types::{ActuatorState, GainPhase, LoOffsets, Trace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run mode of a calibration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Repeated LO then image minimisation, two parameters each
    TwoStage,
    /// One four-parameter spur minimisation
    GlobalSpur,
}

impl RunMode {
    /// Mode name as used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TwoStage => "two_stage",
            Self::GlobalSpur => "global_spur",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one minimisation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Stage that ran
    pub stage: CalibrationStage,
    /// Repetition index (1-based) for repeated stages
    pub repetition: Option<usize>,
    /// Starting vector handed to the solver
    pub start: Vec<f64>,
    /// Solver result
    pub result: OptimizationResult,
}

impl StageOutcome {
    /// Whether both tolerances were met.
    pub fn converged(&self) -> bool {
        self.result.converged
    }

    /// Convergence warning for a stage that hit its iteration limit.
    pub fn warning(&self) -> Option<ConvergenceWarning> {
        if self.result.converged {
            None
        } else {
            Some(ConvergenceWarning {
                stage: self.stage,
                repetition: self.repetition,
                iterations: self.result.iterations,
                cost: self.result.cost,
            })
        }
    }
}

/// One LO + image pass of the two-stage mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionRecord {
    /// Repetition index (1-based)
    pub index: usize,
    /// LO leakage stage
    pub lo: StageOutcome,
    /// Image rejection stage
    pub image: StageOutcome,
}

/// Wideband sweeps taken before and after optimisation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectrumComparison {
    /// Sweep before the first stage
    pub before: Option<Trace>,
    /// Sweep after the last stage
    pub after: Option<Trace>,
    /// Summed spur power of `before` (mW)
    pub before_metric_mw: Option<f64>,
    /// Summed spur power of `after` (mW)
    pub after_metric_mw: Option<f64>,
}

impl SpectrumComparison {
    /// Spur power reduction `10 log10(before / after)` in dB.
    ///
    /// `None` unless both metrics are known and positive.
    pub fn improvement_db(&self) -> Option<f64> {
        match (self.before_metric_mw, self.after_metric_mw) {
            (Some(before), Some(after)) if before > 0.0 && after > 0.0 => {
                Some(mw_to_dbm(before) - mw_to_dbm(after))
            }
            _ => None,
        }
    }
}

/// Final residual of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResidualMetric {
    /// Best LO and image readings of the last repetition (dBm)
    StageCost {
        /// LO leakage reading (dBm)
        lo_dbm: f64,
        /// Image sideband reading (dBm)
        image_dbm: f64,
    },
    /// Best summed spur power (mW)
    SpurPower {
        /// Summed peak power (mW)
        milliwatts: f64,
    },
}

/// Calibration report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Mode the run used
    pub mode: RunMode,
    /// Best I/Q offsets (V)
    pub lo_offsets: LoOffsets,
    /// Best gain/phase correction
    pub gain_phase: GainPhase,
    /// Wanted sideband power measured before the run (dBm)
    pub signal_power_dbm: Option<f64>,
    /// LO/image passes, in order (two-stage mode)
    pub repetitions: Vec<RepetitionRecord>,
    /// Four-parameter stage (global-spur mode)
    pub global: Option<StageOutcome>,
    /// Before/after sweeps
    pub spectrum: SpectrumComparison,
    /// Final residual
    pub residual: ResidualMetric,
    /// Stages that hit their iteration limit
    pub warnings: Vec<ConvergenceWarning>,
    /// Wall-clock duration of the run (ms)
    pub duration_ms: u64,
}

impl CalibrationReport {
    /// Best actuator state found.
    pub fn actuator_state(&self) -> ActuatorState {
        ActuatorState::from_pairs(self.lo_offsets, self.gain_phase)
    }

    /// Every stage outcome in execution order.
    pub fn stages(&self) -> impl Iterator<Item = &StageOutcome> + '_ {
        self.repetitions
            .iter()
            .flat_map(|rep| [&rep.lo, &rep.image])
            .chain(self.global.iter())
    }

    /// `(stage, repetition, converged)` for every stage.
    pub fn convergence_flags(&self) -> Vec<(CalibrationStage, Option<usize>, bool)> {
        self.stages()
            .map(|s| (s.stage, s.repetition, s.converged()))
            .collect()
    }

    /// Whether every stage converged.
    pub fn converged(&self) -> bool {
        self.stages().all(StageOutcome::converged)
    }

    /// Total objective evaluations across all stages.
    pub fn total_evaluations(&self) -> usize {
        self.stages().map(|s| s.result.evaluations).sum()
    }
}
