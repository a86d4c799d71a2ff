//! Minimisation driver.
//!
//! Runs the Nelder-Mead solver against one [`Objective`], checks the start
//! vector, logs the stage and turns an iteration-limit exit into a
//! [`ConvergenceWarning`](crate::error::ConvergenceWarning) rather than an
//! error.

use crate::config::OptimizerOptions;
use crate::error::CalibrationError;
use crate::objective::Objective;
use crate::report::StageOutcome;
use mixcal_core::math::solvers::NelderMeadSolver;
use mixcal_core::types::SolverError;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Applies the simplex solver to calibration objectives.
#[derive(Debug, Clone)]
pub struct MinimizationDriver {
    solver: NelderMeadSolver,
}

impl MinimizationDriver {
    /// Create a driver from option values.
    ///
    /// # Errors
    ///
    /// Returns `CalibrationError::Solver` for non-positive tolerances or a
    /// zero iteration limit.
    pub fn new(options: &OptimizerOptions) -> Result<Self, CalibrationError> {
        Ok(Self {
            solver: NelderMeadSolver::new(options.solver_config()?),
        })
    }

    /// Poll `flag` between simplex iterations.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.solver = self.solver.with_interrupt(flag);
        self
    }

    /// Minimise `objective` from `x0`.
    ///
    /// # Arguments
    ///
    /// * `objective` - Stage objective; evaluated serially
    /// * `x0` - Starting vector, length must equal the objective's dimension
    /// * `repetition` - 1-based repetition index for repeated stages
    ///
    /// # Errors
    ///
    /// - `Solver(DimensionMismatch)` before any evaluation if `x0` has the wrong length
    /// - The first objective error, unchanged
    /// - `Cancelled` if the interrupt flag was raised between iterations
    pub fn run<O: Objective>(
        &self,
        objective: &mut O,
        x0: &[f64],
        repetition: Option<usize>,
    ) -> Result<StageOutcome, CalibrationError> {
        let stage = objective.stage();
        if x0.len() != objective.dimension() {
            return Err(SolverError::DimensionMismatch {
                expected: objective.dimension(),
                got: x0.len(),
            }
            .into());
        }

        tracing::info!(
            stage = stage.name(),
            repetition = repetition.unwrap_or(0),
            "Starting minimisation from {:?}",
            x0
        );

        let result = self
            .solver
            .minimize(|params: &[f64]| objective.evaluate(params), x0)
            .map_err(|err| match err {
                CalibrationError::Solver(SolverError::Interrupted { iterations }) => {
                    tracing::warn!("{} interrupted after {} iterations", stage, iterations);
                    CalibrationError::Cancelled { stage }
                }
                other => other,
            })?;

        let outcome = StageOutcome {
            stage,
            repetition,
            start: x0.to_vec(),
            result,
        };

        tracing::info!(
            stage = stage.name(),
            iterations = outcome.result.iterations,
            evaluations = outcome.result.evaluations,
            "Minimum {:.6} at {:?}",
            outcome.result.cost,
            outcome.result.params
        );
        if let Some(warning) = outcome.warning() {
            tracing::warn!("{}", warning);
        }

        Ok(outcome)
    }
}
