//! Calibrate command implementation
//!
//! Two-stage LO leakage and image rejection calibration.

use std::path::Path;

use tracing::info;

use super::{emit_report, parse_seed, print_summary, run_session, SimArgs};
use crate::{CliError, Result};
use mixcal_optimiser::prelude::CalibrationConfig;

/// Run the calibrate command
pub fn run(
    mut config: CalibrationConfig,
    sim: &SimArgs,
    repetitions: Option<usize>,
    seed: Option<&[f64]>,
    output: Option<&Path>,
) -> Result<()> {
    if let Some(repetitions) = repetitions {
        if repetitions == 0 {
            return Err(CliError::invalid_argument("repetitions must be at least 1"));
        }
        config.repetitions = repetitions;
    }
    let seed = parse_seed(seed)?;
    let model = sim.model(&config)?;

    info!("Starting two-stage calibration...");
    info!("  f_lo:        {} Hz", config.f_lo);
    info!("  f_base:      {} Hz", config.f_base);
    info!("  Method:      {}", config.method.name());
    info!("  Repetitions: {}", config.repetitions);

    let report = run_session(config, model, |session| session.calibrate_from(seed))?;

    print_summary(&report);
    emit_report(&report, output)?;
    info!("Calibration complete");
    Ok(())
}
