//! Spurs command implementation
//!
//! Four-parameter minimisation of the summed spur power across a wideband
//! sweep.

use std::path::Path;

use tracing::info;

use super::{emit_report, parse_seed, print_summary, run_session, SimArgs};
use crate::Result;
use mixcal_optimiser::prelude::CalibrationConfig;

/// Run the spurs command
pub fn run(
    config: CalibrationConfig,
    sim: &SimArgs,
    seed: Option<&[f64]>,
    output: Option<&Path>,
) -> Result<()> {
    let seed = parse_seed(seed)?;
    let model = sim.model(&config)?;

    info!("Starting global spur minimisation...");
    info!("  Span:           {} Hz", config.full_span());
    info!("  Threshold:      {} dBm", config.spur_threshold_dbm);
    info!("  Base amplitude: {} V", config.base_amplitude);

    let report = run_session(config, model, |session| session.calibrate_spurs(seed))?;

    print_summary(&report);
    emit_report(&report, output)?;
    info!("Spur minimisation complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spurs_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spurs.json");
        let sim = SimArgs {
            noise_sigma: 0.0,
            sim_seed: 1,
        };

        run(CalibrationConfig::default(), &sim, None, Some(path.as_path())).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report["mode"], "global_spur");
        assert_eq!(report["residual"]["kind"], "spur_power");
    }

    #[test]
    fn test_bad_seed_rejected() {
        let sim = SimArgs {
            noise_sigma: 0.0,
            sim_seed: 1,
        };
        assert!(run(CalibrationConfig::default(), &sim, Some(&[0.0][..]), None).is_err());
    }
}
