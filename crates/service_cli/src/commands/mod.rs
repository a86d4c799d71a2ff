//! CLI command implementations
//!
//! Each submodule implements one subcommand. Runs go against the simulated
//! bench from `mixcal_sim`; the helpers here load the configuration, build
//! the bench, drive a session through connect/run/disconnect and write the
//! report.

pub mod calibrate;
pub mod check;
pub mod spurs;

use crate::{CliError, Result};
use clap::Args;
use mixcal_core::types::ActuatorState;
use mixcal_optimiser::prelude::*;
use mixcal_sim::{MixerModel, SimulatedActuator, SimulatedAnalyzer, SimulatedBench};
use std::path::Path;

/// Session type driven by every run command.
pub type SimSession = CalibrationSession<SimulatedActuator, SimulatedAnalyzer>;

/// Simulated bench options shared by the run commands.
#[derive(Debug, Clone, Args)]
pub struct SimArgs {
    /// Standard deviation of the analyser floor ripple (dB)
    #[arg(long, default_value_t = 0.5)]
    pub noise_sigma: f64,

    /// Seed for the analyser noise
    #[arg(long, default_value_t = 42)]
    pub sim_seed: u64,
}

impl SimArgs {
    /// Default modulator model tuned to the configured LO.
    pub fn model(&self, config: &CalibrationConfig) -> Result<MixerModel> {
        if !(self.noise_sigma.is_finite() && self.noise_sigma >= 0.0) {
            return Err(CliError::invalid_argument(format!(
                "noise sigma must be non-negative, got {}",
                self.noise_sigma
            )));
        }
        Ok(MixerModel {
            lo_frequency_hz: config.f_lo,
            noise_sigma_db: self.noise_sigma,
            seed: self.sim_seed,
            ..MixerModel::default()
        })
    }
}

/// Load, override from the environment and validate the configuration.
///
/// Without a path the built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<CalibrationConfig> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::FileNotFound(path.display().to_string()));
            }
            tracing::info!("Loading configuration from {}", path.display());
            CalibrationConfig::load_with_env_and_validate(path)?
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            let config = CalibrationConfig::default().with_env_override();
            config.validate()?;
            config
        }
    };
    Ok(config)
}

/// Parse a `--seed i,q,g,phi` vector.
pub fn parse_seed(values: Option<&[f64]>) -> Result<ActuatorState> {
    match values {
        None => Ok(ActuatorState::default()),
        Some(values) => ActuatorState::from_params(values).map_err(|_| {
            CliError::invalid_argument(format!(
                "seed needs 4 values (i,q,g,phi), got {}",
                values.len()
            ))
        }),
    }
}

/// Connect, run `run`, then disconnect whatever the outcome.
pub fn run_session<F>(config: CalibrationConfig, model: MixerModel, run: F) -> Result<CalibrationReport>
where
    F: FnOnce(&mut SimSession) -> std::result::Result<CalibrationReport, CalibrationError>,
{
    let bench = SimulatedBench::new(model);
    let (actuator, analyzer) = bench.instruments();
    let mut session = CalibrationSession::new(config, actuator, analyzer);

    session.connect()?;
    let outcome = run(&mut session);
    let warnings = session.disconnect();
    if !warnings.is_empty() {
        tracing::warn!("{} teardown warnings", warnings.len());
    }

    let report = outcome?;
    tracing::debug!(
        "Bench after run: LO {:.1} dBm, image {:.1} dBm",
        bench.lo_leakage_dbm(),
        bench.image_dbm()
    );
    Ok(report)
}

/// Write the report as pretty JSON to `output`, or to stdout.
pub fn emit_report(report: &CalibrationReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::output(format!("cannot serialise report: {}", e)))?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .map_err(|e| CliError::output(format!("{}: {}", path.display(), e)))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Human-readable run summary on stderr.
pub fn print_summary(report: &CalibrationReport) {
    eprintln!("========================================");
    eprintln!("Calibration ({})", report.mode);
    eprintln!("========================================");
    eprintln!(
        "  LO offsets:   I = {:+.5} V, Q = {:+.5} V",
        report.lo_offsets.i, report.lo_offsets.q
    );
    eprintln!(
        "  Gain/phase:   g = {:+.5}, phi = {:+.5} rad",
        report.gain_phase.g, report.gain_phase.phi
    );
    match report.residual {
        ResidualMetric::StageCost { lo_dbm, image_dbm } => {
            eprintln!("  Residual:     LO {:.2} dBm, image {:.2} dBm", lo_dbm, image_dbm)
        }
        ResidualMetric::SpurPower { milliwatts } => {
            eprintln!("  Residual:     {:.4e} mW summed spur power", milliwatts)
        }
    }
    if let Some(db) = report.spectrum.improvement_db() {
        eprintln!("  Spur power:   {:.2} dB lower", db);
    }
    eprintln!("----------------------------------------");
    for (stage, repetition, converged) in report.convergence_flags() {
        let label = match repetition {
            Some(n) => format!("{} #{}", stage, n),
            None => stage.to_string(),
        };
        eprintln!(
            "  {:<20} {}",
            label,
            if converged { "converged" } else { "iteration limit" }
        );
    }
    eprintln!("----------------------------------------");
    eprintln!(
        "  {} evaluations in {} ms",
        report.total_evaluations(),
        report.duration_ms
    );
}
