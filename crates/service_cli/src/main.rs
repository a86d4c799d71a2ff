//! mixcal CLI - IQ Modulator Calibration
//!
//! Operational entry point for the calibration loop. Runs go against the
//! simulated modulator and analyser; the report is printed as JSON or written
//! to a file.
//!
//! # Commands
//!
//! - `mixcal calibrate` - Two-stage LO leakage and image rejection calibration
//! - `mixcal spurs` - Four-parameter wideband spur minimisation
//! - `mixcal check` - Validate the configuration
//!
//! # Architecture
//!
//! Service layer: loads the configuration, installs logging and hands the
//! instruments to a `mixcal_optimiser` session.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod error;

pub use error::{CliError, Result};

use commands::SimArgs;

/// IQ modulator calibration CLI
#[derive(Parser)]
#[command(name = "mixcal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging for the calibration crates
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (TOML); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Null LO leakage and the image sideband, stage by stage
    Calibrate {
        /// Override the configured repetition count
        #[arg(short, long)]
        repetitions: Option<usize>,

        /// Starting actuator state as i,q,g,phi
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        seed: Option<Vec<f64>>,

        /// Output file for the JSON report (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        sim: SimArgs,
    },

    /// Minimise summed spur power over all four actuator settings
    Spurs {
        /// Starting actuator state as i,q,g,phi
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        seed: Option<Vec<f64>>,

        /// Output file for the JSON report (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        sim: SimArgs,
    },

    /// Validate the configuration and print the measurement plan
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.verbose {
        "mixcal=debug"
    } else {
        "mixcal=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Calibrate {
            repetitions,
            seed,
            output,
            sim,
        } => commands::calibrate::run(
            config,
            &sim,
            repetitions,
            seed.as_deref(),
            output.as_deref(),
        )?,
        Commands::Spurs { seed, output, sim } => {
            commands::spurs::run(config, &sim, seed.as_deref(), output.as_deref())?
        }
        Commands::Check => commands::check::run(&config),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_calibrate_arguments() {
        let cli = Cli::try_parse_from([
            "mixcal",
            "calibrate",
            "--repetitions",
            "2",
            "--seed",
            "0.01,-0.02,0.1,0.05",
            "--noise-sigma",
            "0",
        ])
        .unwrap();

        match cli.command {
            Commands::Calibrate {
                repetitions,
                seed,
                output,
                sim,
            } => {
                assert_eq!(repetitions, Some(2));
                assert_eq!(seed, Some(vec![0.01, -0.02, 0.1, 0.05]));
                assert!(output.is_none());
                assert_eq!(sim.noise_sigma, 0.0);
                assert_eq!(sim.sim_seed, 42);
            }
            _ => panic!("Expected calibrate command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["mixcal", "check", "--config", "bench.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("bench.toml")));
        assert!(matches!(cli.command, Commands::Check));
    }
}
