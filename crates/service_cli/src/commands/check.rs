//! Check command implementation
//!
//! Validates the configuration and prints the derived measurement plan.

use mixcal_optimiser::prelude::CalibrationConfig;

/// Run the check command
pub fn run(config: &CalibrationConfig) {
    println!("Configuration OK");
    println!("  Method:            {}", config.method.name());
    println!("  LO frequency:      {} Hz", config.f_lo);
    println!("  Signal frequency:  {} Hz", config.signal_freq());
    println!("  Image frequency:   {} Hz", config.image_freq());
    println!("  Sweep span:        {} Hz", config.full_span());
    println!(
        "  Two-stage solver:  xatol {}, fatol {}, maxiter {}",
        config.optimizer.xatol, config.optimizer.fatol, config.optimizer.maxiter
    );
    println!(
        "  Global solver:     xatol {}, fatol {}, maxiter {}",
        config.global_optimizer.xatol,
        config.global_optimizer.fatol,
        config.global_optimizer.maxiter
    );
    println!(
        "  Spur detection:    > {} dBm, {} Hz apart",
        config.spur_threshold_dbm, config.spur_min_spacing_hz
    );
    println!("  Repetitions:       {}", config.repetitions);
}
