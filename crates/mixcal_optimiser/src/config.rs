//! Calibration configuration.
//!
//! Loaded once from TOML, optionally overridden from `MIXCAL_*` environment
//! variables, validated, then passed by reference to every component. Nothing
//! mutates it after the session starts.
//!
//! ```toml
//! method = "marker"
//! f_lo = 2.0e9
//! f_base = 1.0e6
//! repetitions = 3
//!
//! [optimizer]
//! xatol = 1e-4
//! fatol = 3.0
//! maxiter = 50
//! ```

use mixcal_core::math::solvers::NelderMeadConfig;
use mixcal_core::math::spectral::PeakExtractor;
use mixcal_core::types::{MeasurementMethod, SolverError};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;

/// Upper bound on `repetitions`.
pub const MAX_REPETITIONS: usize = 1000;

/// Tolerances and iteration limit for one simplex minimisation.
///
/// Keys missing from a TOML table take the LO/image stage defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerOptions {
    /// Absolute tolerance on parameters
    #[serde(default = "default_xatol")]
    pub xatol: f64,
    /// Absolute tolerance on cost
    #[serde(default = "default_fatol")]
    pub fatol: f64,
    /// Iteration limit
    #[serde(default = "default_maxiter")]
    pub maxiter: usize,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        default_optimizer()
    }
}

impl OptimizerOptions {
    /// Create an option block.
    pub fn new(xatol: f64, fatol: f64, maxiter: usize) -> Self {
        Self {
            xatol,
            fatol,
            maxiter,
        }
    }

    /// Build the solver configuration.
    ///
    /// # Errors
    ///
    /// Returns `SolverError::InvalidConfig` for non-positive tolerances or a
    /// zero iteration limit.
    pub fn solver_config(&self) -> Result<NelderMeadConfig, SolverError> {
        NelderMeadConfig::new(self.xatol, self.fatol, self.maxiter)
    }

    fn collect_errors(&self, section: &str, errors: &mut Vec<String>) {
        if !(self.xatol.is_finite() && self.xatol > 0.0) {
            errors.push(format!("{}.xatol must be positive, got {}", section, self.xatol));
        }
        if !(self.fatol.is_finite() && self.fatol > 0.0) {
            errors.push(format!("{}.fatol must be positive, got {}", section, self.fatol));
        }
        if self.maxiter == 0 {
            errors.push(format!("{}.maxiter must be greater than 0", section));
        }
    }
}

/// Calibration configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Single-point measurement method
    #[serde(default)]
    pub method: MeasurementMethod,

    /// LO frequency (Hz)
    #[serde(default = "default_f_lo")]
    pub f_lo: f64,

    /// Base-band tone frequency (Hz)
    #[serde(default = "default_f_base")]
    pub f_base: f64,

    /// Resolution bandwidth for single-point readings (Hz)
    #[serde(default = "default_measurement_bandwidth")]
    pub measurement_bandwidth: f64,

    /// Integration bandwidth in integrated-power mode (Hz); defaults to
    /// `measurement_bandwidth`
    #[serde(default)]
    pub integration_bandwidth: Option<f64>,

    /// Resolution bandwidth for wideband sweeps (Hz)
    #[serde(default = "default_sweep_bandwidth")]
    pub sweep_bandwidth: f64,

    /// Points per single-point measurement sweep
    #[serde(default = "default_measurement_points")]
    pub measurement_points: usize,

    /// Points per wideband sweep
    #[serde(default = "default_sweep_points")]
    pub sweep_points: usize,

    /// Options for the LO and image stages
    #[serde(default = "default_optimizer")]
    pub optimizer: OptimizerOptions,

    /// Options for the four-parameter spur minimisation
    #[serde(
        default = "default_global_optimizer",
        deserialize_with = "global_optimizer_table"
    )]
    pub global_optimizer: OptimizerOptions,

    /// Number of LO/image repetitions
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,

    /// Spur peak threshold (dBm)
    #[serde(default = "default_spur_threshold_dbm")]
    pub spur_threshold_dbm: f64,

    /// Minimum spacing between spur peaks (Hz)
    #[serde(default = "default_spur_min_spacing_hz")]
    pub spur_min_spacing_hz: f64,

    /// Capture a wideband sweep before and after the run
    #[serde(default = "default_true")]
    pub enable_before_after_sweep: bool,

    /// Full span as a multiple of `f_base`
    #[serde(default = "default_span_scaling")]
    pub span_scaling: f64,

    /// Drive amplitude passed with gain/phase writes in spur mode (V)
    #[serde(default = "default_base_amplitude")]
    pub base_amplitude: f64,

    /// Read the wanted sideband power before the two-stage run
    #[serde(default = "default_true")]
    pub measure_signal_power: bool,
}

fn default_f_lo() -> f64 {
    2.0e9
}

fn default_f_base() -> f64 {
    1.0e6
}

fn default_measurement_bandwidth() -> f64 {
    1.0e6
}

fn default_sweep_bandwidth() -> f64 {
    1.0e5
}

fn default_measurement_points() -> usize {
    101
}

fn default_sweep_points() -> usize {
    1201
}

fn default_xatol() -> f64 {
    1e-4
}

fn default_fatol() -> f64 {
    3.0
}

fn default_maxiter() -> usize {
    50
}

fn default_optimizer() -> OptimizerOptions {
    OptimizerOptions::new(default_xatol(), default_fatol(), default_maxiter())
}

fn default_global_optimizer() -> OptimizerOptions {
    OptimizerOptions::new(default_xatol(), default_fatol(), 500)
}

/// `[global_optimizer]` keys as written; absent keys fall back to
/// `default_global_optimizer`.
#[derive(Deserialize)]
struct GlobalOptimizerTable {
    xatol: Option<f64>,
    fatol: Option<f64>,
    maxiter: Option<usize>,
}

fn global_optimizer_table<'de, D>(deserializer: D) -> Result<OptimizerOptions, D::Error>
where
    D: Deserializer<'de>,
{
    let table = GlobalOptimizerTable::deserialize(deserializer)?;
    let base = default_global_optimizer();
    Ok(OptimizerOptions::new(
        table.xatol.unwrap_or(base.xatol),
        table.fatol.unwrap_or(base.fatol),
        table.maxiter.unwrap_or(base.maxiter),
    ))
}

fn default_repetitions() -> usize {
    3
}

fn default_spur_threshold_dbm() -> f64 {
    -75.0
}

fn default_spur_min_spacing_hz() -> f64 {
    0.5e6
}

fn default_span_scaling() -> f64 {
    16.1
}

fn default_base_amplitude() -> f64 {
    0.3
}

fn default_true() -> bool {
    true
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            method: MeasurementMethod::default(),
            f_lo: default_f_lo(),
            f_base: default_f_base(),
            measurement_bandwidth: default_measurement_bandwidth(),
            integration_bandwidth: None,
            sweep_bandwidth: default_sweep_bandwidth(),
            measurement_points: default_measurement_points(),
            sweep_points: default_sweep_points(),
            optimizer: default_optimizer(),
            global_optimizer: default_global_optimizer(),
            repetitions: default_repetitions(),
            spur_threshold_dbm: default_spur_threshold_dbm(),
            spur_min_spacing_hz: default_spur_min_spacing_hz(),
            enable_before_after_sweep: true,
            span_scaling: default_span_scaling(),
            base_amplitude: default_base_amplitude(),
            measure_signal_power: true,
        }
    }
}

impl CalibrationConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text. Missing keys take their defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use mixcal_optimiser::config::CalibrationConfig;
    /// use mixcal_core::types::MeasurementMethod;
    ///
    /// let config = CalibrationConfig::from_toml_str(r#"
    ///     method = "integrated_power"
    ///     repetitions = 2
    /// "#).unwrap();
    /// assert_eq!(config.method, MeasurementMethod::IntegratedPower);
    /// assert_eq!(config.repetitions, 2);
    /// assert_eq!(config.sweep_points, 1201);
    ///
    /// assert!(CalibrationConfig::from_toml_str(r#"method = "bogus""#).is_err());
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides.
    ///
    /// Recognised variables: `MIXCAL_METHOD`, `MIXCAL_F_LO`, `MIXCAL_F_BASE`,
    /// `MIXCAL_REPETITIONS`. Unparseable values leave the setting unchanged.
    pub fn with_env_override(mut self) -> Self {
        if let Ok(method) = std::env::var("MIXCAL_METHOD") {
            if let Some(method) = MeasurementMethod::from_name(&method) {
                self.method = method;
            }
        }

        if let Ok(f_lo) = std::env::var("MIXCAL_F_LO") {
            self.f_lo = f_lo.trim().parse().unwrap_or(self.f_lo);
        }

        if let Ok(f_base) = std::env::var("MIXCAL_F_BASE") {
            self.f_base = f_base.trim().parse().unwrap_or(self.f_base);
        }

        if let Ok(repetitions) = std::env::var("MIXCAL_REPETITIONS") {
            self.repetitions = repetitions.trim().parse().unwrap_or(self.repetitions);
        }

        self
    }

    /// Validate the configuration, collecting every violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !(self.f_lo.is_finite() && self.f_lo > 0.0) {
            errors.push(format!("f_lo must be positive, got {}", self.f_lo));
        }
        if !(self.f_base.is_finite() && self.f_base >= 0.0) {
            errors.push(format!("f_base must be non-negative, got {}", self.f_base));
        }
        if self.f_lo <= self.f_base {
            errors.push(format!(
                "f_lo ({}) must exceed f_base ({})",
                self.f_lo, self.f_base
            ));
        }

        for (name, value) in [
            ("measurement_bandwidth", self.measurement_bandwidth),
            ("sweep_bandwidth", self.sweep_bandwidth),
            ("span_scaling", self.span_scaling),
            ("base_amplitude", self.base_amplitude),
        ] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(format!("{} must be positive, got {}", name, value));
            }
        }
        if let Some(bw) = self.integration_bandwidth {
            if !(bw.is_finite() && bw > 0.0) {
                errors.push(format!("integration_bandwidth must be positive, got {}", bw));
            }
        }

        if self.measurement_points == 0 {
            errors.push("measurement_points must be greater than 0".to_string());
        }
        if self.sweep_points < 2 {
            errors.push(format!(
                "sweep_points must be at least 2, got {}",
                self.sweep_points
            ));
        }
        if self.repetitions == 0 {
            errors.push("repetitions must be greater than 0".to_string());
        } else if self.repetitions > MAX_REPETITIONS {
            errors.push(format!(
                "repetitions must be at most {}, got {}",
                MAX_REPETITIONS, self.repetitions
            ));
        }

        self.optimizer.collect_errors("optimizer", &mut errors);
        self.global_optimizer
            .collect_errors("global_optimizer", &mut errors);

        if !self.spur_threshold_dbm.is_finite() {
            errors.push(format!(
                "spur_threshold_dbm must be finite, got {}",
                self.spur_threshold_dbm
            ));
        }
        if !(self.spur_min_spacing_hz.is_finite() && self.spur_min_spacing_hz >= 0.0) {
            errors.push(format!(
                "spur_min_spacing_hz must be non-negative, got {}",
                self.spur_min_spacing_hz
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load from file with environment overrides and validate.
    pub fn load_with_env_and_validate(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?.with_env_override();
        config.validate()?;
        Ok(config)
    }

    /// Wideband sweep span: `span_scaling * f_base` (Hz).
    pub fn full_span(&self) -> f64 {
        (self.span_scaling * self.f_base).abs()
    }

    /// Image sideband frequency `f_lo - f_base` (Hz).
    pub fn image_freq(&self) -> f64 {
        self.f_lo - self.f_base
    }

    /// Wanted sideband frequency `f_lo + f_base` (Hz).
    pub fn signal_freq(&self) -> f64 {
        self.f_lo + self.f_base
    }

    /// Integration bandwidth used in integrated-power mode (Hz).
    pub fn integration_bandwidth(&self) -> f64 {
        self.integration_bandwidth
            .unwrap_or(self.measurement_bandwidth)
    }

    /// Peak extractor with the configured spur threshold and spacing.
    pub fn peak_extractor(&self) -> PeakExtractor {
        PeakExtractor::new(self.spur_threshold_dbm).with_min_spacing(self.spur_min_spacing_hz)
    }
}

/// Configuration error type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// IO error reading the config file
    #[error("IO error: {0}")]
    Io(String),

    /// TOML parse error, including unknown measurement methods
    #[error("Parse error: {0}")]
    Parse(String),

    /// One or more settings out of range
    #[error("Validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn validation_errors(config: &CalibrationConfig) -> Vec<String> {
        match config.validate() {
            Err(ConfigError::Validation(errors)) => errors,
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_config() {
        let config = CalibrationConfig::default();
        assert_eq!(config.method, MeasurementMethod::Marker);
        assert_eq!(config.measurement_points, 101);
        assert_eq!(config.sweep_points, 1201);
        assert_eq!(config.optimizer, OptimizerOptions::new(1e-4, 3.0, 50));
        assert_eq!(config.global_optimizer.maxiter, 500);
        assert_eq!(config.repetitions, 3);
        assert!(config.enable_before_after_sweep);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_frequencies() {
        let config = CalibrationConfig::default();
        assert_relative_eq!(config.full_span(), 16.1e6, epsilon = 1e-6);
        assert_relative_eq!(config.image_freq(), 1.999e9);
        assert_relative_eq!(config.signal_freq(), 2.001e9);
        assert_eq!(config.integration_bandwidth(), config.measurement_bandwidth);
    }

    #[test]
    fn test_empty_toml_matches_default() {
        let config = CalibrationConfig::from_toml_str("").unwrap();
        assert_eq!(config, CalibrationConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = CalibrationConfig::default();
        config.method = MeasurementMethod::IntegratedPower;
        config.integration_bandwidth = Some(2.0e6);
        config.global_optimizer = OptimizerOptions::new(1e-5, 1e-9, 250);

        let text = toml::to_string(&config).unwrap();
        let parsed = CalibrationConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_optimizer_table_merges_defaults() {
        let config = CalibrationConfig::from_toml_str("[optimizer]\nmaxiter = 100\n").unwrap();
        assert_eq!(config.optimizer, OptimizerOptions::new(1e-4, 3.0, 100));
        assert_eq!(config.global_optimizer, OptimizerOptions::new(1e-4, 3.0, 500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_global_optimizer_table_keeps_global_maxiter() {
        let config =
            CalibrationConfig::from_toml_str("[global_optimizer]\nfatol = 1e-9\n").unwrap();
        assert_eq!(config.global_optimizer, OptimizerOptions::new(1e-4, 1e-9, 500));
        assert_eq!(config.optimizer, OptimizerOptions::default());

        let config =
            CalibrationConfig::from_toml_str("[global_optimizer]\nmaxiter = 20\n").unwrap();
        assert_eq!(config.global_optimizer.maxiter, 20);
        assert_eq!(config.global_optimizer.xatol, 1e-4);
    }

    #[test]
    fn test_optimizer_table_type_errors_still_reported() {
        let err = CalibrationConfig::from_toml_str("[global_optimizer]\nmaxiter = \"many\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_repetitions_upper_bound() {
        let config = CalibrationConfig {
            repetitions: usize::MAX,
            ..CalibrationConfig::default()
        };
        let errors = validation_errors(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("at most 1000"));

        let config = CalibrationConfig {
            repetitions: MAX_REPETITIONS,
            ..CalibrationConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = CalibrationConfig::from_toml_str(r#"method = "spectrogram""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("spectrogram")));
    }

    #[test]
    fn test_missing_file() {
        let err = CalibrationConfig::load(Path::new("/nonexistent/mixcal.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_validate_frequency_order() {
        let config = CalibrationConfig {
            f_lo: 1.0e6,
            f_base: 2.0e6,
            ..CalibrationConfig::default()
        };
        let errors = validation_errors(&config);
        assert!(errors.iter().any(|e| e.contains("must exceed f_base")));
    }

    #[test]
    fn test_validate_collects_every_violation() {
        let config = CalibrationConfig {
            repetitions: 0,
            sweep_points: 1,
            optimizer: OptimizerOptions::new(0.0, -1.0, 0),
            spur_min_spacing_hz: -5.0,
            ..CalibrationConfig::default()
        };
        let errors = validation_errors(&config);
        assert_eq!(errors.len(), 6);
        assert!(errors.iter().any(|e| e.contains("repetitions")));
        assert!(errors.iter().any(|e| e.contains("optimizer.xatol")));
        assert!(errors.iter().any(|e| e.contains("optimizer.fatol")));
        assert!(errors.iter().any(|e| e.contains("optimizer.maxiter")));
        assert!(errors.iter().any(|e| e.contains("sweep_points")));
        assert!(errors.iter().any(|e| e.contains("spur_min_spacing_hz")));
    }

    #[test]
    fn test_zero_base_frequency_allowed() {
        let config = CalibrationConfig {
            f_base: 0.0,
            ..CalibrationConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.full_span(), 0.0);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("MIXCAL_REPETITIONS", "7");
        std::env::set_var("MIXCAL_METHOD", "integrated_power");
        let config = CalibrationConfig::default().with_env_override();
        std::env::remove_var("MIXCAL_REPETITIONS");
        std::env::remove_var("MIXCAL_METHOD");

        assert_eq!(config.repetitions, 7);
        assert_eq!(config.method, MeasurementMethod::IntegratedPower);
    }

    #[test]
    fn test_env_override_ignores_garbage() {
        std::env::set_var("MIXCAL_F_BASE", "one megahertz");
        let config = CalibrationConfig::default().with_env_override();
        std::env::remove_var("MIXCAL_F_BASE");

        assert_eq!(config.f_base, 1.0e6);
    }

    #[test]
    fn test_peak_extractor_from_config() {
        let config = CalibrationConfig {
            spur_threshold_dbm: -70.0,
            spur_min_spacing_hz: 1.0e6,
            ..CalibrationConfig::default()
        };
        let extractor = config.peak_extractor();
        assert_eq!(extractor.threshold_dbm(), -70.0);
        assert_eq!(extractor.min_spacing_hz(), 1.0e6);
    }

    #[test]
    fn test_solver_config_from_options() {
        let solver = OptimizerOptions::new(1e-4, 3.0, 50).solver_config().unwrap();
        assert_eq!(solver.max_iterations, 50);
        assert!(OptimizerOptions::new(1e-4, 3.0, 0).solver_config().is_err());
    }
}
