//! Simplex solver configuration.

use crate::types::SolverError;

/// Configuration for the Nelder-Mead simplex solver.
///
/// The convergence test requires both tolerances at once: every vertex
/// within `xatol` (max-norm) of the best vertex, and every vertex cost within
/// `fatol` of the best cost.
///
/// # Example
///
/// ```
/// use mixcal_core::math::solvers::NelderMeadConfig;
///
/// // Use default configuration
/// let config = NelderMeadConfig::default();
/// assert_eq!(config.max_iterations, 200);
///
/// // Custom tolerances as used for LO leakage nulling
/// let config = NelderMeadConfig::new(1e-4, 3.0, 50).unwrap();
/// assert_eq!(config.fatol, 3.0);
///
/// // Non-positive tolerances are rejected
/// assert!(NelderMeadConfig::new(0.0, 3.0, 50).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NelderMeadConfig {
    /// Absolute tolerance on vertex coordinates.
    pub xatol: f64,

    /// Absolute tolerance on vertex costs.
    pub fatol: f64,

    /// Maximum number of iterations; the initial simplex counts as the first.
    pub max_iterations: usize,

    /// Reflection coefficient (rho).
    pub reflection: f64,

    /// Expansion coefficient (chi).
    pub expansion: f64,

    /// Contraction coefficient (psi).
    pub contraction: f64,

    /// Shrink coefficient (sigma).
    pub shrink: f64,

    /// Relative perturbation applied to non-zero coordinates of the start point.
    pub initial_step: f64,

    /// Absolute perturbation applied to zero coordinates of the start point.
    pub zero_step: f64,
}

impl Default for NelderMeadConfig {
    /// Default values:
    /// - `xatol`: 1e-4
    /// - `fatol`: 1e-4
    /// - `max_iterations`: 200
    fn default() -> Self {
        Self {
            xatol: 1e-4,
            fatol: 1e-4,
            max_iterations: 200,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
            initial_step: 0.05,
            zero_step: 0.00025,
        }
    }
}

impl NelderMeadConfig {
    /// Create a configuration with the given tolerances and iteration limit.
    ///
    /// # Errors
    ///
    /// Returns `SolverError::InvalidConfig` if a tolerance is not a positive
    /// finite number or `max_iterations == 0`.
    pub fn new(xatol: f64, fatol: f64, max_iterations: usize) -> Result<Self, SolverError> {
        let config = Self {
            xatol,
            fatol,
            max_iterations,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every option is in range.
    pub fn validate(&self) -> Result<(), SolverError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SolverError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        };
        positive("xatol", self.xatol)?;
        positive("fatol", self.fatol)?;
        positive("reflection", self.reflection)?;
        positive("initial_step", self.initial_step)?;
        positive("zero_step", self.zero_step)?;
        if self.max_iterations == 0 {
            return Err(SolverError::InvalidConfig(
                "max_iterations must be > 0".to_string(),
            ));
        }
        if self.expansion <= 1.0 || self.expansion < self.reflection {
            return Err(SolverError::InvalidConfig(format!(
                "expansion must exceed 1 and reflection, got {}",
                self.expansion
            )));
        }
        for (name, value) in [("contraction", self.contraction), ("shrink", self.shrink)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(SolverError::InvalidConfig(format!(
                    "{} must lie in (0, 1), got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NelderMeadConfig::default();
        assert!((config.xatol - 1e-4).abs() < 1e-15);
        assert_eq!(config.max_iterations, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_config() {
        let config = NelderMeadConfig::new(1e-6, 0.5, 80).unwrap();
        assert_eq!(config.max_iterations, 80);
        assert_eq!(config.reflection, 1.0);
        assert_eq!(config.expansion, 2.0);
    }

    #[test]
    fn test_zero_tolerances_rejected() {
        assert!(matches!(
            NelderMeadConfig::new(0.0, 1.0, 10),
            Err(SolverError::InvalidConfig(msg)) if msg.contains("xatol")
        ));
        assert!(matches!(
            NelderMeadConfig::new(1.0, -1.0, 10),
            Err(SolverError::InvalidConfig(msg)) if msg.contains("fatol")
        ));
        assert!(NelderMeadConfig::new(1.0, f64::NAN, 10).is_err());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(matches!(
            NelderMeadConfig::new(1e-4, 1e-4, 0),
            Err(SolverError::InvalidConfig(msg)) if msg.contains("max_iterations")
        ));
    }

    #[test]
    fn test_bad_coefficients_rejected() {
        let config = NelderMeadConfig {
            contraction: 1.5,
            ..NelderMeadConfig::default()
        };
        assert!(config.validate().is_err());

        let config = NelderMeadConfig {
            expansion: 0.5,
            ..NelderMeadConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
