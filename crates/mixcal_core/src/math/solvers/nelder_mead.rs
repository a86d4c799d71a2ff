//! Nelder-Mead simplex minimiser.
//!
//! This module provides the [`NelderMeadSolver`] for minimising a scalar
//! objective over a small continuous parameter vector without derivatives.
//!
//! # Algorithm
//!
//! The solver keeps `n + 1` vertices sorted by cost. Each iteration replaces
//! the worst vertex `x_w` using the centroid `x̄` of the others:
//!
//! ```text
//! reflect:   x_r  = x̄ + ρ (x̄ - x_w)
//! expand:    x_e  = x̄ + ρχ (x̄ - x_w)
//! outside:   x_c  = x̄ + ψρ (x̄ - x_w)
//! inside:    x_cc = x̄ - ψ (x̄ - x_w)
//! shrink:    x_i  = x_0 + σ (x_i - x_0)
//! ```
//!
//! The objective is fallible. The first error aborts the search and is
//! returned unchanged; a half-finished simplex is never resumed.

use super::NelderMeadConfig;
use crate::types::SolverError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of one minimisation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizationResult {
    /// Best parameter vector found.
    pub params: Vec<f64>,
    /// Objective value at `params`.
    pub cost: f64,
    /// Iterations performed (the initial simplex counts as one).
    pub iterations: usize,
    /// Number of objective evaluations.
    pub evaluations: usize,
    /// Whether both tolerances were met before the iteration limit.
    pub converged: bool,
}

/// Derivative-free Nelder-Mead simplex solver.
///
/// Solves unconstrained problems of the form:
/// ```text
/// min_x f(x)
/// ```
/// where each evaluation of `f` may fail.
///
/// # Example
///
/// ```
/// use mixcal_core::math::solvers::{NelderMeadConfig, NelderMeadSolver};
/// use mixcal_core::types::SolverError;
///
/// let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-4, 3.0, 50).unwrap());
///
/// // LO leakage bowl with its null at (0.01, 0.02)
/// let leakage = |p: &[f64]| -> Result<f64, SolverError> {
///     Ok((p[0] - 0.01).powi(2) + (p[1] - 0.02).powi(2) - 75.0)
/// };
///
/// let result = solver.minimize(leakage, &[0.0, 0.0]).unwrap();
/// assert!(result.converged);
/// assert!((result.params[0] - 0.01).abs() < 1e-4);
/// assert!((result.params[1] - 0.02).abs() < 1e-4);
/// ```
#[derive(Debug, Clone)]
pub struct NelderMeadSolver {
    config: NelderMeadConfig,
    interrupt: Option<Arc<AtomicBool>>,
}

impl NelderMeadSolver {
    /// Create a new solver with the given configuration.
    pub fn new(config: NelderMeadConfig) -> Self {
        Self {
            config,
            interrupt: None,
        }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(NelderMeadConfig::default())
    }

    /// Attach a cancellation flag.
    ///
    /// The flag is polled between iterations only, never while an objective
    /// evaluation is in flight.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Get the solver configuration.
    pub fn config(&self) -> &NelderMeadConfig {
        &self.config
    }

    /// Minimise `objective` starting from `x0`.
    ///
    /// # Arguments
    ///
    /// * `objective` - Fallible cost function, called serially
    /// * `x0` - Starting vertex
    ///
    /// # Returns
    ///
    /// * `Ok(OptimizationResult)` - Best vertex, converged or not
    /// * `Err(E)` - First objective error, or a [`SolverError`] for an empty
    ///   start vector, invalid configuration or interruption
    pub fn minimize<F, E>(&self, mut objective: F, x0: &[f64]) -> Result<OptimizationResult, E>
    where
        F: FnMut(&[f64]) -> Result<f64, E>,
        E: From<SolverError>,
    {
        let n = x0.len();
        if n == 0 {
            return Err(SolverError::EmptyParameters.into());
        }
        self.config.validate()?;

        let cfg = &self.config;
        let rho = cfg.reflection;
        let chi = cfg.expansion;
        let psi = cfg.contraction;
        let sigma = cfg.shrink;

        // Initial simplex: x0 plus one perturbed copy per coordinate
        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        simplex.push(x0.to_vec());
        for k in 0..n {
            let mut vertex = x0.to_vec();
            vertex[k] = if vertex[k] != 0.0 {
                (1.0 + cfg.initial_step) * vertex[k]
            } else {
                cfg.zero_step
            };
            simplex.push(vertex);
        }

        let mut evaluations = 0usize;
        let mut costs = Vec::with_capacity(n + 1);
        for vertex in &simplex {
            costs.push(objective(vertex)?);
            evaluations += 1;
        }
        sort_simplex(&mut simplex, &mut costs);

        let mut iterations = 1usize;
        let mut converged = false;

        while iterations < cfg.max_iterations {
            if self.within_tolerance(&simplex, &costs) {
                converged = true;
                break;
            }
            if self.is_interrupted() {
                return Err(SolverError::Interrupted { iterations }.into());
            }

            let centroid = centroid(&simplex[..n]);
            let worst = simplex[n].clone();

            let reflected = affine(&centroid, 1.0 + rho, &worst, -rho);
            let f_reflected = objective(&reflected)?;
            evaluations += 1;

            let mut shrink = false;

            if f_reflected < costs[0] {
                let expanded = affine(&centroid, 1.0 + rho * chi, &worst, -rho * chi);
                let f_expanded = objective(&expanded)?;
                evaluations += 1;

                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    costs[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    costs[n] = f_reflected;
                }
            } else if f_reflected < costs[n - 1] {
                simplex[n] = reflected;
                costs[n] = f_reflected;
            } else if f_reflected < costs[n] {
                // Outside contraction
                let contracted = affine(&centroid, 1.0 + psi * rho, &worst, -psi * rho);
                let f_contracted = objective(&contracted)?;
                evaluations += 1;

                if f_contracted <= f_reflected {
                    simplex[n] = contracted;
                    costs[n] = f_contracted;
                } else {
                    shrink = true;
                }
            } else {
                // Inside contraction
                let contracted = affine(&centroid, 1.0 - psi, &worst, psi);
                let f_contracted = objective(&contracted)?;
                evaluations += 1;

                if f_contracted < costs[n] {
                    simplex[n] = contracted;
                    costs[n] = f_contracted;
                } else {
                    shrink = true;
                }
            }

            if shrink {
                let best = simplex[0].clone();
                for j in 1..=n {
                    simplex[j] = affine(&best, 1.0 - sigma, &simplex[j], sigma);
                    costs[j] = objective(&simplex[j])?;
                    evaluations += 1;
                }
            }

            iterations += 1;
            sort_simplex(&mut simplex, &mut costs);
        }

        Ok(OptimizationResult {
            params: simplex.swap_remove(0),
            cost: costs[0],
            iterations,
            evaluations,
            converged,
        })
    }

    fn within_tolerance(&self, simplex: &[Vec<f64>], costs: &[f64]) -> bool {
        let best = &simplex[0];
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(best).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        let f_spread = costs[1..]
            .iter()
            .map(|c| (c - costs[0]).abs())
            .fold(0.0_f64, f64::max);
        x_spread <= self.config.xatol && f_spread <= self.config.fatol
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// `wa * a + wb * b`, element-wise.
fn affine(a: &[f64], wa: f64, b: &[f64], wb: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| wa * x + wb * y).collect()
}

fn centroid(vertices: &[Vec<f64>]) -> Vec<f64> {
    let dim = vertices[0].len();
    let count = vertices.len() as f64;
    (0..dim)
        .map(|d| vertices.iter().map(|v| v[d]).sum::<f64>() / count)
        .collect()
}

// NaN costs sort last so they are replaced first.
fn sort_simplex(simplex: &mut Vec<Vec<f64>>, costs: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..costs.len()).collect();
    order.sort_by(|&i, &j| costs[i].total_cmp(&costs[j]));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *costs = order.iter().map(|&i| costs[i]).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    fn quadratic(center: [f64; 2], offset: f64) -> impl Fn(&[f64]) -> Result<f64, SolverError> {
        move |p: &[f64]| Ok((p[0] - center[0]).powi(2) + (p[1] - center[1]).powi(2) + offset)
    }

    // ========================================
    // Basic Functionality Tests
    // ========================================

    #[test]
    fn test_lo_leakage_bowl_from_origin() {
        let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-4, 3.0, 50).unwrap());
        let result = solver
            .minimize(quadratic([0.01, 0.02], -75.0), &[0.0, 0.0])
            .unwrap();

        assert!(result.converged);
        assert!((result.params[0] - 0.01).abs() < 1e-4);
        assert!((result.params[1] - 0.02).abs() < 1e-4);
        assert!(result.iterations < 50);
    }

    #[test]
    fn test_start_at_minimum_stays_put() {
        let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-4, 3.0, 50).unwrap());
        let result = solver
            .minimize(quadratic([0.01, 0.02], -75.0), &[0.01, 0.02])
            .unwrap();

        assert!(result.converged);
        assert_eq!(result.params, vec![0.01, 0.02]);
        assert_relative_eq!(result.cost, -75.0);
    }

    #[test]
    fn test_tight_tolerance_quadratic() {
        let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-8, 1e-8, 500).unwrap());
        let result = solver.minimize(quadratic([1.0, 2.0], 0.0), &[0.0, 0.0]).unwrap();

        assert!(result.converged);
        assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(result.params[1], 2.0, epsilon = 1e-6);
        assert!(result.cost < 1e-12);
    }

    #[test]
    fn test_one_dimensional() {
        let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-7, 1e-12, 500).unwrap());
        let result = solver
            .minimize(|p: &[f64]| Ok::<_, SolverError>((p[0] + 0.3).powi(2)), &[1.0])
            .unwrap();

        assert!(result.converged);
        assert_relative_eq!(result.params[0], -0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_four_dimensional_spur_bowl() {
        let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-4, 1e-9, 500).unwrap());
        let target = [0.01, 0.02, 0.1, 0.05];
        let result = solver
            .minimize(
                |p: &[f64]| {
                    Ok::<_, SolverError>(p.iter().zip(&target).map(|(a, b)| (a - b).powi(2)).sum())
                },
                &[0.0; 4],
            )
            .unwrap();

        assert!(result.converged);
        for (p, t) in result.params.iter().zip(&target) {
            assert!((p - t).abs() < 1e-3, "{} vs {}", p, t);
        }
    }

    // ========================================
    // Iteration Limit Tests
    // ========================================

    #[test]
    fn test_max_iterations_returns_best_not_converged() {
        let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-12, 1e-12, 5).unwrap());
        let rosenbrock = |p: &[f64]| {
            Ok::<_, SolverError>((1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0] * p[0]).powi(2))
        };
        let start_cost = rosenbrock(&[-1.2, 1.0]).unwrap();
        let result = solver.minimize(rosenbrock, &[-1.2, 1.0]).unwrap();

        assert!(!result.converged);
        assert_eq!(result.iterations, 5);
        assert!(result.cost <= start_cost);
    }

    #[test]
    fn test_single_iteration_limit_only_builds_simplex() {
        let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-4, 1e-4, 1).unwrap());
        let result = solver.minimize(quadratic([5.0, 5.0], 0.0), &[0.0, 0.0]).unwrap();

        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.evaluations, 3);
    }

    // ========================================
    // Error Propagation Tests
    // ========================================

    #[derive(Debug, PartialEq)]
    enum ProbeError {
        Hardware,
        Solver(SolverError),
    }

    impl From<SolverError> for ProbeError {
        fn from(err: SolverError) -> Self {
            ProbeError::Solver(err)
        }
    }

    #[test]
    fn test_objective_error_aborts() {
        let calls = Cell::new(0usize);
        let solver = NelderMeadSolver::with_defaults();
        let result = solver.minimize(
            |p: &[f64]| {
                calls.set(calls.get() + 1);
                if calls.get() == 4 {
                    Err(ProbeError::Hardware)
                } else {
                    Ok(p[0] * p[0] + p[1] * p[1])
                }
            },
            &[1.0, 1.0],
        );

        assert_eq!(result.unwrap_err(), ProbeError::Hardware);
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_empty_start_vector() {
        let solver = NelderMeadSolver::with_defaults();
        let result = solver.minimize(|_: &[f64]| Ok::<_, ProbeError>(0.0), &[]);
        assert_eq!(
            result.unwrap_err(),
            ProbeError::Solver(SolverError::EmptyParameters)
        );
    }

    #[test]
    fn test_invalid_config_rejected_before_evaluation() {
        let config = NelderMeadConfig {
            xatol: -1.0,
            ..NelderMeadConfig::default()
        };
        let calls = Cell::new(0usize);
        let result = NelderMeadSolver::new(config).minimize(
            |_: &[f64]| {
                calls.set(calls.get() + 1);
                Ok::<_, SolverError>(0.0)
            },
            &[0.0],
        );

        assert!(matches!(result, Err(SolverError::InvalidConfig(_))));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_interrupt_between_iterations() {
        let flag = Arc::new(AtomicBool::new(false));
        let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-12, 1e-12, 1000).unwrap())
            .with_interrupt(flag.clone());
        let calls = Cell::new(0usize);

        let result = solver.minimize(
            |p: &[f64]| {
                calls.set(calls.get() + 1);
                if calls.get() == 10 {
                    flag.store(true, Ordering::SeqCst);
                }
                Ok::<_, SolverError>((p[0] - 3.0).powi(2) + (p[1] + 1.0).powi(2))
            },
            &[0.0, 0.0],
        );

        match result {
            Err(SolverError::Interrupted { iterations }) => assert!(iterations > 1),
            other => panic!("Expected interruption, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_vertex_is_replaced() {
        let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-6, 1e-9, 400).unwrap());
        let result = solver
            .minimize(
                |p: &[f64]| {
                    if p[0] > 2.0 {
                        Ok::<_, SolverError>(f64::NAN)
                    } else {
                        Ok((p[0] - 1.0).powi(2))
                    }
                },
                &[0.5],
            )
            .unwrap();

        assert!(result.cost.is_finite());
        assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-4);
    }

    // ========================================
    // Property Tests
    // ========================================

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn prop_start_at_interior_minimum(
                a in -1.0..1.0_f64,
                b in -1.0..1.0_f64,
                scale in 0.1..10.0_f64,
            ) {
                let f = move |p: &[f64]| {
                    Ok::<_, SolverError>(scale * ((p[0] - a).powi(2) + (p[1] - b).powi(2)) - 70.0)
                };
                let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-4, 3.0, 50).unwrap());
                let result = solver.minimize(f, &[a, b]).unwrap();

                prop_assert!((result.params[0] - a).abs() <= 1e-4);
                prop_assert!((result.params[1] - b).abs() <= 1e-4);
                prop_assert!((result.cost + 70.0).abs() <= 3.0);
            }

            #[test]
            fn prop_quadratic_converges_from_origin(
                a in -1.0..1.0_f64,
                b in -1.0..1.0_f64,
                scale in 0.1..10.0_f64,
            ) {
                let f = move |p: &[f64]| {
                    Ok::<_, SolverError>(scale * ((p[0] - a).powi(2) + 2.0 * (p[1] - b).powi(2)) - 70.0)
                };
                let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-6, 1e-9, 1000).unwrap());
                let result = solver.minimize(f, &[0.0, 0.0]).unwrap();

                prop_assert!(result.converged);
                prop_assert!((result.params[0] - a).abs() < 1e-4);
                prop_assert!((result.params[1] - b).abs() < 1e-4);
            }
        }
    }
}
