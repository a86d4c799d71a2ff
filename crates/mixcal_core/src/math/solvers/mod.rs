//! Derivative-free minimisation for hardware-in-the-loop objectives.
//!
//! Every cost evaluation in a calibration run is a physical round trip
//! (write actuator, trigger, read), so the solver only asks for function
//! values. No gradients and no bounds are assumed; the actuator clamps
//! out-of-range settings itself.
//!
//! ## Available Solvers
//!
//! - [`NelderMeadSolver`]: Simplex search with reflection, expansion,
//!   contraction and shrink steps
//!
//! ## Configuration
//!
//! [`NelderMeadConfig`] carries:
//! - `xatol`: Absolute vertex tolerance (default: 1e-4)
//! - `fatol`: Absolute cost tolerance (default: 1e-4)
//! - `max_iterations`: Iteration limit (default: 200)
//!
//! Reaching `max_iterations` is not an error. The best vertex is returned
//! with `converged == false`.
//!
//! ## Examples
//!
//! ```
//! use mixcal_core::math::solvers::{NelderMeadConfig, NelderMeadSolver};
//! use mixcal_core::types::SolverError;
//!
//! let solver = NelderMeadSolver::new(NelderMeadConfig::new(1e-8, 1e-10, 500).unwrap());
//!
//! let result = solver
//!     .minimize(
//!         |p: &[f64]| Ok::<_, SolverError>((p[0] - 1.0).powi(2) + (p[1] + 2.0).powi(2)),
//!         &[0.0, 0.0],
//!     )
//!     .unwrap();
//!
//! assert!(result.converged);
//! assert!((result.params[0] - 1.0).abs() < 1e-6);
//! assert!((result.params[1] + 2.0).abs() < 1e-6);
//! ```

mod config;
mod nelder_mead;

// Re-export public types at module level
pub use config::NelderMeadConfig;
pub use nelder_mead::{NelderMeadSolver, OptimizationResult};
