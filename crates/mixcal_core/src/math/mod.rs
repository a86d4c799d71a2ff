//! Numerical building blocks for the calibration loop.
//!
//! - `solvers`: Derivative-free Nelder-Mead simplex minimiser
//! - `spectral`: Local-maximum peak search and the summed-spur power metric

pub mod solvers;
pub mod spectral;
