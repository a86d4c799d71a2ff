//! Spectral peak extraction and power metrics.
//!
//! ## Available Tools
//!
//! - [`PeakExtractor`]: Threshold and minimum-separation peak search over a [`Trace`]
//! - [`find_local_maxima`]: Raw local-maximum search on an amplitude slice
//! - [`select_by_distance`]: Tallest-first elimination of closely spaced peaks
//! - [`dbm_to_mw`] / [`mw_to_dbm`]: Logarithmic to linear power conversion
//!
//! The summed linear power of the retained peaks is the cost minimised by
//! the global spur optimisation.
//!
//! [`Trace`]: crate::types::Trace

mod peaks;
mod units;

pub use peaks::{
    find_local_maxima, select_by_distance, PeakExtractor, DEFAULT_MIN_SPACING_HZ,
    DEFAULT_SPUR_THRESHOLD_DBM,
};
pub use units::{dbm_to_mw, mw_to_dbm};
