//! Power unit conversions.

/// Convert a power level in dBm to milliwatts: `10^(dBm / 10)`.
///
/// # Example
///
/// ```
/// use mixcal_core::math::spectral::dbm_to_mw;
///
/// assert!((dbm_to_mw(-60.0) - 1e-6).abs() < 1e-18);
/// assert_eq!(dbm_to_mw(f64::NEG_INFINITY), 0.0);
/// ```
#[inline]
pub fn dbm_to_mw(dbm: f64) -> f64 {
    10.0_f64.powf(dbm / 10.0)
}

/// Convert milliwatts to dBm: `10 log10(mW)`.
///
/// Zero power maps to negative infinity.
#[inline]
pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}
