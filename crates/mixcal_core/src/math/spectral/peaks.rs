//! Local-maximum peak search over amplitude traces.
//!
//! The search works on sample indices. A separation given in Hz is turned
//! into a sample distance with the trace's average spacing:
//!
//! ```text
//! spacing  = (f_last - f_first) / (n - 1)
//! distance = round(separation_hz / spacing)
//! ```
//!
//! which assumes a uniformly sampled trace.

use crate::types::{Peak, PeakSet, Trace, TraceError};

/// Default height threshold for spur peaks (dBm).
pub const DEFAULT_SPUR_THRESHOLD_DBM: f64 = -75.0;

/// Default minimum spacing between spur peaks (Hz).
pub const DEFAULT_MIN_SPACING_HZ: f64 = 0.5e6;

/// Find local maxima in `x`.
///
/// A sample is a peak when it is strictly greater than its left neighbour and
/// strictly greater than the first differing sample to its right. Flat tops
/// report their midpoint (the lower middle for an even width). The first and
/// last samples are never peaks.
///
/// # Example
///
/// ```
/// use mixcal_core::math::spectral::find_local_maxima;
///
/// let x = [0.0, 2.0, 0.0, 1.0, 1.0, 1.0, 0.0, 3.0];
/// assert_eq!(find_local_maxima(&x), vec![1, 4]);
/// ```
pub fn find_local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                let left_edge = i;
                let right_edge = i_ahead - 1;
                peaks.push((left_edge + right_edge) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Tallest-first elimination of peaks closer than `distance` samples.
///
/// Peaks are visited from highest to lowest. Each peak still standing when
/// visited removes every other peak closer than `distance` samples. Equal
/// heights are visited right to left. Returns a keep-mask aligned with
/// `peaks`.
///
/// # Arguments
///
/// * `peaks` - Sample indices in increasing order
/// * `heights` - Height of each peak, aligned with `peaks`
/// * `distance` - Minimum distance in samples; values of 0 or 1 keep everything
pub fn select_by_distance(peaks: &[usize], heights: &[f64], distance: usize) -> Vec<bool> {
    let mut keep = vec![true; peaks.len()];
    if distance <= 1 {
        return keep;
    }

    let mut priority: Vec<usize> = (0..peaks.len()).collect();
    priority.sort_by(|&a, &b| heights[a].total_cmp(&heights[b]));

    for &j in priority.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }
    keep
}

/// Threshold and minimum-separation peak extractor.
///
/// # Example
///
/// ```
/// use mixcal_core::math::spectral::PeakExtractor;
/// use mixcal_core::types::Trace;
///
/// // Two tones 0.2 MHz apart; only the taller survives a 0.5 MHz separation
/// let mut amplitudes = vec![-100.0; 101];
/// amplitudes[50] = -70.0;
/// amplitudes[52] = -60.0;
/// let trace = Trace::uniform(0.0, 10.0e6, amplitudes).unwrap();
///
/// let peaks = PeakExtractor::new(-75.0)
///     .with_min_spacing(0.5e6)
///     .extract(&trace)
///     .unwrap();
/// assert_eq!(peaks.len(), 1);
/// assert_eq!(peaks.peaks()[0].amplitude_dbm, -60.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakExtractor {
    threshold_dbm: f64,
    min_spacing_hz: f64,
}

impl Default for PeakExtractor {
    /// Threshold -75 dBm, minimum spacing 0.5 MHz.
    fn default() -> Self {
        Self {
            threshold_dbm: DEFAULT_SPUR_THRESHOLD_DBM,
            min_spacing_hz: DEFAULT_MIN_SPACING_HZ,
        }
    }
}

impl PeakExtractor {
    /// Create an extractor with a height threshold and no separation constraint.
    pub fn new(threshold_dbm: f64) -> Self {
        Self {
            threshold_dbm,
            min_spacing_hz: 0.0,
        }
    }

    /// Require retained peaks to be at least `min_spacing_hz` apart.
    ///
    /// Zero disables the constraint.
    pub fn with_min_spacing(mut self, min_spacing_hz: f64) -> Self {
        self.min_spacing_hz = min_spacing_hz;
        self
    }

    /// Height threshold (dBm). Peaks at or above it are retained.
    pub fn threshold_dbm(&self) -> f64 {
        self.threshold_dbm
    }

    /// Minimum separation (Hz); zero when unconstrained.
    pub fn min_spacing_hz(&self) -> f64 {
        self.min_spacing_hz
    }

    /// Minimum separation converted to samples of `trace`.
    ///
    /// Returns `Ok(None)` when no separation is requested.
    ///
    /// # Errors
    ///
    /// - `TraceError::InvalidSeparation` for a negative or non-finite separation
    /// - `TraceError::TooShort` for fewer than two samples
    /// - `TraceError::InvalidSpacing` unless frequencies increase across the trace
    pub fn distance_in_samples(&self, trace: &Trace) -> Result<Option<usize>, TraceError> {
        if !self.min_spacing_hz.is_finite() || self.min_spacing_hz < 0.0 {
            return Err(TraceError::InvalidSeparation(self.min_spacing_hz));
        }
        if self.min_spacing_hz == 0.0 {
            return Ok(None);
        }

        let spacing = trace.average_spacing().ok_or(TraceError::TooShort {
            got: trace.len(),
            need: 2,
        })?;
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(TraceError::InvalidSpacing { spacing });
        }

        Ok(Some((self.min_spacing_hz / spacing).round() as usize))
    }

    /// Extract the peaks of `trace` that reach the threshold and respect the
    /// minimum separation.
    ///
    /// # Errors
    ///
    /// Returns a [`TraceError`] for traces shorter than two samples or when
    /// the separation cannot be converted to samples.
    pub fn extract(&self, trace: &Trace) -> Result<PeakSet, TraceError> {
        if trace.len() < 2 {
            return Err(TraceError::TooShort {
                got: trace.len(),
                need: 2,
            });
        }
        let distance = self.distance_in_samples(trace)?;

        let amplitudes = trace.amplitudes();
        let candidates: Vec<usize> = find_local_maxima(amplitudes)
            .into_iter()
            .filter(|&i| amplitudes[i] >= self.threshold_dbm)
            .collect();

        let keep = match distance {
            Some(distance) => {
                let heights: Vec<f64> = candidates.iter().map(|&i| amplitudes[i]).collect();
                select_by_distance(&candidates, &heights, distance)
            }
            None => vec![true; candidates.len()],
        };

        let frequencies = trace.frequencies();
        let peaks = candidates
            .into_iter()
            .zip(keep)
            .filter(|&(_, kept)| kept)
            .map(|(index, _)| Peak {
                index,
                frequency_hz: frequencies[index],
                amplitude_dbm: amplitudes[index],
            })
            .collect();

        Ok(PeakSet::new(peaks))
    }

    /// Summed linear power (mW) of the extracted peaks.
    ///
    /// Exactly 0 when no peak reaches the threshold.
    pub fn spur_metric(&self, trace: &Trace) -> Result<f64, TraceError> {
        Ok(self.extract(trace)?.total_power_mw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::spectral::dbm_to_mw;
    use approx::assert_relative_eq;

    /// 101 samples across 10 MHz on a -100 dBm floor.
    fn floor_trace(tones: &[(usize, f64)]) -> Trace {
        let mut amplitudes = vec![-100.0; 101];
        for &(index, level) in tones {
            amplitudes[index] = level;
        }
        Trace::uniform(0.0, 10.0e6, amplitudes).unwrap()
    }

    // ========================================
    // Local Maxima Tests
    // ========================================

    #[test]
    fn test_endpoints_are_never_peaks() {
        assert!(find_local_maxima(&[5.0, 1.0, 5.0]).is_empty());
        assert!(find_local_maxima(&[1.0, 2.0]).is_empty());
        assert!(find_local_maxima(&[]).is_empty());
    }

    #[test]
    fn test_plateau_midpoint() {
        assert_eq!(find_local_maxima(&[0.0, 1.0, 1.0, 0.0]), vec![1]);
        assert_eq!(find_local_maxima(&[0.0, 1.0, 1.0, 1.0, 0.0]), vec![2]);
    }

    #[test]
    fn test_plateau_running_into_edge_is_not_a_peak() {
        assert!(find_local_maxima(&[0.0, 1.0, 1.0, 1.0]).is_empty());
    }

    #[test]
    fn test_shoulder_is_not_a_peak() {
        assert!(find_local_maxima(&[0.0, 1.0, 1.0, 2.0, 3.0]).is_empty());
    }

    // ========================================
    // Distance Selection Tests
    // ========================================

    #[test]
    fn test_distance_keeps_tallest() {
        let keep = select_by_distance(&[10, 12, 30], &[-70.0, -60.0, -65.0], 5);
        assert_eq!(keep, vec![false, true, true]);
    }

    #[test]
    fn test_distance_chain_is_not_transitive() {
        // 20 removes 17 and 23, so 14 and 26 survive despite being near 17/23.
        let keep = select_by_distance(&[14, 17, 20, 23, 26], &[-5.0, -4.0, -1.0, -4.0, -5.0], 4);
        assert_eq!(keep, vec![true, false, true, false, true]);
    }

    #[test]
    fn test_distance_one_keeps_all() {
        let keep = select_by_distance(&[1, 2, 3], &[1.0, 2.0, 3.0], 1);
        assert_eq!(keep, vec![true; 3]);
    }

    #[test]
    fn test_equal_heights_prefer_rightmost() {
        let keep = select_by_distance(&[10, 12], &[-60.0, -60.0], 5);
        assert_eq!(keep, vec![false, true]);
    }

    // ========================================
    // Extractor Tests
    // ========================================

    #[test]
    fn test_peaks_below_threshold_give_zero_metric() {
        // Two -80 dBm tones 5 MHz apart against a -75 dBm threshold
        let trace = floor_trace(&[(25, -80.0), (75, -80.0)]);
        let extractor = PeakExtractor::new(-75.0).with_min_spacing(0.5e6);

        assert!(extractor.extract(&trace).unwrap().is_empty());
        assert_eq!(extractor.spur_metric(&trace).unwrap(), 0.0);
    }

    #[test]
    fn test_close_peaks_collapse_to_taller() {
        let trace = floor_trace(&[(50, -70.0), (52, -60.0)]);
        let extractor = PeakExtractor::new(-75.0).with_min_spacing(0.5e6);

        let peaks = extractor.extract(&trace).unwrap();
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks.peaks()[0].index, 52);
        assert_relative_eq!(peaks.peaks()[0].frequency_hz, 5.2e6, epsilon = 1e-3);
        assert_relative_eq!(extractor.spur_metric(&trace).unwrap(), 1e-6, epsilon = 1e-15);
    }

    #[test]
    fn test_close_peaks_survive_without_spacing() {
        let trace = floor_trace(&[(50, -70.0), (52, -60.0)]);
        let metric = PeakExtractor::new(-75.0).spur_metric(&trace).unwrap();
        assert_relative_eq!(metric, dbm_to_mw(-70.0) + dbm_to_mw(-60.0), epsilon = 1e-15);
    }

    #[test]
    fn test_single_isolated_peak_metric() {
        let trace = floor_trace(&[(40, -42.5)]);
        let metric = PeakExtractor::default().spur_metric(&trace).unwrap();
        assert_relative_eq!(metric, 10.0_f64.powf(-4.25), epsilon = 1e-15);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let trace = floor_trace(&[(40, -75.0)]);
        let peaks = PeakExtractor::new(-75.0).extract(&trace).unwrap();
        assert_eq!(peaks.len(), 1);
    }

    #[test]
    fn test_distance_conversion() {
        let trace = floor_trace(&[]);
        let extractor = PeakExtractor::new(-75.0).with_min_spacing(0.5e6);
        assert_eq!(extractor.distance_in_samples(&trace).unwrap(), Some(5));
        assert_eq!(
            PeakExtractor::new(-75.0).distance_in_samples(&trace).unwrap(),
            None
        );
    }

    #[test]
    fn test_spacing_below_one_sample_has_no_effect() {
        let trace = floor_trace(&[(50, -70.0), (52, -60.0)]);
        let extractor = PeakExtractor::new(-75.0).with_min_spacing(0.01e6);
        assert_eq!(extractor.distance_in_samples(&trace).unwrap(), Some(0));
        assert_eq!(extractor.extract(&trace).unwrap().len(), 2);
    }

    #[test]
    fn test_short_trace_rejected() {
        let trace = Trace::uniform(0.0, 1.0, vec![-10.0]).unwrap();
        let err = PeakExtractor::default().extract(&trace).unwrap_err();
        assert_eq!(err, TraceError::TooShort { got: 1, need: 2 });

        let empty = Trace::uniform(0.0, 1.0, vec![]).unwrap();
        assert!(PeakExtractor::new(-75.0).spur_metric(&empty).is_err());
    }

    #[test]
    fn test_degenerate_spacing_rejected() {
        let trace = Trace::new(vec![1.0e6; 5], vec![-100.0, -50.0, -100.0, -50.0, -100.0]).unwrap();
        let err = PeakExtractor::new(-75.0)
            .with_min_spacing(0.5e6)
            .extract(&trace)
            .unwrap_err();
        assert!(matches!(err, TraceError::InvalidSpacing { .. }));

        // Without a separation the same trace is fine
        assert_eq!(PeakExtractor::new(-75.0).extract(&trace).unwrap().len(), 2);
    }

    #[test]
    fn test_negative_separation_rejected() {
        let trace = floor_trace(&[]);
        let err = PeakExtractor::new(-75.0)
            .with_min_spacing(-1.0)
            .extract(&trace)
            .unwrap_err();
        assert_eq!(err, TraceError::InvalidSeparation(-1.0));
    }

    // ========================================
    // Property Tests
    // ========================================

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(300))]

            #[test]
            fn prop_nothing_above_threshold_is_zero(
                amplitudes in prop::collection::vec(-140.0..-75.001_f64, 2..400),
                spacing in 0.0..2.0e6_f64,
            ) {
                let trace = Trace::uniform(1.9e9, 2.1e9, amplitudes).unwrap();
                let metric = PeakExtractor::new(-75.0)
                    .with_min_spacing(spacing)
                    .spur_metric(&trace)
                    .unwrap();
                prop_assert_eq!(metric, 0.0);
            }

            #[test]
            fn prop_isolated_peak_power(
                height in -74.0..20.0_f64,
                index in 1usize..100,
            ) {
                let trace = floor_trace(&[(index, height)]);
                let metric = PeakExtractor::default().spur_metric(&trace).unwrap();
                prop_assert!((metric - dbm_to_mw(height)).abs() <= 1e-12 * dbm_to_mw(height));
            }

            #[test]
            fn prop_retained_peaks_respect_spacing(
                amplitudes in prop::collection::vec(-100.0..0.0_f64, 3..300),
                separation in 0.0..3.0e6_f64,
            ) {
                let trace = Trace::uniform(0.0, 30.0e6, amplitudes).unwrap();
                let extractor = PeakExtractor::new(-60.0).with_min_spacing(separation);
                let distance = extractor.distance_in_samples(&trace).unwrap().unwrap_or(0).max(1);
                let peaks = extractor.extract(&trace).unwrap();

                for pair in peaks.peaks().windows(2) {
                    prop_assert!(pair[1].index - pair[0].index >= distance);
                }
                for peak in &peaks {
                    prop_assert!(peak.amplitude_dbm >= -60.0);
                }
            }
        }
    }
}
