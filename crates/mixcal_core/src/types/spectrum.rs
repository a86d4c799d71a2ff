//! Spectrum measurement types.
//!
//! A spectrum source produces either a single amplitude reading or a full
//! frequency/amplitude [`Trace`]. Peaks extracted from a trace are collected
//! in a [`PeakSet`]. None of these are cached: each objective evaluation
//! captures a fresh measurement and drops it afterwards.

use super::error::TraceError;
use crate::math::spectral::dbm_to_mw;

/// How a single-point amplitude is read from the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MeasurementMethod {
    /// Channel power integrated over a bandwidth around the centre frequency
    IntegratedPower,
    /// Marker placed on the centre frequency
    #[default]
    Marker,
}

impl MeasurementMethod {
    /// Configuration name of the method.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IntegratedPower => "integrated_power",
            Self::Marker => "marker",
        }
    }

    /// Parse a configuration name; `None` for unknown names.
    ///
    /// # Example
    ///
    /// ```
    /// use mixcal_core::types::MeasurementMethod;
    ///
    /// assert_eq!(MeasurementMethod::from_name("marker"), Some(MeasurementMethod::Marker));
    /// assert_eq!(MeasurementMethod::from_name("bogus"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "integrated_power" => Some(Self::IntegratedPower),
            "marker" => Some(Self::Marker),
            _ => None,
        }
    }
}

/// Frequency-ordered amplitude trace.
///
/// Frequencies are in Hz, amplitudes in dBm. The two vectors always have the
/// same length.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trace {
    frequencies_hz: Vec<f64>,
    amplitudes_dbm: Vec<f64>,
}

impl Trace {
    /// Create a trace from matching frequency and amplitude vectors.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::LengthMismatch` if the vectors differ in length.
    pub fn new(frequencies_hz: Vec<f64>, amplitudes_dbm: Vec<f64>) -> Result<Self, TraceError> {
        if frequencies_hz.len() != amplitudes_dbm.len() {
            return Err(TraceError::LengthMismatch {
                frequencies: frequencies_hz.len(),
                amplitudes: amplitudes_dbm.len(),
            });
        }
        Ok(Self {
            frequencies_hz,
            amplitudes_dbm,
        })
    }

    /// Create a uniformly sampled trace spanning `[start_hz, stop_hz]`.
    ///
    /// Sample frequencies are spaced like a linear grid with both endpoints
    /// included. A single amplitude sits at `start_hz`.
    ///
    /// # Example
    ///
    /// ```
    /// use mixcal_core::types::Trace;
    ///
    /// let trace = Trace::uniform(0.0, 10.0e6, vec![-90.0; 101]).unwrap();
    /// assert_eq!(trace.len(), 101);
    /// assert!((trace.average_spacing().unwrap() - 0.1e6).abs() < 1e-6);
    /// ```
    pub fn uniform(start_hz: f64, stop_hz: f64, amplitudes_dbm: Vec<f64>) -> Result<Self, TraceError> {
        let n = amplitudes_dbm.len();
        let frequencies_hz = match n {
            0 => Vec::new(),
            1 => vec![start_hz],
            _ => {
                let step = (stop_hz - start_hz) / (n - 1) as f64;
                (0..n).map(|k| start_hz + step * k as f64).collect()
            }
        };
        Self::new(frequencies_hz, amplitudes_dbm)
    }

    /// Sample frequencies (Hz).
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies_hz
    }

    /// Sample amplitudes (dBm).
    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes_dbm
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.amplitudes_dbm.len()
    }

    /// Whether the trace holds no samples.
    pub fn is_empty(&self) -> bool {
        self.amplitudes_dbm.is_empty()
    }

    /// Average sample spacing `(f_last - f_first) / (n - 1)`.
    ///
    /// Returns `None` for traces with fewer than two samples.
    pub fn average_spacing(&self) -> Option<f64> {
        let n = self.frequencies_hz.len();
        if n < 2 {
            return None;
        }
        Some((self.frequencies_hz[n - 1] - self.frequencies_hz[0]) / (n - 1) as f64)
    }

    /// Iterate over `(frequency_hz, amplitude_dbm)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies_hz
            .iter()
            .copied()
            .zip(self.amplitudes_dbm.iter().copied())
    }

    /// Largest amplitude in the trace, ignoring NaN samples.
    pub fn max_amplitude(&self) -> Option<f64> {
        self.amplitudes_dbm
            .iter()
            .copied()
            .filter(|a| !a.is_nan())
            .reduce(f64::max)
    }
}

/// Result of one trigger on the spectrum source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Measurement {
    /// Single amplitude reading (dBm) in marker or integrated-power mode
    Scalar(f64),
    /// Full swept trace
    Trace(Trace),
}

/// A local maximum retained by the peak extractor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Peak {
    /// Sample index within the source trace
    pub index: usize,
    /// Peak frequency (Hz)
    pub frequency_hz: f64,
    /// Peak amplitude (dBm)
    pub amplitude_dbm: f64,
}

impl Peak {
    /// Linear power of the peak in milliwatts.
    pub fn power_mw(&self) -> f64 {
        dbm_to_mw(self.amplitude_dbm)
    }
}

/// Frequency-ordered set of peaks extracted from one trace.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakSet {
    peaks: Vec<Peak>,
}

impl PeakSet {
    /// Wrap peaks already ordered by sample index.
    pub fn new(peaks: Vec<Peak>) -> Self {
        Self { peaks }
    }

    /// Retained peaks in frequency order.
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Number of peaks.
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    /// Whether no peak passed the filters.
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Iterate over the peaks.
    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    /// Tallest peak, if any.
    pub fn tallest(&self) -> Option<&Peak> {
        self.peaks
            .iter()
            .max_by(|a, b| a.amplitude_dbm.total_cmp(&b.amplitude_dbm))
    }

    /// Summed linear power of all peaks (mW). Exactly 0 for an empty set.
    pub fn total_power_mw(&self) -> f64 {
        self.peaks.iter().map(Peak::power_mw).sum()
    }
}

impl<'a> IntoIterator for &'a PeakSet {
    type Item = &'a Peak;
    type IntoIter = std::slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_trace_length_mismatch() {
        let err = Trace::new(vec![1.0, 2.0], vec![-90.0]).unwrap_err();
        assert_eq!(
            err,
            TraceError::LengthMismatch {
                frequencies: 2,
                amplitudes: 1
            }
        );
    }

    #[test]
    fn test_uniform_trace_endpoints() {
        let trace = Trace::uniform(1.0e9, 1.01e9, vec![-90.0; 11]).unwrap();
        assert_relative_eq!(trace.frequencies()[0], 1.0e9);
        assert_relative_eq!(trace.frequencies()[10], 1.01e9, epsilon = 1e-3);
        assert_relative_eq!(trace.average_spacing().unwrap(), 1.0e6, epsilon = 1e-6);
    }

    #[test]
    fn test_single_sample_has_no_spacing() {
        let trace = Trace::uniform(5.0, 10.0, vec![-50.0]).unwrap();
        assert_eq!(trace.frequencies(), &[5.0]);
        assert!(trace.average_spacing().is_none());
    }

    #[test]
    fn test_max_amplitude_skips_nan() {
        let trace = Trace::uniform(0.0, 2.0, vec![-80.0, f64::NAN, -70.0]).unwrap();
        assert_eq!(trace.max_amplitude(), Some(-70.0));
    }

    #[test]
    fn test_empty_peak_set_power_is_zero() {
        let set = PeakSet::default();
        assert!(set.is_empty());
        assert_eq!(set.total_power_mw(), 0.0);
        assert!(set.tallest().is_none());
    }

    #[test]
    fn test_peak_set_power_sum() {
        let set = PeakSet::new(vec![
            Peak {
                index: 3,
                frequency_hz: 3.0,
                amplitude_dbm: 0.0,
            },
            Peak {
                index: 7,
                frequency_hz: 7.0,
                amplitude_dbm: 10.0,
            },
        ]);
        assert_relative_eq!(set.total_power_mw(), 11.0, epsilon = 1e-12);
        assert_eq!(set.tallest().map(|p| p.index), Some(7));
    }

    #[test]
    fn test_method_names_round_trip() {
        for method in [MeasurementMethod::IntegratedPower, MeasurementMethod::Marker] {
            assert_eq!(MeasurementMethod::from_name(method.name()), Some(method));
        }
        assert_eq!(MeasurementMethod::default(), MeasurementMethod::Marker);
    }
}
