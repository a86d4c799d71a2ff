//! Simulated spectrum analyser.
//!
//! Scalar readings use a brick-wall window: every tone within half the
//! window of the measurement frequency counts in full. Marker readings use
//! the resolution bandwidth around the marker, integrated-power readings
//! the integration bandwidth around the centre. Sweeps pass each tone
//! through a Gaussian filter whose full width at half maximum is the
//! resolution bandwidth. Noise only ripples the floor.

use crate::bench::{lock, AnalyzerSettings, SharedState};
use mixcal_core::math::spectral::mw_to_dbm;
use mixcal_core::traits::SpectrumSource;
use mixcal_core::types::{MeasurementError, MeasurementMethod, Trace};

/// Analyser handle reading the bench model.
pub struct SimulatedAnalyzer {
    state: SharedState,
    closed: bool,
}

impl SimulatedAnalyzer {
    pub(crate) fn new(state: SharedState) -> Self {
        Self {
            state,
            closed: false,
        }
    }

    /// Whether `close` has been called on this handle.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), MeasurementError> {
        if self.closed {
            return Err(MeasurementError::closed("simulated analyzer"));
        }
        Ok(())
    }

    fn write(
        &mut self,
        what: &str,
        hz: f64,
        apply: impl FnOnce(&mut AnalyzerSettings, f64),
    ) -> Result<(), MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.counters.analyzer_writes += 1;
        if !hz.is_finite() {
            return Err(MeasurementError::communication(format!(
                "{} rejected: {}",
                what, hz
            )));
        }
        apply(&mut state.analyzer, hz);
        Ok(())
    }

    fn write_positive(
        &mut self,
        what: &str,
        hz: f64,
        apply: impl FnOnce(&mut AnalyzerSettings, f64),
    ) -> Result<(), MeasurementError> {
        if hz <= 0.0 {
            self.ensure_open()?;
            lock(&self.state).counters.analyzer_writes += 1;
            return Err(MeasurementError::communication(format!(
                "{} must be positive, got {}",
                what, hz
            )));
        }
        self.write(what, hz, apply)
    }
}

impl SpectrumSource for SimulatedAnalyzer {
    fn set_center_freq(&mut self, hz: f64) -> Result<(), MeasurementError> {
        self.write("center frequency", hz, |s, v| s.center_hz = v)
    }

    fn set_span(&mut self, hz: f64) -> Result<(), MeasurementError> {
        self.write("span", hz, |s, v| s.span_hz = v.abs())
    }

    fn set_bandwidth(&mut self, hz: f64) -> Result<(), MeasurementError> {
        self.write_positive("resolution bandwidth", hz, |s, v| s.bandwidth_hz = v)
    }

    fn set_sweep_points(&mut self, n: usize) -> Result<(), MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.counters.analyzer_writes += 1;
        state.analyzer.sweep_points = n;
        Ok(())
    }

    fn enable_single_point_measurement(
        &mut self,
        method: MeasurementMethod,
    ) -> Result<(), MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.counters.analyzer_writes += 1;
        state.analyzer.method = Some(method);
        tracing::debug!(method = method.name(), "sim single-point mode");
        Ok(())
    }

    fn trigger_and_read_scalar(&mut self) -> Result<f64, MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.scalar_read()?;

        let (center, width) = match state.analyzer.method {
            Some(MeasurementMethod::Marker) => (
                state.analyzer.marker_hz.unwrap_or(state.analyzer.center_hz),
                state.analyzer.bandwidth_hz,
            ),
            Some(MeasurementMethod::IntegratedPower) => (
                state.analyzer.center_hz,
                state.analyzer.integration_bandwidth_hz,
            ),
            None => {
                return Err(MeasurementError::communication(
                    "single-point measurement not enabled",
                ))
            }
        };

        let tones_mw = state
            .model
            .band_tone_mw(&state.corrections, center, width);
        let floor_mw = state.noisy_floor_mw();
        Ok(mw_to_dbm(floor_mw + tones_mw))
    }

    fn trigger_and_read_trace(&mut self) -> Result<Trace, MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.trace_read()?;

        let settings = state.analyzer.clone();
        let tones = state.model.tones(&state.corrections);
        let start = settings.center_hz - settings.span_hz / 2.0;
        let stop = settings.center_hz + settings.span_hz / 2.0;
        let n = settings.sweep_points;
        let step = if n > 1 {
            (stop - start) / (n - 1) as f64
        } else {
            0.0
        };

        let amplitudes = (0..n)
            .map(|k| {
                let f = start + step * k as f64;
                let tone_mw = state.model.swept_tone_mw(&tones, f, settings.bandwidth_hz);
                mw_to_dbm(state.noisy_floor_mw() + tone_mw)
            })
            .collect();

        tracing::debug!(points = n, start, stop, "sim sweep");
        Trace::uniform(start, stop, amplitudes)
            .map_err(|err| MeasurementError::malformed(err.to_string()))
    }

    fn stop_continuous(&mut self) -> Result<(), MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.counters.analyzer_writes += 1;
        state.analyzer.continuous = false;
        Ok(())
    }

    fn resume_continuous(&mut self) -> Result<(), MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.counters.analyzer_writes += 1;
        state.teardown("resume continuous")?;
        state.analyzer.continuous = true;
        Ok(())
    }

    fn set_marker_freq(&mut self, hz: f64) -> Result<(), MeasurementError> {
        self.write("marker frequency", hz, |s, v| s.marker_hz = Some(v))
    }

    fn set_integration_bandwidth(&mut self, hz: f64) -> Result<(), MeasurementError> {
        self.write_positive("integration bandwidth", hz, |s, v| {
            s.integration_bandwidth_hz = v
        })
    }

    fn close(&mut self) -> Result<(), MeasurementError> {
        let mut state = lock(&self.state);
        state.counters.closes += 1;
        self.closed = true;
        state.teardown("analyzer close")
    }
}
