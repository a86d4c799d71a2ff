//! Shared bench state.
//!
//! A [`SimulatedBench`] owns one [`MixerModel`] and hands out an actuator and
//! an analyser handle that both see the same state. The bench itself stays
//! with the caller so tests can inspect settings, count calls and inject
//! faults while a session owns the handles.

use crate::actuator::SimulatedActuator;
use crate::analyzer::SimulatedAnalyzer;
use crate::model::{Corrections, MixerModel};
use mixcal_core::math::spectral::mw_to_dbm;
use mixcal_core::types::{MeasurementError, MeasurementMethod};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Analyser settings as last written.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    /// Centre frequency (Hz)
    pub center_hz: f64,
    /// Span (Hz)
    pub span_hz: f64,
    /// Resolution bandwidth (Hz)
    pub bandwidth_hz: f64,
    /// Points per sweep
    pub sweep_points: usize,
    /// Single-point method; `None` until enabled
    pub method: Option<MeasurementMethod>,
    /// Marker frequency; follows the centre when unset
    pub marker_hz: Option<f64>,
    /// Integration bandwidth for integrated-power readings (Hz)
    pub integration_bandwidth_hz: f64,
    /// Whether the analyser is free-running
    pub continuous: bool,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            center_hz: 0.0,
            span_hz: 0.0,
            bandwidth_hz: 1.0e3,
            sweep_points: 101,
            method: None,
            marker_hz: None,
            integration_bandwidth_hz: 1.0e3,
            continuous: true,
        }
    }
}

/// Number of facade calls seen by the bench, failed calls included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounters {
    /// Actuator setter calls
    pub actuator_writes: usize,
    /// Analyser setter and mode calls
    pub analyzer_writes: usize,
    /// Scalar acquisitions
    pub scalar_reads: usize,
    /// Trace acquisitions
    pub trace_reads: usize,
    /// `close` calls on either handle
    pub closes: usize,
}

impl CallCounters {
    /// Every counted call.
    pub fn total(&self) -> usize {
        self.actuator_writes + self.analyzer_writes + self.scalar_reads + self.trace_reads + self.closes
    }
}

/// Injected failures. A countdown of `Some(n)` lets `n` more calls succeed.
#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    scalar_reads: Option<usize>,
    trace_reads: Option<usize>,
    actuator_writes: Option<usize>,
    teardown: bool,
}

/// Consume one call from a countdown; `true` when the call must fail.
fn tick(countdown: &mut Option<usize>) -> bool {
    match countdown {
        Some(0) => true,
        Some(n) => {
            *n -= 1;
            false
        }
        None => false,
    }
}

pub(crate) struct BenchState {
    pub(crate) model: MixerModel,
    pub(crate) corrections: Corrections,
    pub(crate) analyzer: AnalyzerSettings,
    pub(crate) counters: CallCounters,
    faults: Faults,
    rng: StdRng,
}

impl BenchState {
    fn new(model: MixerModel) -> Self {
        let rng = StdRng::seed_from_u64(model.seed);
        Self {
            model,
            corrections: Corrections::default(),
            analyzer: AnalyzerSettings::default(),
            counters: CallCounters::default(),
            faults: Faults::default(),
            rng,
        }
    }

    /// Floor power (mW) with one draw of log-normal ripple.
    pub(crate) fn noisy_floor_mw(&mut self) -> f64 {
        let floor = self.model.floor_mw();
        if self.model.noise_sigma_db <= 0.0 {
            return floor;
        }
        let z: f64 = StandardNormal.sample(&mut self.rng);
        floor * 10f64.powf(z * self.model.noise_sigma_db / 10.0)
    }

    pub(crate) fn actuator_write(&mut self, what: &str) -> Result<(), MeasurementError> {
        self.counters.actuator_writes += 1;
        if tick(&mut self.faults.actuator_writes) {
            return Err(MeasurementError::communication(format!(
                "actuator rejected {}",
                what
            )));
        }
        Ok(())
    }

    pub(crate) fn scalar_read(&mut self) -> Result<(), MeasurementError> {
        self.counters.scalar_reads += 1;
        if tick(&mut self.faults.scalar_reads) {
            return Err(MeasurementError::communication("scalar read timed out"));
        }
        Ok(())
    }

    pub(crate) fn trace_read(&mut self) -> Result<(), MeasurementError> {
        self.counters.trace_reads += 1;
        if tick(&mut self.faults.trace_reads) {
            return Err(MeasurementError::communication("trace read timed out"));
        }
        Ok(())
    }

    pub(crate) fn teardown(&mut self, what: &str) -> Result<(), MeasurementError> {
        if self.faults.teardown {
            return Err(MeasurementError::communication(format!("{} failed", what)));
        }
        Ok(())
    }
}

pub(crate) type SharedState = Arc<Mutex<BenchState>>;

pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, BenchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated modulator and analyser sharing one model.
///
/// # Example
///
/// ```
/// use mixcal_core::traits::{IqActuator, SpectrumSource};
/// use mixcal_core::types::MeasurementMethod;
/// use mixcal_sim::{MixerModel, SimulatedBench};
///
/// let bench = SimulatedBench::new(MixerModel::default().noiseless());
/// let (mut actuator, mut analyzer) = bench.instruments();
///
/// actuator.set_frequency(1.0e6).unwrap();
/// analyzer.enable_single_point_measurement(MeasurementMethod::Marker).unwrap();
/// analyzer.set_bandwidth(1.0e3).unwrap();
/// analyzer.set_center_freq(2.0e9).unwrap();
///
/// let before = analyzer.trigger_and_read_scalar().unwrap();
/// actuator.set_offsets(0.01, 0.02).unwrap();
/// let after = analyzer.trigger_and_read_scalar().unwrap();
/// assert!(after < before - 40.0);
/// ```
#[derive(Clone)]
pub struct SimulatedBench {
    state: SharedState,
}

impl SimulatedBench {
    /// Create a bench around `model`. Noise is seeded from `model.seed`.
    pub fn new(model: MixerModel) -> Self {
        Self {
            state: Arc::new(Mutex::new(BenchState::new(model))),
        }
    }

    /// Fresh, open actuator and analyser handles on this bench.
    pub fn instruments(&self) -> (SimulatedActuator, SimulatedAnalyzer) {
        (
            SimulatedActuator::new(Arc::clone(&self.state)),
            SimulatedAnalyzer::new(Arc::clone(&self.state)),
        )
    }

    /// Copy of the model.
    pub fn model(&self) -> MixerModel {
        lock(&self.state).model.clone()
    }

    /// Corrections as last written to the actuator.
    pub fn actuator_settings(&self) -> Corrections {
        lock(&self.state).corrections
    }

    /// Analyser settings as last written.
    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        lock(&self.state).analyzer.clone()
    }

    /// Calls seen so far.
    pub fn counters(&self) -> CallCounters {
        lock(&self.state).counters
    }

    /// Zero the call counters.
    pub fn reset_counters(&self) {
        lock(&self.state).counters = CallCounters::default();
    }

    /// Noiseless LO leakage (dBm) at the current corrections.
    pub fn lo_leakage_dbm(&self) -> f64 {
        let state = lock(&self.state);
        let c = state.corrections.state;
        mw_to_dbm(state.model.lo_leakage_mw(c.i_offset, c.q_offset))
    }

    /// Noiseless image sideband power (dBm) at the current corrections.
    pub fn image_dbm(&self) -> f64 {
        let state = lock(&self.state);
        let c = &state.corrections;
        let irr = state
            .model
            .image_rejection_ratio(c.state.gain_imbalance, c.state.phase_imbalance);
        mw_to_dbm(state.model.signal_mw(c.base_amplitude) * irr)
    }

    /// Let `n` more scalar reads succeed, then fail every one after.
    pub fn fail_scalar_reads_after(&self, n: usize) {
        lock(&self.state).faults.scalar_reads = Some(n);
    }

    /// Let `n` more trace reads succeed, then fail every one after.
    pub fn fail_trace_reads_after(&self, n: usize) {
        lock(&self.state).faults.trace_reads = Some(n);
    }

    /// Let `n` more actuator writes succeed, then fail every one after.
    pub fn fail_actuator_writes_after(&self, n: usize) {
        lock(&self.state).faults.actuator_writes = Some(n);
    }

    /// Make `close` and `resume_continuous` fail.
    pub fn fail_teardown(&self, fail: bool) {
        lock(&self.state).faults.teardown = fail;
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        lock(&self.state).faults = Faults::default();
    }
}

impl std::fmt::Debug for SimulatedBench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("SimulatedBench")
            .field("corrections", &state.corrections)
            .field("analyzer", &state.analyzer)
            .field("counters", &state.counters)
            .finish()
    }
}
