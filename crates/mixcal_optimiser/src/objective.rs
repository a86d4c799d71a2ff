//! Objective functions driven by the simplex solver.
//!
//! Each objective borrows the actuator and the spectrum source for one stage
//! and maps a parameter vector to a cost in three steps: write the
//! parameters, trigger a measurement, reduce the measurement to a scalar.
//!
//! ## Available Objectives
//!
//! - [`LoLeakageObjective`]: `[i_offset, q_offset]` to the reading at `f_lo` (dBm)
//! - [`ImageObjective`]: `[g, phi]` to the reading at `f_lo - f_base` (dBm)
//! - [`GlobalSpurObjective`]: `[i_offset, q_offset, g, phi]` to the summed spur
//!   power of a wideband sweep (mW)
//!
//! Every evaluation changes hardware state. Nothing is memoised: evaluating
//! the same vector twice measures twice.

use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use crate::stage::CalibrationStage;
use mixcal_core::math::spectral::PeakExtractor;
use mixcal_core::traits::{IqActuator, SpectrumSource};
use mixcal_core::types::{
    ActuatorState, GainPhase, LoOffsets, MeasurementError, MeasurementMethod, Trace,
};

/// Scalar cost function over a fixed-length parameter vector.
pub trait Objective {
    /// Stage this objective belongs to.
    fn stage(&self) -> CalibrationStage;

    /// Number of parameters accepted by [`evaluate`](Self::evaluate).
    fn dimension(&self) -> usize;

    /// Apply `params` to the hardware and measure the cost.
    ///
    /// A vector of the wrong length is rejected before anything is written.
    fn evaluate(&mut self, params: &[f64]) -> Result<f64, CalibrationError>;

    /// Number of completed evaluations.
    fn evaluations(&self) -> usize;
}

/// Wideband sweep settings shared by the spur objective and the
/// before/after sweeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSettings {
    /// Resolution bandwidth (Hz)
    pub bandwidth: f64,
    /// Points per sweep
    pub points: usize,
    /// Centre frequency (Hz)
    pub center: f64,
    /// Span (Hz)
    pub span: f64,
}

impl SweepSettings {
    /// Sweep centred on the LO across the full span.
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self {
            bandwidth: config.sweep_bandwidth,
            points: config.sweep_points,
            center: config.f_lo,
            span: config.full_span(),
        }
    }

    /// Apply the settings and read one triggered sweep.
    pub fn capture<S: SpectrumSource>(&self, spectrum: &mut S) -> Result<Trace, MeasurementError> {
        spectrum.set_bandwidth(self.bandwidth)?;
        spectrum.set_sweep_points(self.points)?;
        spectrum.set_center_freq(self.center)?;
        spectrum.set_span(self.span)?;
        spectrum.trigger_and_read_trace()
    }
}

/// Centre the source (and the marker in marker mode) on `hz`.
fn focus<S: SpectrumSource>(
    spectrum: &mut S,
    hz: f64,
    method: MeasurementMethod,
) -> Result<(), MeasurementError> {
    spectrum.set_center_freq(hz)?;
    if method == MeasurementMethod::Marker {
        spectrum.set_marker_freq(hz)?;
    }
    Ok(())
}

/// Trigger a single-point reading and reject non-finite values.
pub(crate) fn read_scalar<S: SpectrumSource>(spectrum: &mut S) -> Result<f64, MeasurementError> {
    let value = spectrum.trigger_and_read_scalar()?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MeasurementError::malformed(format!(
            "non-finite amplitude reading {}",
            value
        )))
    }
}

/// LO leakage at `f_lo` as a function of the I/Q DC offsets.
pub struct LoLeakageObjective<'a, A, S> {
    actuator: &'a mut A,
    spectrum: &'a mut S,
    frequency: f64,
    evaluations: usize,
}

impl<'a, A: IqActuator, S: SpectrumSource> LoLeakageObjective<'a, A, S> {
    /// Borrow the instruments and tune the source to `f_lo`.
    ///
    /// Tuning happens once here, not per evaluation.
    pub fn new(
        actuator: &'a mut A,
        spectrum: &'a mut S,
        config: &CalibrationConfig,
    ) -> Result<Self, CalibrationError> {
        focus(spectrum, config.f_lo, config.method)?;
        Ok(Self {
            actuator,
            spectrum,
            frequency: config.f_lo,
            evaluations: 0,
        })
    }

    /// Frequency the source is tuned to (Hz).
    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

impl<A: IqActuator, S: SpectrumSource> Objective for LoLeakageObjective<'_, A, S> {
    fn stage(&self) -> CalibrationStage {
        CalibrationStage::OptimizeLo
    }

    fn dimension(&self) -> usize {
        2
    }

    fn evaluate(&mut self, params: &[f64]) -> Result<f64, CalibrationError> {
        let offsets = LoOffsets::from_params(params)?;
        self.actuator.set_offsets(offsets.i, offsets.q)?;
        let cost = read_scalar(self.spectrum)?;
        self.evaluations += 1;
        Ok(cost)
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }
}

/// Image sideband at `f_lo - f_base` as a function of gain/phase imbalance.
pub struct ImageObjective<'a, A, S> {
    actuator: &'a mut A,
    spectrum: &'a mut S,
    frequency: f64,
    evaluations: usize,
}

impl<'a, A: IqActuator, S: SpectrumSource> ImageObjective<'a, A, S> {
    /// Borrow the instruments and tune the source to the image frequency.
    pub fn new(
        actuator: &'a mut A,
        spectrum: &'a mut S,
        config: &CalibrationConfig,
    ) -> Result<Self, CalibrationError> {
        let frequency = config.image_freq();
        focus(spectrum, frequency, config.method)?;
        Ok(Self {
            actuator,
            spectrum,
            frequency,
            evaluations: 0,
        })
    }

    /// Frequency the source is tuned to (Hz).
    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

impl<A: IqActuator, S: SpectrumSource> Objective for ImageObjective<'_, A, S> {
    fn stage(&self) -> CalibrationStage {
        CalibrationStage::OptimizeImage
    }

    fn dimension(&self) -> usize {
        2
    }

    fn evaluate(&mut self, params: &[f64]) -> Result<f64, CalibrationError> {
        let gp = GainPhase::from_params(params)?;
        self.actuator.set_gain_phase(gp.g, gp.phi, None)?;
        let cost = read_scalar(self.spectrum)?;
        self.evaluations += 1;
        Ok(cost)
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }
}

/// Summed spur power across a wideband sweep as a function of all four
/// actuator settings.
pub struct GlobalSpurObjective<'a, A, S> {
    actuator: &'a mut A,
    spectrum: &'a mut S,
    sweep: SweepSettings,
    extractor: PeakExtractor,
    base_amplitude: f64,
    evaluations: usize,
}

impl<'a, A: IqActuator, S: SpectrumSource> GlobalSpurObjective<'a, A, S> {
    /// Borrow the instruments. Sweep settings are re-applied on every
    /// evaluation.
    pub fn new(actuator: &'a mut A, spectrum: &'a mut S, config: &CalibrationConfig) -> Self {
        Self {
            actuator,
            spectrum,
            sweep: SweepSettings::from_config(config),
            extractor: config.peak_extractor(),
            base_amplitude: config.base_amplitude,
            evaluations: 0,
        }
    }

    /// Sweep applied per evaluation.
    pub fn sweep(&self) -> &SweepSettings {
        &self.sweep
    }
}

impl<A: IqActuator, S: SpectrumSource> Objective for GlobalSpurObjective<'_, A, S> {
    fn stage(&self) -> CalibrationStage {
        CalibrationStage::GlobalOptimize
    }

    fn dimension(&self) -> usize {
        4
    }

    fn evaluate(&mut self, params: &[f64]) -> Result<f64, CalibrationError> {
        let state = ActuatorState::from_params(params)?;
        self.actuator.set_offsets(state.i_offset, state.q_offset)?;
        self.actuator.set_gain_phase(
            state.gain_imbalance,
            state.phase_imbalance,
            Some(self.base_amplitude),
        )?;
        let trace = self.sweep.capture(self.spectrum)?;
        let cost = self.extractor.spur_metric(&trace)?;
        self.evaluations += 1;
        Ok(cost)
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }
}
