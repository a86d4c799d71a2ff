//! Calibration session state machine.
//!
//! ```text
//! Disconnected --connect--> Connected --configure--> Configured
//!      ^                        ^                        |
//!      |                        | (run aborted)          v
//!      +------disconnect----- Reported <--(run ok)--- Running
//! ```
//!
//! A session runs in one of two modes and stays bound to it once a run has
//! completed:
//!
//! - **Two-stage**: `[signal power] [baseline sweep] (LO, image) x repetitions
//!   [final sweep]`. Each repetition starts both stages from the previous
//!   repetition's best vector.
//! - **Global spur**: `baseline sweep, 4-parameter spur minimisation, final
//!   sweep`.
//!
//! Any instrument error during a run aborts it. The session then falls back
//! to `Connected`, so the next run re-applies the measurement setup.

use crate::config::{CalibrationConfig, ConfigError};
use crate::driver::MinimizationDriver;
use crate::error::CalibrationError;
use crate::objective::{
    read_scalar, GlobalSpurObjective, ImageObjective, LoLeakageObjective, SweepSettings,
};
use crate::report::{
    CalibrationReport, RepetitionRecord, ResidualMetric, RunMode, SpectrumComparison,
};
use crate::stage::{report_progress, CalibrationStage, ProgressCallback};
use mixcal_core::traits::{IqActuator, SpectrumSource};
use mixcal_core::types::{
    ActuatorState, GainPhase, LoOffsets, MeasurementError, MeasurementMethod, Trace,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle state of a [`CalibrationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No instrument has been touched
    Disconnected,
    /// Instruments connected, measurement setup not applied
    Connected,
    /// Measurement setup applied
    Configured,
    /// A run is in progress
    Running,
    /// The last run completed and produced a report
    Reported,
}

impl SessionState {
    /// Whether the instruments are connected.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

/// Closed-loop calibration session.
///
/// Owns the actuator and the spectrum source for its whole life. Stages
/// borrow them mutably one at a time.
///
/// # Example
///
/// ```
/// use mixcal_optimiser::prelude::*;
/// use mixcal_sim::{MixerModel, SimulatedBench};
///
/// let bench = SimulatedBench::new(MixerModel::default());
/// let (actuator, analyzer) = bench.instruments();
///
/// let config = CalibrationConfig {
///     repetitions: 2,
///     ..CalibrationConfig::default()
/// };
/// let mut session = CalibrationSession::new(config, actuator, analyzer);
/// session.connect().unwrap();
///
/// let report = session.calibrate().unwrap();
/// assert_eq!(report.repetitions.len(), 2);
/// assert!(session.disconnect().is_empty());
/// ```
pub struct CalibrationSession<A, S> {
    config: CalibrationConfig,
    actuator: A,
    spectrum: S,
    state: SessionState,
    mode: Option<RunMode>,
    cancelled: Arc<AtomicBool>,
    progress: Option<ProgressCallback>,
}

impl<A: IqActuator, S: SpectrumSource> CalibrationSession<A, S> {
    /// Create a disconnected session. No instrument is touched until
    /// [`connect`](Self::connect).
    pub fn new(config: CalibrationConfig, actuator: A, spectrum: S) -> Self {
        Self {
            config,
            actuator,
            spectrum,
            state: SessionState::Disconnected,
            mode: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    /// Install a progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Mode the session is bound to, once a run has completed.
    pub fn mode(&self) -> Option<RunMode> {
        self.mode
    }

    /// Session configuration.
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Handle that cancels the active run when set.
    ///
    /// Checked between stages and between simplex iterations, never inside
    /// an evaluation. Each run clears the flag when it starts.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Actuator handle.
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Spectrum source handle.
    pub fn spectrum(&self) -> &S {
        &self.spectrum
    }

    /// Connect: set the base-band frequency and stop free-running acquisition.
    ///
    /// A no-op when already connected.
    pub fn connect(&mut self) -> Result<(), CalibrationError> {
        if self.state.is_connected() {
            return Ok(());
        }
        tracing::info!(
            "Connecting instruments (f_base = {} Hz, method = {})",
            self.config.f_base,
            self.config.method.name()
        );
        self.actuator.set_frequency(self.config.f_base)?;
        self.spectrum.stop_continuous()?;
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Validate the configuration and apply the single-point measurement
    /// setup.
    ///
    /// # Errors
    ///
    /// - `NotConnected` while disconnected, without touching any instrument
    /// - `Configuration` if the configuration is invalid, before any write
    /// - `Measurement` if the source rejects a setting
    pub fn configure(&mut self) -> Result<(), CalibrationError> {
        if !self.state.is_connected() {
            return Err(CalibrationError::not_connected("configure"));
        }
        self.config.validate()?;
        report_progress(&self.progress, CalibrationStage::Configure, 0.0);

        if let Err(err) = self.apply_measurement_setup() {
            self.state = SessionState::Connected;
            return Err(err.into());
        }
        self.state = SessionState::Configured;
        tracing::debug!("Measurement setup applied");
        Ok(())
    }

    /// Read the wanted sideband power at `f_lo + f_base` (dBm).
    pub fn measure_signal_power(&mut self) -> Result<f64, CalibrationError> {
        if !self.state.is_connected() {
            return Err(CalibrationError::not_connected("measure_signal_power"));
        }
        if self.state == SessionState::Connected {
            self.configure()?;
        }
        Ok(self.read_signal_power()?)
    }

    /// Two-stage calibration from the zero seed.
    pub fn calibrate(&mut self) -> Result<CalibrationReport, CalibrationError> {
        self.calibrate_from(ActuatorState::default())
    }

    /// Two-stage calibration; repetition 1 starts from `seed`.
    pub fn calibrate_from(
        &mut self,
        seed: ActuatorState,
    ) -> Result<CalibrationReport, CalibrationError> {
        self.begin_run(RunMode::TwoStage, "calibrate")?;
        let outcome = self.run_two_stage(seed);
        self.finish_run(RunMode::TwoStage, outcome)
    }

    /// Global four-parameter spur minimisation from `seed`.
    pub fn calibrate_spurs(
        &mut self,
        seed: ActuatorState,
    ) -> Result<CalibrationReport, CalibrationError> {
        self.begin_run(RunMode::GlobalSpur, "calibrate_spurs")?;
        let outcome = self.run_global(seed);
        self.finish_run(RunMode::GlobalSpur, outcome)
    }

    /// Best-effort teardown: resume free-running acquisition, close the
    /// source, close the actuator.
    ///
    /// Every step is attempted. Failures are logged and returned, never
    /// raised. The session always ends `Disconnected`.
    pub fn disconnect(&mut self) -> Vec<MeasurementError> {
        if !self.state.is_connected() {
            return Vec::new();
        }

        let steps: [(&str, Result<(), MeasurementError>); 3] = [
            ("resume continuous acquisition", self.spectrum.resume_continuous()),
            ("close spectrum source", self.spectrum.close()),
            ("close actuator", self.actuator.close()),
        ];

        let mut errors = Vec::new();
        for (step, result) in steps {
            if let Err(err) = result {
                tracing::warn!("Teardown step '{}' failed: {}", step, err);
                errors.push(err);
            }
        }

        self.state = SessionState::Disconnected;
        tracing::info!("Instruments disconnected ({} teardown warnings)", errors.len());
        errors
    }

    // ========================================
    // Run bookkeeping
    // ========================================

    fn begin_run(&mut self, mode: RunMode, operation: &'static str) -> Result<(), CalibrationError> {
        if !self.state.is_connected() {
            return Err(CalibrationError::not_connected(operation));
        }
        if let Some(active) = self.mode {
            if active != mode {
                return Err(CalibrationError::RunModeConflict {
                    active,
                    requested: mode,
                });
            }
        }
        if self.state == SessionState::Connected {
            self.configure()?;
        }

        self.cancelled.store(false, Ordering::SeqCst);
        self.state = SessionState::Running;
        tracing::info!("Starting {} calibration", mode);
        Ok(())
    }

    fn finish_run(
        &mut self,
        mode: RunMode,
        outcome: Result<CalibrationReport, CalibrationError>,
    ) -> Result<CalibrationReport, CalibrationError> {
        match outcome {
            Ok(report) => {
                self.state = SessionState::Reported;
                self.mode = Some(mode);
                report_progress(&self.progress, CalibrationStage::Report, 1.0);
                tracing::info!(
                    "{} calibration finished in {} ms ({} warnings)",
                    mode,
                    report.duration_ms,
                    report.warnings.len()
                );
                Ok(report)
            }
            Err(err) => {
                self.state = SessionState::Connected;
                tracing::warn!("{} calibration aborted: {}", mode, err);
                Err(err)
            }
        }
    }

    fn check_cancelled(&self, stage: CalibrationStage) -> Result<(), CalibrationError> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(CalibrationError::Cancelled { stage })
        } else {
            Ok(())
        }
    }

    fn driver(&self, global: bool) -> Result<MinimizationDriver, CalibrationError> {
        let options = if global {
            &self.config.global_optimizer
        } else {
            &self.config.optimizer
        };
        Ok(MinimizationDriver::new(options)?.with_interrupt(Arc::clone(&self.cancelled)))
    }

    // ========================================
    // Instrument steps
    // ========================================

    fn apply_measurement_setup(&mut self) -> Result<(), MeasurementError> {
        let spectrum = &mut self.spectrum;
        spectrum.enable_single_point_measurement(self.config.method)?;
        if self.config.method == MeasurementMethod::IntegratedPower {
            spectrum.set_integration_bandwidth(self.config.integration_bandwidth())?;
        }
        spectrum.set_sweep_points(self.config.measurement_points)?;
        spectrum.set_span(self.config.full_span())?;
        spectrum.set_bandwidth(self.config.measurement_bandwidth)
    }

    fn read_signal_power(&mut self) -> Result<f64, MeasurementError> {
        let freq = self.config.signal_freq();
        self.spectrum.set_center_freq(freq)?;
        if self.config.method == MeasurementMethod::Marker {
            self.spectrum.set_marker_freq(freq)?;
        }
        let power = read_scalar(&mut self.spectrum)?;
        tracing::info!("Signal power at {} Hz: {:.2} dBm", freq, power);
        Ok(power)
    }

    /// Capture a wideband sweep and its spur metric, then restore the
    /// single-point setup for the stages that follow.
    fn capture_sweep(
        &mut self,
        stage: CalibrationStage,
    ) -> Result<(Trace, f64), CalibrationError> {
        self.check_cancelled(stage)?;
        let trace = SweepSettings::from_config(&self.config).capture(&mut self.spectrum)?;
        let peaks = self.config.peak_extractor().extract(&trace)?;
        let metric = peaks.total_power_mw();
        self.apply_measurement_setup()?;
        tracing::info!(
            "{}: {} points, {} spurs, summed spur power {:.3e} mW",
            stage,
            trace.len(),
            peaks.len(),
            metric
        );
        if let Some(peak) = peaks.tallest() {
            tracing::debug!(
                "{}: tallest spur {:.2} dBm at {} Hz (trace max {:.2} dBm)",
                stage,
                peak.amplitude_dbm,
                peak.frequency_hz,
                trace.max_amplitude().unwrap_or(f64::NEG_INFINITY)
            );
        }
        Ok((trace, metric))
    }

    // ========================================
    // Run modes
    // ========================================

    fn run_two_stage(&mut self, seed: ActuatorState) -> Result<CalibrationReport, CalibrationError> {
        let started = Instant::now();
        let repetitions = self.config.repetitions;
        let total_steps = (2 * repetitions + 3) as f64;
        let mut step = 0.0;

        let signal_power_dbm = if self.config.measure_signal_power {
            self.check_cancelled(CalibrationStage::SignalPower)?;
            report_progress(&self.progress, CalibrationStage::SignalPower, step / total_steps);
            Some(self.read_signal_power()?)
        } else {
            None
        };
        step += 1.0;

        let mut spectrum = SpectrumComparison::default();
        if self.config.enable_before_after_sweep {
            report_progress(&self.progress, CalibrationStage::BaselineSweep, step / total_steps);
            let (trace, metric) = self.capture_sweep(CalibrationStage::BaselineSweep)?;
            spectrum.before = Some(trace);
            spectrum.before_metric_mw = Some(metric);
        }
        step += 1.0;

        let driver = self.driver(false)?;
        let mut offsets = seed.lo_offsets();
        let mut gain_phase = seed.gain_phase();
        let mut records = Vec::new();
        let mut warnings = Vec::new();

        for index in 1..=repetitions {
            tracing::info!("Optimisation repetition {}/{}", index, repetitions);

            self.check_cancelled(CalibrationStage::OptimizeLo)?;
            report_progress(&self.progress, CalibrationStage::OptimizeLo, step / total_steps);
            let lo = {
                let mut objective =
                    LoLeakageObjective::new(&mut self.actuator, &mut self.spectrum, &self.config)?;
                driver.run(&mut objective, &offsets.to_params(), Some(index))?
            };
            offsets = LoOffsets::from_params(&lo.result.params)?;
            self.actuator.set_offsets(offsets.i, offsets.q)?;
            step += 1.0;

            self.check_cancelled(CalibrationStage::OptimizeImage)?;
            report_progress(&self.progress, CalibrationStage::OptimizeImage, step / total_steps);
            let image = {
                let mut objective =
                    ImageObjective::new(&mut self.actuator, &mut self.spectrum, &self.config)?;
                driver.run(&mut objective, &gain_phase.to_params(), Some(index))?
            };
            gain_phase = GainPhase::from_params(&image.result.params)?;
            self.actuator
                .set_gain_phase(gain_phase.g, gain_phase.phi, None)?;
            step += 1.0;

            warnings.extend(lo.warning());
            warnings.extend(image.warning());
            records.push(RepetitionRecord { index, lo, image });
        }

        if self.config.enable_before_after_sweep {
            report_progress(&self.progress, CalibrationStage::FinalSweep, step / total_steps);
            let (trace, metric) = self.capture_sweep(CalibrationStage::FinalSweep)?;
            spectrum.after = Some(trace);
            spectrum.after_metric_mw = Some(metric);
        }

        let residual = match records.last() {
            Some(last) => ResidualMetric::StageCost {
                lo_dbm: last.lo.result.cost,
                image_dbm: last.image.result.cost,
            },
            None => ResidualMetric::StageCost {
                lo_dbm: f64::NAN,
                image_dbm: f64::NAN,
            },
        };

        tracing::info!(
            "Final offsets I = {:.5} V, Q = {:.5} V; g = {:.5}, phi = {:.5} rad",
            offsets.i,
            offsets.q,
            gain_phase.g,
            gain_phase.phi
        );

        Ok(CalibrationReport {
            mode: RunMode::TwoStage,
            lo_offsets: offsets,
            gain_phase,
            signal_power_dbm,
            repetitions: records,
            global: None,
            spectrum,
            residual,
            warnings,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn run_global(&mut self, seed: ActuatorState) -> Result<CalibrationReport, CalibrationError> {
        let started = Instant::now();
        if self.config.full_span() <= 0.0 {
            return Err(ConfigError::Validation(vec![
                "global spur mode needs a positive full span (f_base * span_scaling)".to_string(),
            ])
            .into());
        }

        report_progress(&self.progress, CalibrationStage::BaselineSweep, 0.0);
        let (before, before_metric) = self.capture_sweep(CalibrationStage::BaselineSweep)?;

        self.check_cancelled(CalibrationStage::GlobalOptimize)?;
        report_progress(&self.progress, CalibrationStage::GlobalOptimize, 0.1);
        let driver = self.driver(true)?;
        let global = {
            let mut objective =
                GlobalSpurObjective::new(&mut self.actuator, &mut self.spectrum, &self.config);
            driver.run(&mut objective, &seed.to_params(), None)?
        };
        let best = ActuatorState::from_params(&global.result.params)?;
        self.actuator.set_offsets(best.i_offset, best.q_offset)?;
        self.actuator.set_gain_phase(
            best.gain_imbalance,
            best.phase_imbalance,
            Some(self.config.base_amplitude),
        )?;

        report_progress(&self.progress, CalibrationStage::FinalSweep, 0.9);
        let (after, after_metric) = self.capture_sweep(CalibrationStage::FinalSweep)?;

        tracing::info!(
            "Global spur minimum {:.5e} mW at I = {:.4} V, Q = {:.4} V, g = {:.4}, phi = {:.4} rad",
            global.result.cost,
            best.i_offset,
            best.q_offset,
            best.gain_imbalance,
            best.phase_imbalance
        );

        Ok(CalibrationReport {
            mode: RunMode::GlobalSpur,
            lo_offsets: best.lo_offsets(),
            gain_phase: best.gain_phase(),
            signal_power_dbm: None,
            repetitions: Vec::new(),
            residual: ResidualMetric::SpurPower {
                milliwatts: global.result.cost,
            },
            warnings: global.warning().into_iter().collect(),
            global: Some(global),
            spectrum: SpectrumComparison {
                before: Some(before),
                after: Some(after),
                before_metric_mw: Some(before_metric),
                after_metric_mw: Some(after_metric),
            },
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}
