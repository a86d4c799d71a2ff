//! Instrument facades.
//!
//! Every call is a blocking round trip to hardware (or a simulation of it).
//! Settling after a write is the implementation's responsibility: once a
//! setter returns, the next trigger must observe the new setting.
//!
//! # Example
//!
//! ```
//! use mixcal_core::traits::IqActuator;
//! use mixcal_core::types::MeasurementError;
//!
//! /// Actuator that remembers the last offsets written
//! #[derive(Default)]
//! struct Latch {
//!     offsets: (f64, f64),
//! }
//!
//! impl IqActuator for Latch {
//!     fn set_offsets(&mut self, i: f64, q: f64) -> Result<(), MeasurementError> {
//!         self.offsets = (i, q);
//!         Ok(())
//!     }
//!     fn set_gain_phase(&mut self, _g: f64, _phi: f64, _amp: Option<f64>) -> Result<(), MeasurementError> {
//!         Ok(())
//!     }
//!     fn set_frequency(&mut self, _hz: f64) -> Result<(), MeasurementError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut latch = Latch::default();
//! latch.set_offsets(0.01, -0.02).unwrap();
//! assert_eq!(latch.offsets, (0.01, -0.02));
//! assert!(latch.close().is_ok());
//! ```

use crate::types::{MeasurementError, MeasurementMethod, Trace};

/// Tunable IQ actuator.
///
/// Offsets are in volts, phase in radians. `base_amplitude` is the drive
/// amplitude some actuators need alongside a gain/phase write; `None` keeps
/// whatever the actuator already uses.
pub trait IqActuator {
    /// Write the I and Q DC offsets.
    fn set_offsets(&mut self, i: f64, q: f64) -> Result<(), MeasurementError>;

    /// Write the gain and phase imbalance corrections.
    fn set_gain_phase(
        &mut self,
        g: f64,
        phi: f64,
        base_amplitude: Option<f64>,
    ) -> Result<(), MeasurementError>;

    /// Set the base-band tone frequency (Hz).
    fn set_frequency(&mut self, hz: f64) -> Result<(), MeasurementError>;

    /// Release the actuator. Further writes may fail with
    /// [`MeasurementError::Closed`].
    fn close(&mut self) -> Result<(), MeasurementError> {
        Ok(())
    }
}

/// Spectrum and marker source.
///
/// A source is either in single-point mode (see
/// [`enable_single_point_measurement`](Self::enable_single_point_measurement)),
/// where [`trigger_and_read_scalar`](Self::trigger_and_read_scalar) returns one
/// amplitude at the centre frequency, or sweeping, where
/// [`trigger_and_read_trace`](Self::trigger_and_read_trace) returns the full
/// trace. Both reads trigger a fresh acquisition.
pub trait SpectrumSource {
    /// Set the centre frequency (Hz).
    fn set_center_freq(&mut self, hz: f64) -> Result<(), MeasurementError>;

    /// Set the frequency span (Hz).
    fn set_span(&mut self, hz: f64) -> Result<(), MeasurementError>;

    /// Set the resolution bandwidth (Hz).
    fn set_bandwidth(&mut self, hz: f64) -> Result<(), MeasurementError>;

    /// Set the number of points per sweep.
    fn set_sweep_points(&mut self, n: usize) -> Result<(), MeasurementError>;

    /// Switch to single-point readings with the given method.
    fn enable_single_point_measurement(
        &mut self,
        method: MeasurementMethod,
    ) -> Result<(), MeasurementError>;

    /// Trigger one acquisition and read a single amplitude (dBm).
    fn trigger_and_read_scalar(&mut self) -> Result<f64, MeasurementError>;

    /// Trigger one sweep and read the whole trace.
    fn trigger_and_read_trace(&mut self) -> Result<Trace, MeasurementError>;

    /// Stop free-running acquisition so that every read is triggered.
    fn stop_continuous(&mut self) -> Result<(), MeasurementError>;

    /// Return the instrument to free-running acquisition.
    fn resume_continuous(&mut self) -> Result<(), MeasurementError>;

    /// Move the marker to `hz`. Sources without a separate marker ignore it.
    fn set_marker_freq(&mut self, _hz: f64) -> Result<(), MeasurementError> {
        Ok(())
    }

    /// Set the integration bandwidth used by
    /// [`MeasurementMethod::IntegratedPower`].
    fn set_integration_bandwidth(&mut self, _hz: f64) -> Result<(), MeasurementError> {
        Ok(())
    }

    /// Release the instrument.
    fn close(&mut self) -> Result<(), MeasurementError> {
        Ok(())
    }
}

impl<T: IqActuator + ?Sized> IqActuator for &mut T {
    fn set_offsets(&mut self, i: f64, q: f64) -> Result<(), MeasurementError> {
        (**self).set_offsets(i, q)
    }

    fn set_gain_phase(
        &mut self,
        g: f64,
        phi: f64,
        base_amplitude: Option<f64>,
    ) -> Result<(), MeasurementError> {
        (**self).set_gain_phase(g, phi, base_amplitude)
    }

    fn set_frequency(&mut self, hz: f64) -> Result<(), MeasurementError> {
        (**self).set_frequency(hz)
    }

    fn close(&mut self) -> Result<(), MeasurementError> {
        (**self).close()
    }
}

impl<T: SpectrumSource + ?Sized> SpectrumSource for &mut T {
    fn set_center_freq(&mut self, hz: f64) -> Result<(), MeasurementError> {
        (**self).set_center_freq(hz)
    }

    fn set_span(&mut self, hz: f64) -> Result<(), MeasurementError> {
        (**self).set_span(hz)
    }

    fn set_bandwidth(&mut self, hz: f64) -> Result<(), MeasurementError> {
        (**self).set_bandwidth(hz)
    }

    fn set_sweep_points(&mut self, n: usize) -> Result<(), MeasurementError> {
        (**self).set_sweep_points(n)
    }

    fn enable_single_point_measurement(
        &mut self,
        method: MeasurementMethod,
    ) -> Result<(), MeasurementError> {
        (**self).enable_single_point_measurement(method)
    }

    fn trigger_and_read_scalar(&mut self) -> Result<f64, MeasurementError> {
        (**self).trigger_and_read_scalar()
    }

    fn trigger_and_read_trace(&mut self) -> Result<Trace, MeasurementError> {
        (**self).trigger_and_read_trace()
    }

    fn stop_continuous(&mut self) -> Result<(), MeasurementError> {
        (**self).stop_continuous()
    }

    fn resume_continuous(&mut self) -> Result<(), MeasurementError> {
        (**self).resume_continuous()
    }

    fn set_marker_freq(&mut self, hz: f64) -> Result<(), MeasurementError> {
        (**self).set_marker_freq(hz)
    }

    fn set_integration_bandwidth(&mut self, hz: f64) -> Result<(), MeasurementError> {
        (**self).set_integration_bandwidth(hz)
    }

    fn close(&mut self) -> Result<(), MeasurementError> {
        (**self).close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every call by name.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl SpectrumSource for Recorder {
        fn set_center_freq(&mut self, _hz: f64) -> Result<(), MeasurementError> {
            self.calls.push("center");
            Ok(())
        }
        fn set_span(&mut self, _hz: f64) -> Result<(), MeasurementError> {
            self.calls.push("span");
            Ok(())
        }
        fn set_bandwidth(&mut self, _hz: f64) -> Result<(), MeasurementError> {
            self.calls.push("bandwidth");
            Ok(())
        }
        fn set_sweep_points(&mut self, _n: usize) -> Result<(), MeasurementError> {
            self.calls.push("points");
            Ok(())
        }
        fn enable_single_point_measurement(
            &mut self,
            _method: MeasurementMethod,
        ) -> Result<(), MeasurementError> {
            self.calls.push("single");
            Ok(())
        }
        fn trigger_and_read_scalar(&mut self) -> Result<f64, MeasurementError> {
            self.calls.push("scalar");
            Ok(-80.0)
        }
        fn trigger_and_read_trace(&mut self) -> Result<Trace, MeasurementError> {
            self.calls.push("trace");
            Err(MeasurementError::communication("no sweep"))
        }
        fn stop_continuous(&mut self) -> Result<(), MeasurementError> {
            self.calls.push("stop");
            Ok(())
        }
        fn resume_continuous(&mut self) -> Result<(), MeasurementError> {
            self.calls.push("resume");
            Ok(())
        }
    }

    #[test]
    fn test_default_methods_are_no_ops() {
        let mut source = Recorder::default();
        assert!(source.set_marker_freq(2.0e9).is_ok());
        assert!(source.set_integration_bandwidth(1.0e6).is_ok());
        assert!(source.close().is_ok());
        assert!(source.calls.is_empty());
    }

    #[test]
    fn test_mutable_reference_forwards() {
        fn acquire<S: SpectrumSource>(mut source: S) -> Result<f64, MeasurementError> {
            source.stop_continuous()?;
            assert!(source.trigger_and_read_trace().is_err());
            source.trigger_and_read_scalar()
        }

        let mut source = Recorder::default();
        assert_eq!(acquire(&mut source).unwrap(), -80.0);
        assert_eq!(source.calls, vec!["stop", "trace", "scalar"]);
    }
}
