//! Simulated IQ actuator.

use crate::bench::{lock, SharedState};
use mixcal_core::traits::IqActuator;
use mixcal_core::types::MeasurementError;

/// Actuator handle writing corrections into the bench model.
pub struct SimulatedActuator {
    state: SharedState,
    closed: bool,
}

impl SimulatedActuator {
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
            return Err(MeasurementError::closed("simulated actuator"));
        }
        Ok(())
    }
}

impl IqActuator for SimulatedActuator {
    fn set_offsets(&mut self, i: f64, q: f64) -> Result<(), MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.actuator_write("offsets")?;
        state.corrections.state.i_offset = i;
        state.corrections.state.q_offset = q;
        tracing::trace!(i, q, "sim offsets");
        Ok(())
    }

    fn set_gain_phase(
        &mut self,
        g: f64,
        phi: f64,
        base_amplitude: Option<f64>,
    ) -> Result<(), MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.actuator_write("gain/phase")?;
        state.corrections.state.gain_imbalance = g;
        state.corrections.state.phase_imbalance = phi;
        if let Some(amplitude) = base_amplitude {
            state.corrections.base_amplitude = amplitude;
        }
        tracing::trace!(g, phi, "sim gain/phase");
        Ok(())
    }

    fn set_frequency(&mut self, hz: f64) -> Result<(), MeasurementError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.actuator_write("frequency")?;
        state.corrections.base_frequency_hz = hz;
        Ok(())
    }

    fn close(&mut self) -> Result<(), MeasurementError> {
        let mut state = lock(&self.state);
        state.counters.closes += 1;
        self.closed = true;
        state.teardown("actuator close")
    }
}

#[cfg(test)]
mod tests {
    use crate::{MixerModel, SimulatedBench};
    use mixcal_core::traits::IqActuator;
    use mixcal_core::types::MeasurementError;

    #[test]
    fn test_writes_update_corrections() {
        let bench = SimulatedBench::new(MixerModel::default());
        let (mut actuator, _) = bench.instruments();

        actuator.set_frequency(1.0e6).unwrap();
        actuator.set_gain_phase(0.1, 0.05, None).unwrap();

        let corrections = bench.actuator_settings();
        assert_eq!(corrections.base_frequency_hz, 1.0e6);
        assert_eq!(corrections.state.gain_imbalance, 0.1);
        // Amplitude untouched without an explicit value
        assert_eq!(corrections.base_amplitude, crate::model::REFERENCE_AMPLITUDE);
    }

    #[test]
    fn test_closed_handle_rejects_writes() {
        let bench = SimulatedBench::new(MixerModel::default());
        let (mut actuator, _) = bench.instruments();

        actuator.close().unwrap();
        assert!(actuator.is_closed());
        assert!(matches!(
            actuator.set_offsets(0.0, 0.0),
            Err(MeasurementError::Closed(_))
        ));
        // Rejected before reaching the bench
        assert_eq!(bench.counters().actuator_writes, 0);

        let (fresh, _) = bench.instruments();
        assert!(!fresh.is_closed());
    }

    #[test]
    fn test_teardown_fault_still_closes() {
        let bench = SimulatedBench::new(MixerModel::default());
        let (mut actuator, _) = bench.instruments();
        bench.fail_teardown(true);

        assert!(actuator.close().is_err());
        assert!(actuator.is_closed());
    }
}
