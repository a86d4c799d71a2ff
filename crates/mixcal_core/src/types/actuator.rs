//! Actuator settings of the IQ modulator.
//!
//! The calibration loop moves two pairs of knobs:
//! - [`LoOffsets`]: DC offsets on the I and Q paths (volts), which null LO leakage
//! - [`GainPhase`]: gain and phase imbalance (unitless, radians), which null the image
//!
//! [`ActuatorState`] holds both pairs. Every type converts to and from the flat
//! parameter slices the simplex solver works on.

use super::error::SolverError;

/// DC offsets applied to the I and Q paths, in volts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoOffsets {
    /// I-path DC offset (V)
    pub i: f64,
    /// Q-path DC offset (V)
    pub q: f64,
}

impl LoOffsets {
    /// Create an offset pair.
    pub fn new(i: f64, q: f64) -> Self {
        Self { i, q }
    }

    /// Parameter-vector form `[i, q]`.
    pub fn to_params(self) -> [f64; 2] {
        [self.i, self.q]
    }

    /// Read an offset pair from a two-element parameter slice.
    ///
    /// # Errors
    ///
    /// Returns `SolverError::DimensionMismatch` unless `params.len() == 2`.
    ///
    /// # Example
    ///
    /// ```
    /// use mixcal_core::types::LoOffsets;
    ///
    /// let offsets = LoOffsets::from_params(&[0.01, -0.02]).unwrap();
    /// assert_eq!(offsets, LoOffsets::new(0.01, -0.02));
    /// assert!(LoOffsets::from_params(&[0.0]).is_err());
    /// ```
    pub fn from_params(params: &[f64]) -> Result<Self, SolverError> {
        match params {
            [i, q] => Ok(Self::new(*i, *q)),
            _ => Err(SolverError::DimensionMismatch {
                expected: 2,
                got: params.len(),
            }),
        }
    }
}

/// Gain and phase imbalance between the I and Q paths.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GainPhase {
    /// Gain imbalance (unitless)
    pub g: f64,
    /// Phase imbalance (radians)
    pub phi: f64,
}

impl GainPhase {
    /// Create a gain/phase pair.
    pub fn new(g: f64, phi: f64) -> Self {
        Self { g, phi }
    }

    /// Parameter-vector form `[g, phi]`.
    pub fn to_params(self) -> [f64; 2] {
        [self.g, self.phi]
    }

    /// Read a gain/phase pair from a two-element parameter slice.
    ///
    /// # Errors
    ///
    /// Returns `SolverError::DimensionMismatch` unless `params.len() == 2`.
    pub fn from_params(params: &[f64]) -> Result<Self, SolverError> {
        match params {
            [g, phi] => Ok(Self::new(*g, *phi)),
            _ => Err(SolverError::DimensionMismatch {
                expected: 2,
                got: params.len(),
            }),
        }
    }
}

/// Complete actuator state of the modulator.
///
/// Owned by the calibration session for the duration of a run and only
/// changed through the actuator facade. Across repetitions it moves towards
/// lower cost and is never reset mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorState {
    /// I-path DC offset (V)
    pub i_offset: f64,
    /// Q-path DC offset (V)
    pub q_offset: f64,
    /// Gain imbalance (unitless)
    pub gain_imbalance: f64,
    /// Phase imbalance (radians)
    pub phase_imbalance: f64,
}

impl ActuatorState {
    /// Build a state from its two knob pairs.
    pub fn from_pairs(offsets: LoOffsets, gain_phase: GainPhase) -> Self {
        Self {
            i_offset: offsets.i,
            q_offset: offsets.q,
            gain_imbalance: gain_phase.g,
            phase_imbalance: gain_phase.phi,
        }
    }

    /// DC offset pair.
    pub fn lo_offsets(&self) -> LoOffsets {
        LoOffsets::new(self.i_offset, self.q_offset)
    }

    /// Gain/phase pair.
    pub fn gain_phase(&self) -> GainPhase {
        GainPhase::new(self.gain_imbalance, self.phase_imbalance)
    }

    /// Parameter-vector form `[i_offset, q_offset, g, phi]`.
    pub fn to_params(self) -> [f64; 4] {
        [
            self.i_offset,
            self.q_offset,
            self.gain_imbalance,
            self.phase_imbalance,
        ]
    }

    /// Read a state from a four-element parameter slice.
    ///
    /// # Errors
    ///
    /// Returns `SolverError::DimensionMismatch` unless `params.len() == 4`.
    pub fn from_params(params: &[f64]) -> Result<Self, SolverError> {
        match params {
            [i, q, g, phi] => Ok(Self {
                i_offset: *i,
                q_offset: *q,
                gain_imbalance: *g,
                phase_imbalance: *phi,
            }),
            _ => Err(SolverError::DimensionMismatch {
                expected: 4,
                got: params.len(),
            }),
        }
    }
}
