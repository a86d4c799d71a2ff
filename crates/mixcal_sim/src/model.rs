//! IQ modulator impairment model.
//!
//! A single-sideband modulator driven at `f_lo` with a base-band tone at
//! `f_base` produces:
//!
//! | Tone | Frequency | Power |
//! |------|-----------|-------|
//! | Wanted sideband | `f_lo + f_base` | `P_sig` |
//! | Image | `f_lo - f_base` | `P_sig * IRR(G, φ)` |
//! | LO leakage | `f_lo` | `k * (ΔI² + ΔQ²)` |
//! | Fixed spurs | `f_lo + offset` | constant |
//!
//! with the residual gain `G = 1 + ε + g`, residual phase `φ = θ + phi` and
//! residual offsets `ΔI = dc_i + i`, `ΔQ = dc_q + q`:
//!
//! ```text
//! IRR(G, φ) = (1 + G² - 2G cos φ) / (1 + G² + 2G cos φ)
//! ```
//!
//! The corrections that null the model are therefore `i = -dc_i`,
//! `q = -dc_q`, `g = -ε`, `phi = -θ`.

use mixcal_core::math::spectral::{dbm_to_mw, mw_to_dbm};
use mixcal_core::types::ActuatorState;

/// Drive amplitude at which the wanted sideband has `signal_power_dbm` (V).
pub const REFERENCE_AMPLITUDE: f64 = 0.3;

/// A spectral line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Frequency (Hz)
    pub frequency_hz: f64,
    /// Linear power (mW)
    pub power_mw: f64,
}

/// Spur at a fixed offset from the LO, independent of the corrections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpurTone {
    /// Offset from `f_lo` (Hz)
    pub offset_hz: f64,
    /// Power (dBm)
    pub power_dbm: f64,
}

/// Actuator corrections currently applied to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corrections {
    /// I/Q offsets and gain/phase corrections
    pub state: ActuatorState,
    /// Drive amplitude (V)
    pub base_amplitude: f64,
    /// Base-band tone frequency (Hz)
    pub base_frequency_hz: f64,
}

impl Default for Corrections {
    fn default() -> Self {
        Self {
            state: ActuatorState::default(),
            base_amplitude: REFERENCE_AMPLITUDE,
            base_frequency_hz: 0.0,
        }
    }
}

/// Physical impairments of the simulated modulator.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerModel {
    /// LO frequency (Hz)
    pub lo_frequency_hz: f64,
    /// Intrinsic I-path DC offset (V)
    pub dc_offset_i: f64,
    /// Intrinsic Q-path DC offset (V)
    pub dc_offset_q: f64,
    /// Intrinsic gain error ε
    pub gain_error: f64,
    /// Intrinsic phase error θ (radians)
    pub phase_error: f64,
    /// LO leakage per squared volt of residual offset (mW/V²)
    pub leakage_gain: f64,
    /// Wanted sideband power at the reference amplitude (dBm)
    pub signal_power_dbm: f64,
    /// Analyser noise floor (dBm)
    pub noise_floor_dbm: f64,
    /// Standard deviation of the floor ripple (dB); 0 disables noise
    pub noise_sigma_db: f64,
    /// Fixed spurs
    pub spurs: Vec<SpurTone>,
    /// Seed for the noise generator
    pub seed: u64,
}

impl Default for MixerModel {
    /// A 2 GHz modulator nulled by offsets `(0.01, 0.02)` and gain/phase
    /// `(0.1, 0.05)`, with one -65 dBm spur 3 MHz below the LO.
    fn default() -> Self {
        Self {
            lo_frequency_hz: 2.0e9,
            dc_offset_i: -0.01,
            dc_offset_q: -0.02,
            gain_error: -0.1,
            phase_error: -0.05,
            leakage_gain: 0.2,
            signal_power_dbm: -10.0,
            noise_floor_dbm: -90.0,
            noise_sigma_db: 0.5,
            spurs: vec![SpurTone {
                offset_hz: -3.0e6,
                power_dbm: -65.0,
            }],
            seed: 42,
        }
    }
}

impl MixerModel {
    /// Model without floor ripple.
    pub fn noiseless(mut self) -> Self {
        self.noise_sigma_db = 0.0;
        self
    }

    /// Corrections that null LO leakage and the image.
    pub fn ideal_corrections(&self) -> ActuatorState {
        ActuatorState {
            i_offset: -self.dc_offset_i,
            q_offset: -self.dc_offset_q,
            gain_imbalance: -self.gain_error,
            phase_imbalance: -self.phase_error,
        }
    }

    /// Image rejection ratio (linear) for the given gain/phase correction.
    pub fn image_rejection_ratio(&self, g: f64, phi: f64) -> f64 {
        let gain = 1.0 + self.gain_error + g;
        let phase = self.phase_error + phi;
        let cross = 2.0 * gain * phase.cos();
        let sum = 1.0 + gain * gain;
        let denominator = sum + cross;
        if denominator <= 0.0 {
            return 1.0;
        }
        (sum - cross).max(0.0) / denominator
    }

    /// LO leakage power (mW) for the given offsets.
    pub fn lo_leakage_mw(&self, i: f64, q: f64) -> f64 {
        let di = self.dc_offset_i + i;
        let dq = self.dc_offset_q + q;
        self.leakage_gain * (di * di + dq * dq)
    }

    /// Wanted sideband power (mW) at the given drive amplitude.
    pub fn signal_mw(&self, base_amplitude: f64) -> f64 {
        let scale = base_amplitude / REFERENCE_AMPLITUDE;
        dbm_to_mw(self.signal_power_dbm) * scale * scale
    }

    /// Noise floor (mW).
    pub fn floor_mw(&self) -> f64 {
        dbm_to_mw(self.noise_floor_dbm)
    }

    /// Every tone present at the output for the given corrections.
    pub fn tones(&self, corrections: &Corrections) -> Vec<Tone> {
        let state = &corrections.state;
        let f_lo = self.lo_frequency_hz;
        let f_base = corrections.base_frequency_hz;
        let signal = self.signal_mw(corrections.base_amplitude);

        let mut tones = vec![
            Tone {
                frequency_hz: f_lo,
                power_mw: self.lo_leakage_mw(state.i_offset, state.q_offset),
            },
            Tone {
                frequency_hz: f_lo + f_base,
                power_mw: signal,
            },
            Tone {
                frequency_hz: f_lo - f_base,
                power_mw: signal
                    * self.image_rejection_ratio(state.gain_imbalance, state.phase_imbalance),
            },
        ];
        tones.extend(self.spurs.iter().map(|spur| Tone {
            frequency_hz: f_lo + spur.offset_hz,
            power_mw: dbm_to_mw(spur.power_dbm),
        }));
        tones
    }

    /// Summed power (mW) of the tones inside
    /// `[center - width/2, center + width/2]`, excluding the floor.
    pub fn band_tone_mw(&self, corrections: &Corrections, center_hz: f64, width_hz: f64) -> f64 {
        let half = width_hz.abs() / 2.0;
        self.tones(corrections)
            .iter()
            .filter(|tone| (tone.frequency_hz - center_hz).abs() <= half)
            .map(|tone| tone.power_mw)
            .sum()
    }

    /// Noiseless band reading (dBm): in-band tones on top of the floor.
    pub fn band_power_dbm(&self, corrections: &Corrections, center_hz: f64, width_hz: f64) -> f64 {
        mw_to_dbm(self.floor_mw() + self.band_tone_mw(corrections, center_hz, width_hz))
    }

    /// Swept response at `frequency_hz` through a Gaussian filter with
    /// full width at half maximum `rbw_hz`, excluding the floor (mW).
    pub fn swept_tone_mw(&self, tones: &[Tone], frequency_hz: f64, rbw_hz: f64) -> f64 {
        let rbw = rbw_hz.abs().max(f64::MIN_POSITIVE);
        tones
            .iter()
            .map(|tone| {
                let x = (frequency_hz - tone.frequency_hz) / rbw;
                tone.power_mw * (-4.0 * std::f64::consts::LN_2 * x * x).exp()
            })
            .sum()
    }
}
