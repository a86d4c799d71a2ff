//! Capability traits consumed by the calibration optimiser.
//!
//! This module defines the two instrument abstractions:
//! - [`IqActuator`]: Writes DC offsets and gain/phase corrections to the modulator
//! - [`SpectrumSource`]: Configures and triggers the spectrum-measuring instrument
//!
//! Implementations own their transport. The optimiser only borrows a handle
//! mutably for the duration of one stage and never shares it across threads.

pub mod instruments;

pub use instruments::{IqActuator, SpectrumSource};
