//! Audio unit emulation.
//!
//! - **Pulse** (x2): square waves with duty, envelope, sweep, length counter.
//! - **Triangle**: 32-step wave, linear counter, length counter.
//! - **Noise**: LFSR-based, envelope, length counter.
//! - **Frame sequencer**: 4-step or 5-step, run at whole-frame granularity.
//! - **Mixer**: two-group non-linear mix, one float sample per audio tick.
//!
//! The delta-modulation channel is a zero-output stub.

pub mod apu;
