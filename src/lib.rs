//! Frame-stepped emulation core for the 8-bit NES console family.
//!
//! The crate models the machine at whole-frame granularity: a [`console::Console`]
//! owns the 6502 CPU, which owns the bus, which owns the PPU, APU, gamepads,
//! and the inserted cartridge. An external driver loads an iNES image with
//! [`cartridge::loader::load_image`], inserts it, and repeatedly calls
//! `run_frame` with a video and an audio sink. Given the same image and the
//! same input sequence, output is bit-identical across runs.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod console;
pub mod cpu;
pub mod error;
pub mod gamepad;
pub mod ppu;
pub mod region;
pub mod sink;
pub mod storage;
