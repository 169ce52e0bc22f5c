//! 6502 CPU emulation.
//!
//! Documented instruction set only; any other opcode is a terminal fault.
//! Memory and I/O go through the `Bus` trait (PPU, APU, cartridge,
//! gamepads).

pub mod cpu;
pub mod flags;

#[cfg(test)]
mod tests;
