//! Mapper capability trait: program/character access and mirroring override.

use crate::cartridge::mapper::Mirroring;
use crate::error::Result;

/// 16 KiB program (PRG) bank.
pub const PRG_BANK_LEN: usize = 0x4000;
/// 8 KiB character (CHR) bank.
pub const CHR_BANK_LEN: usize = 0x2000;
/// 8 KiB battery/program RAM bank.
pub const RAM_BANK_LEN: usize = 0x2000;

/// Capability set every mapper variant implements. The CPU reaches program
/// space ($6000-$FFFF) and the PPU reaches character space ($0000-$1FFF)
/// only through these.
pub trait Mapper {
    /// Read from program space ($6000-$FFFF).
    fn read_program(&self, addr: u16) -> u8;

    /// Write to program space: mapper registers or program RAM. Writing
    /// read-only program space is an illegal operation the caller may log
    /// and ignore.
    fn write_program(&mut self, addr: u16, data: u8) -> Result<()>;

    /// Read from character space ($0000-$1FFF).
    fn read_character(&self, addr: u16) -> u8;

    /// Write to character space; only character RAM accepts writes.
    fn write_character(&mut self, addr: u16, data: u8) -> Result<()>;

    /// Mirroring the PPU should use, given the mirroring declared by the
    /// cartridge header. Bank-switching mappers may override it.
    fn update_mirroring(&self, current: Mirroring) -> Mirroring;
}
