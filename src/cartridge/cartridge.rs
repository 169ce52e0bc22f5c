//! Loaded cartridge: banks behind a mapper, plus header-derived facts.
//!
//! A `Cartridge` is populated entirely by the loader (see `loader`), then
//! attached to the bus. The CPU reaches it at $6000-$FFFF and the PPU reads
//! pattern data at $0000-$1FFF; both go through the mapper variant.

use crate::cartridge::mapper::mapper::Mapper;
use crate::cartridge::mapper::Mirroring;
use crate::error::Result;
use crate::region::Region;

/// Optional 512-byte trainer block captured from the image.
pub const TRAINER_LEN: usize = 512;

/// Cartridge: mapper-owned ROM/RAM banks, mirroring, and the video standard
/// the image was dumped for.
pub struct Cartridge {
    mapper: Box<dyn Mapper>,
    mirroring: Mirroring,
    region: Region,
    trainer: Option<Box<[u8; TRAINER_LEN]>>,
}

impl Cartridge {
    pub(crate) fn new(
        mapper: Box<dyn Mapper>,
        mirroring: Mirroring,
        region: Region,
        trainer: Option<Box<[u8; TRAINER_LEN]>>,
    ) -> Self {
        Self {
            mapper,
            mirroring,
            region,
            trainer,
        }
    }

    /// CPU read from program space ($6000-$FFFF).
    pub fn read_program(&self, addr: u16) -> u8 {
        self.mapper.read_program(addr)
    }

    /// CPU write to program space: mapper registers or program RAM.
    pub fn write_program(&mut self, addr: u16, data: u8) -> Result<()> {
        self.mapper.write_program(addr, data)
    }

    /// PPU read from character space ($0000-$1FFF).
    pub fn read_character(&self, addr: u16) -> u8 {
        self.mapper.read_character(addr)
    }

    /// PPU write to character RAM.
    pub fn write_character(&mut self, addr: u16, data: u8) -> Result<()> {
        self.mapper.write_character(addr, data)
    }

    /// Effective mirroring: the header's mode, possibly overridden by the
    /// mapper's bank-switching state.
    pub fn mirroring(&self) -> Mirroring {
        self.mapper.update_mirroring(self.mirroring)
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn trainer(&self) -> Option<&[u8]> {
        self.trainer.as_deref().map(|t| t.as_slice())
    }
}
