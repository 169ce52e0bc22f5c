//! Mapper 0 (NROM): fixed mapping, no bank switching.
//!
//! Bank 0 covers $8000-$BFFF; the last declared bank covers $C000-$FFFF.
//! With a single bank both windows read the same 16 KiB (mirrored image).
//! Program space is read-only; character space is writable only when the
//! cartridge shipped character RAM instead of ROM.

use crate::cartridge::mapper::mapper::{CHR_BANK_LEN, Mapper, PRG_BANK_LEN};
use crate::cartridge::mapper::Mirroring;
use crate::error::{EmuError, Result};
use crate::storage::FixedStore;

/// NROM state: fixed PRG banks, one CHR bank (ROM or RAM).
pub struct Nrom {
    prg: Vec<FixedStore<PRG_BANK_LEN>>,
    chr: FixedStore<CHR_BANK_LEN>,
    chr_writable: bool,
}

impl Nrom {
    /// Create NROM from loaded banks. An empty `chr` list means the board
    /// carries 8 KiB of character RAM.
    pub fn new(prg: Vec<FixedStore<PRG_BANK_LEN>>, mut chr: Vec<FixedStore<CHR_BANK_LEN>>) -> Self {
        debug_assert!(!prg.is_empty(), "NROM requires at least one PRG bank");
        let chr_writable = chr.is_empty();
        let chr = if chr_writable {
            FixedStore::new()
        } else {
            chr.swap_remove(0)
        };
        Self {
            prg,
            chr,
            chr_writable,
        }
    }

    /// Load-time fill of bank content. `addr` is a CPU address in
    /// $8000-$FFFF; a range straddling the $C000 boundary recurses into the
    /// upper bank for the remainder.
    pub fn flash(&mut self, addr: u16, bytes: &[u8]) -> Result<()> {
        let end = addr as usize + bytes.len();
        if addr < 0x8000 || end > 0x1_0000 {
            return Err(EmuError::SizeOverflow {
                what: "PRG flash",
                requested: bytes.len(),
                capacity: 0x1_0000usize.saturating_sub(addr as usize),
            });
        }
        if addr < 0xC000 {
            let offset = (addr - 0x8000) as usize;
            let room = PRG_BANK_LEN - offset;
            let n = bytes.len().min(room);
            self.prg[0].load(offset, &bytes[..n]);
            if n < bytes.len() {
                self.flash(0xC000, &bytes[n..])?;
            }
        } else {
            let offset = (addr - 0xC000) as usize;
            let last = self.prg.len() - 1;
            self.prg[last].load(offset, bytes);
        }
        Ok(())
    }
}

impl Mapper for Nrom {
    fn read_program(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xBFFF => self.prg[0].read((addr - 0x8000) as usize),
            0xC000..=0xFFFF => {
                let last = self.prg.len() - 1;
                self.prg[last].read((addr - 0xC000) as usize)
            }
            // No program RAM on this board
            _ => 0,
        }
    }

    fn write_program(&mut self, addr: u16, _data: u8) -> Result<()> {
        Err(EmuError::IllegalOperation(format!(
            "NROM program space is read-only (write to {addr:#06x})"
        )))
    }

    fn read_character(&self, addr: u16) -> u8 {
        self.chr.read((addr as usize) & (CHR_BANK_LEN - 1))
    }

    fn write_character(&mut self, addr: u16, data: u8) -> Result<()> {
        if !self.chr_writable {
            return Err(EmuError::IllegalOperation(format!(
                "NROM character ROM is read-only (write to {addr:#06x})"
            )));
        }
        self.chr.write((addr as usize) & (CHR_BANK_LEN - 1), data);
        Ok(())
    }

    fn update_mirroring(&self, current: Mirroring) -> Mirroring {
        current
    }
}
