//! Mapper 1 (MMC1): bank switching via a 5-bit shift register.
//!
//! Writes to $8000-$FFFF feed the shift register one bit at a time (LSB
//! first). The 5th write latches the accumulated value into the register
//! selected by the address: $8000-$9FFF control, $A000-$BFFF CHR bank 0,
//! $C000-$DFFF CHR bank 1, $E000-$FFFF PRG bank. Any write with bit 7 set
//! resets the shift register and forces PRG mode 3. Control bits 0-1 select
//! the mirroring override, bits 2-3 the PRG bank mode, bit 4 the CHR bank
//! granularity (8 KiB pair or two independent 4 KiB banks). $6000-$7FFF is
//! program RAM when the board carries a battery bank.

use crate::cartridge::mapper::mapper::{CHR_BANK_LEN, Mapper, PRG_BANK_LEN, RAM_BANK_LEN};
use crate::cartridge::mapper::Mirroring;
use crate::error::{EmuError, Result};
use crate::storage::FixedStore;

/// MMC1 state: banks plus the serial loading port.
pub struct Mmc1 {
    prg: Vec<FixedStore<PRG_BANK_LEN>>,
    chr: Vec<FixedStore<CHR_BANK_LEN>>,
    prg_ram: Option<FixedStore<RAM_BANK_LEN>>,
    chr_writable: bool,
    shift: u8,
    shift_count: u8,
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    prg_bank: u8,
}

impl Mmc1 {
    /// Create MMC1. An empty `chr` list means 8 KiB of character RAM.
    /// Control defaults to $0C: $8000 switchable, $C000 fixed to the last
    /// bank.
    pub fn new(
        prg: Vec<FixedStore<PRG_BANK_LEN>>,
        chr: Vec<FixedStore<CHR_BANK_LEN>>,
        prg_ram: Option<FixedStore<RAM_BANK_LEN>>,
    ) -> Self {
        debug_assert!(!prg.is_empty(), "MMC1 requires at least one PRG bank");
        let chr_writable = chr.is_empty();
        let chr = if chr_writable {
            vec![FixedStore::new()]
        } else {
            chr
        };
        Self {
            prg,
            chr,
            prg_ram,
            chr_writable,
            shift: 0,
            shift_count: 0,
            control: 0x0C,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,
        }
    }

    fn prg_bank_mode(&self) -> u8 {
        (self.control >> 2) & 0b11
    }

    /// CHR mode bit: clear = one 8 KiB pair, set = two 4 KiB banks.
    fn chr_4k_mode(&self) -> bool {
        self.control & 0x10 != 0
    }

    fn prg_bank_count(&self) -> usize {
        self.prg.len()
    }

    /// Read a 4 KiB CHR page: `bank4k` indexes 4 KiB units inside the 8 KiB
    /// bank array.
    fn chr_read(&self, bank4k: usize, offset: usize) -> u8 {
        let bank4k = bank4k % (self.chr.len() * 2);
        self.chr[bank4k / 2].read((bank4k % 2) * 0x1000 + offset)
    }

    fn latch(&mut self, addr: u16, value: u8) {
        match addr {
            0x8000..=0x9FFF => self.control = value & 0x1F,
            0xA000..=0xBFFF => self.chr_bank0 = value & 0x1F,
            0xC000..=0xDFFF => self.chr_bank1 = value & 0x1F,
            _ => self.prg_bank = value & 0x0F,
        }
    }
}

impl Mapper for Mmc1 {
    fn read_program(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => match &self.prg_ram {
                Some(ram) => ram.read((addr - 0x6000) as usize),
                None => 0,
            },
            0x8000..=0xFFFF => {
                let count = self.prg_bank_count();
                let addr = addr as usize;
                match self.prg_bank_mode() {
                    // 32 KiB mode: low bit of the bank number is ignored
                    0 | 1 => {
                        let bank = (self.prg_bank & 0x0E) as usize % count;
                        let idx = (bank + (addr >= 0xC000) as usize) % count;
                        self.prg[idx].read(addr & (PRG_BANK_LEN - 1))
                    }
                    // $8000 fixed to first bank, $C000 switchable
                    2 => {
                        if addr < 0xC000 {
                            self.prg[0].read(addr - 0x8000)
                        } else {
                            let bank = self.prg_bank as usize % count;
                            self.prg[bank].read(addr - 0xC000)
                        }
                    }
                    // $8000 switchable, $C000 fixed to last bank
                    _ => {
                        if addr < 0xC000 {
                            let bank = self.prg_bank as usize % count;
                            self.prg[bank].read(addr - 0x8000)
                        } else {
                            self.prg[count - 1].read(addr - 0xC000)
                        }
                    }
                }
            }
            _ => 0,
        }
    }

    fn write_program(&mut self, addr: u16, data: u8) -> Result<()> {
        match addr {
            0x6000..=0x7FFF => match &mut self.prg_ram {
                Some(ram) => {
                    ram.write((addr - 0x6000) as usize, data);
                    Ok(())
                }
                None => Err(EmuError::IllegalOperation(format!(
                    "no program RAM on this board (write to {addr:#06x})"
                ))),
            },
            0x8000..=0xFFFF => {
                if data & 0x80 != 0 {
                    self.shift = 0;
                    self.shift_count = 0;
                    self.control |= 0x0C;
                    return Ok(());
                }
                self.shift >>= 1;
                self.shift |= (data & 1) << 4;
                self.shift_count += 1;
                if self.shift_count == 5 {
                    let value = self.shift;
                    self.latch(addr, value);
                    self.shift = 0;
                    self.shift_count = 0;
                }
                Ok(())
            }
            _ => Err(EmuError::IllegalOperation(format!(
                "write outside program space: {addr:#06x}"
            ))),
        }
    }

    fn read_character(&self, addr: u16) -> u8 {
        let addr = (addr as usize) & (CHR_BANK_LEN - 1);
        if self.chr_4k_mode() {
            let (bank, offset) = if addr < 0x1000 {
                (self.chr_bank0 as usize, addr)
            } else {
                (self.chr_bank1 as usize, addr - 0x1000)
            };
            self.chr_read(bank, offset)
        } else {
            // 8 KiB mode: low bit ignored, banks come in pairs
            self.chr_read((self.chr_bank0 & 0x1E) as usize + (addr >= 0x1000) as usize, addr & 0x0FFF)
        }
    }

    fn write_character(&mut self, addr: u16, data: u8) -> Result<()> {
        if !self.chr_writable {
            return Err(EmuError::IllegalOperation(format!(
                "MMC1 character ROM is read-only (write to {addr:#06x})"
            )));
        }
        self.chr[0].write((addr as usize) & (CHR_BANK_LEN - 1), data);
        Ok(())
    }

    /// Mirroring override from control bits 0-1.
    fn update_mirroring(&self, _current: Mirroring) -> Mirroring {
        match self.control & 0b11 {
            0 => Mirroring::OneScreenLower,
            1 => Mirroring::OneScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(fill: u8) -> FixedStore<PRG_BANK_LEN> {
        let mut b = FixedStore::new();
        b.load(0, &vec![fill; PRG_BANK_LEN]);
        b
    }

    fn mmc1(banks: u8) -> Mmc1 {
        Mmc1::new((0..banks).map(bank).collect(), vec![], None)
    }

    /// Serially write one 5-bit value to the given register address.
    fn poke(m: &mut Mmc1, addr: u16, value: u8) {
        for i in 0..5 {
            m.write_program(addr, (value >> i) & 1).unwrap();
        }
    }

    #[test]
    fn five_writes_latch_the_register() {
        let mut m = mmc1(4);
        poke(&mut m, 0xE000, 0x02);
        assert_eq!(m.prg_bank, 2);
        // Default mode 3: $8000 switchable, $C000 fixed last
        assert_eq!(m.read_program(0x8000), 2);
        assert_eq!(m.read_program(0xC000), 3);
    }

    #[test]
    fn partial_write_sequence_latches_nothing() {
        let mut m = mmc1(4);
        for _ in 0..4 {
            m.write_program(0xE000, 1).unwrap();
        }
        assert_eq!(m.prg_bank, 0);
    }

    #[test]
    fn high_bit_write_resets_shift_and_forces_mode_3() {
        let mut m = mmc1(4);
        poke(&mut m, 0x8000, 0x00); // PRG mode 0 (32 KiB)
        assert_eq!(m.prg_bank_mode(), 0);
        m.write_program(0xE000, 1).unwrap();
        m.write_program(0xE000, 0x80).unwrap();
        assert_eq!(m.shift_count, 0);
        assert_eq!(m.prg_bank_mode(), 3);
        // The interrupted sequence left prg_bank untouched
        assert_eq!(m.prg_bank, 0);
    }

    #[test]
    fn prg_mode_2_fixes_lower_window() {
        let mut m = mmc1(4);
        poke(&mut m, 0x8000, 0x08); // mode 2
        poke(&mut m, 0xE000, 0x03);
        assert_eq!(m.read_program(0x8000), 0);
        assert_eq!(m.read_program(0xC000), 3);
    }

    #[test]
    fn prg_mode_0_maps_32k_pairs() {
        let mut m = mmc1(4);
        poke(&mut m, 0x8000, 0x00); // mode 0
        poke(&mut m, 0xE000, 0x03); // low bit ignored -> pair at bank 2
        assert_eq!(m.read_program(0x8000), 2);
        assert_eq!(m.read_program(0xC000), 3);
    }

    #[test]
    fn mirroring_override_follows_control() {
        let mut m = mmc1(2);
        poke(&mut m, 0x8000, 0x02 | 0x0C);
        assert_eq!(m.update_mirroring(Mirroring::Horizontal), Mirroring::Vertical);
        poke(&mut m, 0x8000, 0x00 | 0x0C);
        assert_eq!(
            m.update_mirroring(Mirroring::Horizontal),
            Mirroring::OneScreenLower
        );
    }

    #[test]
    fn program_ram_reads_back() {
        let mut m = Mmc1::new(vec![bank(0)], vec![], Some(FixedStore::new()));
        m.write_program(0x6123, 0xAB).unwrap();
        assert_eq!(m.read_program(0x6123), 0xAB);
    }

    #[test]
    fn missing_program_ram_rejects_writes() {
        let mut m = mmc1(1);
        assert!(matches!(
            m.write_program(0x6000, 1),
            Err(EmuError::IllegalOperation(_))
        ));
    }
}
