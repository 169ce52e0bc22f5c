//! iNES cartridge-image loading.
//!
//! Parses the 16-byte iNES header (magic "NES\x1A", PRG size in 16 KiB
//! units, CHR size in 8 KiB units, flag bytes 6-9), then the optional
//! 512-byte trainer, then every declared PRG and CHR bank. Validation is
//! strict: reserved header bits must be zero, every declared section must be
//! complete, and no bytes may remain after the last bank.

use std::io::Read;

use bitflags::bitflags;
use tracing::debug;

use crate::cartridge::cartridge::{Cartridge, TRAINER_LEN};
use crate::cartridge::mapper::mapper::{CHR_BANK_LEN, Mapper, PRG_BANK_LEN, RAM_BANK_LEN};
use crate::cartridge::mapper::mmc1::Mmc1;
use crate::cartridge::mapper::nrom::Nrom;
use crate::cartridge::mapper::Mirroring;
use crate::error::{EmuError, Result};
use crate::region::Region;
use crate::storage::FixedStore;

const NES_MAGIC: &[u8; 4] = b"NES\x1A";

/// Fixed iNES header length.
pub const HEADER_LEN: usize = 16;

bitflags! {
    /// Header byte 6: mirroring, battery, trainer, four-screen, mapper low nibble.
    #[derive(Debug, Clone, Copy)]
    struct Flags6: u8 {
        const MIRRORING   = 0b0000_0001;
        const BATTERY     = 0b0000_0010;
        const TRAINER     = 0b0000_0100;
        const FOUR_SCREEN = 0b0000_1000;
        const MAPPER_LOW  = 0b1111_0000;
    }
}

bitflags! {
    /// Header byte 7: VS-system flag, reserved bits, mapper high nibble.
    #[derive(Debug, Clone, Copy)]
    struct Flags7: u8 {
        const VS_SYSTEM   = 0b0000_0001;
        const RESERVED    = 0b0000_1110;
        const MAPPER_HIGH = 0b1111_0000;
    }
}

/// Parsed and validated iNES header.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub prg_banks: u8,
    pub chr_banks: u8,
    /// Declared 8 KiB RAM banks, after the battery fixup (a battery-backed
    /// image declaring 0 banks gets 1).
    pub ram_banks: u8,
    pub mapper: u8,
    pub mirroring: Mirroring,
    pub battery: bool,
    pub trainer: bool,
    pub vs_system: bool,
    pub region: Region,
}

impl Header {
    /// Validate and decode a 16-byte header.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        if &bytes[0..4] != NES_MAGIC {
            return Err(EmuError::IllegalFormat("bad magic number".into()));
        }
        let flags6 = Flags6::from_bits_retain(bytes[6]);
        let flags7 = Flags7::from_bits_retain(bytes[7]);
        if flags7.intersects(Flags7::RESERVED) {
            return Err(EmuError::IllegalFormat(
                "reserved bits set in header byte 7".into(),
            ));
        }
        if bytes[9] & 0xFE != 0 {
            return Err(EmuError::IllegalFormat(
                "PAL flag byte has bits set above bit 0".into(),
            ));
        }
        if bytes[10..].iter().any(|&b| b != 0) {
            return Err(EmuError::IllegalFormat(
                "reserved header bytes 10-15 are not zero".into(),
            ));
        }
        let prg_banks = bytes[4];
        if prg_banks == 0 {
            return Err(EmuError::IllegalFormat("zero program banks declared".into()));
        }

        let mirroring = if flags6.contains(Flags6::FOUR_SCREEN) {
            Mirroring::FourScreen
        } else if flags6.contains(Flags6::MIRRORING) {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let battery = flags6.contains(Flags6::BATTERY);
        // Older dumps declare battery RAM without a bank count
        let ram_banks = match bytes[8] {
            0 if battery => 1,
            n => n,
        };
        let mapper = (flags6.bits() >> 4) | (flags7.bits() & Flags7::MAPPER_HIGH.bits());
        let region = if bytes[9] & 1 != 0 {
            Region::Pal
        } else {
            Region::Ntsc
        };

        Ok(Self {
            prg_banks,
            chr_banks: bytes[5],
            ram_banks,
            mapper,
            mirroring,
            battery,
            trainer: flags6.contains(Flags6::TRAINER),
            vs_system: flags7.contains(Flags7::VS_SYSTEM),
            region,
        })
    }
}

/// `read_exact` with truncation reported as an illegal-format error naming
/// the section, not a bare I/O failure.
fn read_section(reader: &mut impl Read, buf: &mut [u8], section: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            EmuError::IllegalFormat(format!("unexpected end of stream in {section}"))
        } else {
            EmuError::Io(e)
        }
    })
}

/// Parse a full iNES image into a populated cartridge.
///
/// Fails on: bad magic, nonzero reserved bits, zero PRG banks, a PAL flag
/// byte with high bits set, truncation inside any declared section, or
/// trailing bytes after the last declared bank. On failure no cartridge is
/// produced; a previously loaded one is unaffected.
pub fn load_image(reader: &mut impl Read) -> Result<Cartridge> {
    let mut header_bytes = [0u8; HEADER_LEN];
    read_section(reader, &mut header_bytes, "header")?;
    let header = Header::parse(&header_bytes)?;
    debug!(
        mapper = header.mapper,
        prg_banks = header.prg_banks,
        chr_banks = header.chr_banks,
        region = ?header.region,
        "loading cartridge image"
    );

    let trainer = if header.trainer {
        let mut block = Box::new([0u8; TRAINER_LEN]);
        read_section(reader, block.as_mut_slice(), "trainer")?;
        Some(block)
    } else {
        None
    };

    let mut prg = Vec::with_capacity(header.prg_banks as usize);
    let mut buf = vec![0u8; PRG_BANK_LEN];
    for i in 0..header.prg_banks {
        read_section(reader, &mut buf, &format!("program bank {i}"))?;
        let mut bank = FixedStore::new();
        bank.load(0, &buf);
        prg.push(bank);
    }

    let mut chr = Vec::with_capacity(header.chr_banks as usize);
    let mut buf = vec![0u8; CHR_BANK_LEN];
    for i in 0..header.chr_banks {
        read_section(reader, &mut buf, &format!("character bank {i}"))?;
        let mut bank = FixedStore::new();
        bank.load(0, &buf);
        chr.push(bank);
    }

    let mut probe = [0u8; 1];
    match reader.read(&mut probe) {
        Ok(0) => {}
        Ok(_) => {
            return Err(EmuError::IllegalFormat(
                "trailing bytes after declared banks".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let mapper: Box<dyn Mapper> = match header.mapper {
        0 => Box::new(Nrom::new(prg, chr)),
        1 => {
            let prg_ram: Option<FixedStore<RAM_BANK_LEN>> = if header.ram_banks > 0 {
                Some(FixedStore::new())
            } else {
                None
            };
            Box::new(Mmc1::new(prg, chr, prg_ram))
        }
        n => {
            return Err(EmuError::IllegalArgument(format!("unsupported mapper {n}")));
        }
    };

    Ok(Cartridge::new(mapper, header.mirroring, header.region, trainer))
}

/// Flash a raw byte stream into a fixed-mapping cartridge, bypassing the
/// header entirely. `dest` and the stream length must stay inside
/// $8000-$FFFF. Test-fixture path, not a cartridge image format.
pub fn load_raw_block(reader: &mut impl Read, dest: u16, max_len: usize) -> Result<Cartridge> {
    if dest < 0x8000 {
        return Err(EmuError::IllegalArgument(format!(
            "raw block destination {dest:#06x} below $8000"
        )));
    }
    let window = 0x1_0000 - dest as usize;
    if max_len > window {
        return Err(EmuError::SizeOverflow {
            what: "raw block",
            requested: max_len,
            capacity: window,
        });
    }
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    if data.len() > max_len {
        return Err(EmuError::SizeOverflow {
            what: "raw block",
            requested: data.len(),
            capacity: max_len,
        });
    }

    // Two banks so the $8000 and $C000 windows are independent
    let mut nrom = Nrom::new(vec![FixedStore::new(), FixedStore::new()], vec![]);
    nrom.flash(dest, &data)?;
    Ok(Cartridge::new(
        Box::new(nrom),
        Mirroring::Horizontal,
        Region::Ntsc,
        None,
    ))
}
