//! Cartridge mappers: PRG/CHR address decoding and bank switching.
//!
//! Nrom (mapper 0, fixed mapping) and Mmc1 (mapper 1, shift-register bank
//! switching), plus the mirroring modes they expose to the PPU.

/// Nametable mirroring: how the 4 logical nametable quadrants fold onto
/// physical VRAM pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
    OneScreenLower,
    OneScreenUpper,
}

impl Mirroring {
    /// Physical page index for each logical nametable quadrant.
    /// Always exactly 4 entries; every VRAM access in $2000-$2FFF is
    /// remapped through this table.
    pub fn page_table(self) -> [usize; 4] {
        match self {
            Mirroring::Horizontal => [0, 0, 1, 1],
            Mirroring::Vertical => [0, 1, 0, 1],
            Mirroring::FourScreen => [0, 1, 2, 3],
            Mirroring::OneScreenLower => [0, 0, 0, 0],
            Mirroring::OneScreenUpper => [1, 1, 1, 1],
        }
    }
}

pub mod mapper;

pub mod mmc1;
pub mod nrom;
