//! Cartridge images, mappers, and the iNES loader.
//!
//! - **cartridge**: the loaded cartridge (banks behind a mapper).
//! - **loader**: strict iNES parsing plus a raw-block test-fixture path.
//! - **mapper**: NROM (0) and MMC1 (1); bank switching and mirroring.

pub mod cartridge;
pub mod loader;
pub mod mapper;
