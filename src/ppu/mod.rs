//! Picture unit emulation.
//!
//! Register ports at $2000-$2007 (mirrored through $3FFF), nametable
//! mirroring, OAM, and a frame-granularity renderer that emits 8x8 tiles
//! into a `VideoSink` once per frame.

pub mod ppu;
