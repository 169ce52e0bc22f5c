//! Output seams between the core and its front-end collaborators.
//!
//! The PPU emits 8x8 tiles into a [`VideoSink`] and the APU pushes one mixed
//! float sample per audio tick into an [`AudioSink`]. Both are invoked
//! synchronously during a frame advance; implementations must not block
//! indefinitely (buffer internally instead). The core applies no backpressure
//! and performs no retry.

/// Compositing layer for an emitted tile. Sinks draw `BehindBackground`
/// first, then `Background`, then `Sprite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    BehindBackground,
    Background,
    Sprite,
}

/// One 8x8 tile of 6-bit system-palette indices; `None` is transparent.
pub type TilePixels = [[Option<u8>; 8]; 8];

/// Receives the frame image, one tile at a time, then a single `present`.
pub trait VideoSink {
    /// Draw a tile whose top-left corner is at (`x`, `y`) in screen pixels.
    /// Coordinates may be partially off the 256x240 screen.
    fn draw_tile(&mut self, x: i16, y: i16, layer: Layer, pixels: &TilePixels);

    /// Called exactly once per frame build, after all tiles were emitted.
    fn present(&mut self);
}

/// Receives one mixed sample in [0, 1] per audio tick.
pub trait AudioSink {
    fn push(&mut self, sample: f32);
}
