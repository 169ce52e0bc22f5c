//! Top-level console: owns the CPU (which owns the bus) and drives
//! whole-frame execution.

use crate::bus::NesBus;
use crate::cartridge::cartridge::Cartridge;
use crate::cpu::cpu::{Cpu, RunState};
use crate::gamepad::Gamepad;
use crate::region::Region;
use crate::sink::{AudioSink, VideoSink};

/// The machine: CPU, bus, and frame bookkeeping. An external driver calls
/// `run_frame` in a loop; everything happens in-line on that call stack.
pub struct Console {
    cpu: Cpu<NesBus>,
    region: Region,
}

impl Console {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(NesBus::new()),
            region: Region::Ntsc,
        }
    }

    /// Attach a cartridge and cold-boot: the machine adopts the image's
    /// video standard and the CPU restarts from the reset vector.
    pub fn insert_cartridge(&mut self, cart: Cartridge) {
        self.region = cart.region();
        self.cpu.set_region(self.region);
        self.cpu.bus.attach_cartridge(cart);
        self.cpu.reset();
    }

    /// Advance one video frame: clock the CPU through the frame's tick
    /// budget, then build the frame image and synthesize the frame's
    /// audio. Deterministic for a given cartridge and input sequence.
    pub fn run_frame(&mut self, video: &mut dyn VideoSink, audio: &mut dyn AudioSink) {
        // A mid-frame fault (terminal Error) abandons the rest of the
        // frame's budget; the frame clock still advances.
        while self.cpu.state == RunState::Running {
            if self.cpu.clock() {
                break;
            }
        }
        let NesBus {
            ppu, apu, cart, ..
        } = &mut self.cpu.bus;
        if let Some(cart) = cart {
            ppu.update(cart, video);
        }
        apu.run_frame(audio);
        self.cpu.bus.frame_index += 1;
    }

    /// Inject a maskable interrupt.
    pub fn request_irq(&mut self) {
        self.cpu.irq();
    }

    /// Inject a non-maskable interrupt.
    pub fn request_nmi(&mut self) {
        self.cpu.nmi();
    }

    /// Completed frames since power-on.
    pub fn frame_index(&self) -> u64 {
        self.cpu.bus.frame_index
    }

    /// Emulated wall-clock time, derived from the frame counter and the
    /// region frame rate.
    pub fn time_millis(&self) -> u64 {
        self.cpu.bus.frame_index * 1000 / self.region.frame_rate_hz() as u64
    }

    /// Host access to a controller slot (0 or 1).
    pub fn gamepad_mut(&mut self, slot: usize) -> &mut Gamepad {
        &mut self.cpu.bus.gamepads[slot]
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::loader::load_raw_block;
    use crate::sink::{Layer, TilePixels};
    use std::io::Cursor;

    struct NullVideo {
        presents: usize,
    }

    impl VideoSink for NullVideo {
        fn draw_tile(&mut self, _x: i16, _y: i16, _layer: Layer, _pixels: &TilePixels) {}
        fn present(&mut self) {
            self.presents += 1;
        }
    }

    struct NullAudio {
        samples: usize,
    }

    impl AudioSink for NullAudio {
        fn push(&mut self, _sample: f32) {
            self.samples += 1;
        }
    }

    /// 32 KiB image: an infinite JMP loop at $8000, reset vector wired up.
    fn looping_cart() -> Cartridge {
        let mut image = vec![0xEA; 0x8000];
        image[0..3].copy_from_slice(&[0x4C, 0x00, 0x80]);
        image[0x7FFC] = 0x00;
        image[0x7FFD] = 0x80;
        load_raw_block(&mut Cursor::new(image), 0x8000, 0x8000).unwrap()
    }

    #[test]
    fn run_frame_produces_one_image_and_one_audio_frame() {
        let mut console = Console::new();
        console.insert_cartridge(looping_cart());
        let mut video = NullVideo { presents: 0 };
        let mut audio = NullAudio { samples: 0 };
        console.run_frame(&mut video, &mut audio);
        assert_eq!(video.presents, 1);
        assert_eq!(audio.samples, 29830);
        assert_eq!(console.frame_index(), 1);
    }

    #[test]
    fn frames_are_deterministic() {
        let run = || {
            let mut console = Console::new();
            console.insert_cartridge(looping_cart());
            let mut video = NullVideo { presents: 0 };
            let mut audio = NullAudio { samples: 0 };
            for _ in 0..3 {
                console.run_frame(&mut video, &mut audio);
            }
            (console.frame_index(), audio.samples)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn time_follows_the_frame_counter() {
        let mut console = Console::new();
        console.insert_cartridge(looping_cart());
        let mut video = NullVideo { presents: 0 };
        let mut audio = NullAudio { samples: 0 };
        for _ in 0..60 {
            console.run_frame(&mut video, &mut audio);
        }
        assert_eq!(console.time_millis(), 1000);
    }

    #[test]
    fn faulted_cpu_does_not_hang_the_frame() {
        // $02 is outside the documented set: the CPU faults immediately
        let mut image = vec![0x02; 0x8000];
        image[0x7FFC] = 0x00;
        image[0x7FFD] = 0x80;
        let cart = load_raw_block(&mut Cursor::new(image), 0x8000, 0x8000).unwrap();
        let mut console = Console::new();
        console.insert_cartridge(cart);
        let mut video = NullVideo { presents: 0 };
        let mut audio = NullAudio { samples: 0 };
        console.run_frame(&mut video, &mut audio);
        assert_eq!(console.frame_index(), 1);
        assert_eq!(video.presents, 1);
    }

    #[test]
    fn frames_advance_even_without_a_cartridge() {
        // No CPU activity, but the frame clock still moves
        let mut console = Console::new();
        let mut video = NullVideo { presents: 0 };
        let mut audio = NullAudio { samples: 0 };
        console.run_frame(&mut video, &mut audio);
        assert_eq!(console.frame_index(), 1);
        assert_eq!(video.presents, 0, "no cartridge, no image");
    }
}
