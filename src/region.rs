//! Video-standard timing constants.
//!
//! One frame of emulation is a fixed CPU tick budget derived from the CPU
//! clock and the frame rate of the configured standard. The same budget
//! drives the APU frame synthesizer, so audio and video stay in lockstep.

/// Video standard the console runs at, selected by the cartridge header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Ntsc,
    Pal,
}

impl Region {
    /// CPU clock rate in Hz (NTSC 2A03 / PAL 2A07).
    pub fn cpu_clock_hz(self) -> u32 {
        match self {
            Region::Ntsc => 1_789_773,
            Region::Pal => 1_662_607,
        }
    }

    /// Frames per second.
    pub fn frame_rate_hz(self) -> u32 {
        match self {
            Region::Ntsc => 60,
            Region::Pal => 50,
        }
    }

    /// CPU ticks in one video frame: clock / frame rate, rounded half up.
    /// NTSC: 29830, PAL: 33252.
    pub fn ticks_per_frame(self) -> u32 {
        let clock = self.cpu_clock_hz();
        let rate = self.frame_rate_hz();
        (clock + rate / 2) / rate
    }
}

#[cfg(test)]
mod tests {
    use super::Region;

    #[test]
    fn ticks_per_frame_rounds_half_up() {
        // 1789773 / 60 = 29829.55, 1662607 / 50 = 33252.14
        assert_eq!(Region::Ntsc.ticks_per_frame(), 29830);
        assert_eq!(Region::Pal.ticks_per_frame(), 33252);
    }
}
