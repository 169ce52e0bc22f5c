//! Gamepad input: the standard latch/shift register protocol.
//!
//! Writing bit 0 of the strobe port latches the current button state;
//! reads then return one button per read, LSB first (A, B, Select, Start,
//! Up, Down, Left, Right). A turbo mask re-presses its buttons on every
//! other frame, driven by the console frame counter.

/// One controller slot.
#[derive(Default)]
pub struct Gamepad {
    /// Held buttons: bit 0 = A, 1 = B, 2 = Select, 3 = Start, 4 = Up,
    /// 5 = Down, 6 = Left, 7 = Right.
    state: u8,
    /// Buttons that auto-repeat on alternate frames.
    turbo: u8,
    shift: u8,
}

impl Gamepad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held-button state from the host.
    pub fn set_state(&mut self, state: u8) {
        self.state = state;
    }

    /// Mark buttons as turbo: while held they read as pressed only on
    /// even frames.
    pub fn set_turbo(&mut self, mask: u8) {
        self.turbo = mask;
    }

    fn effective_state(&self, frame_index: u64) -> u8 {
        if frame_index & 1 == 0 {
            self.state
        } else {
            self.state & !self.turbo
        }
    }

    /// Strobe write: bit 0 set latches the current (turbo-adjusted) state
    /// into the shift register.
    pub fn write(&mut self, data: u8, frame_index: u64) {
        if data & 1 != 0 {
            self.shift = self.effective_state(frame_index);
        }
    }

    /// Shift one button out. Bit 6 is held high, matching open-bus reads
    /// on the controller port.
    pub fn read(&mut self) -> u8 {
        let bit = self.shift & 1;
        self.shift >>= 1;
        bit | 0x40
    }
}
