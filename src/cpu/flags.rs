//! Processor status register (P) flag bits.

use bitflags::bitflags;

bitflags! {
    /// 6502 status flags. D is latched but has no arithmetic effect on
    /// this CPU variant; U reads back as set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const C = 1 << 0;
        const Z = 1 << 1;
        const I = 1 << 2;
        const D = 1 << 3;
        const B = 1 << 4;
        const U = 1 << 5;
        const V = 1 << 6;
        const N = 1 << 7;
    }
}

impl Status {
    /// Power-on value: interrupts masked, unused bit high.
    pub fn power_on() -> Self {
        Status::I | Status::U
    }
}
