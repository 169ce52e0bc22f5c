//! Audio unit: two pulse channels, triangle, noise, a silent
//! delta-modulation stub, the frame sequencer, and the non-linear mixer.
//!
//! Audio is synthesized one whole video frame at a time: `run_frame`
//! iterates every audio tick of the frame, clocks the channel timers
//! (pulse timers on odd ticks only), fires the frame-sequencer step
//! boundaries, and pushes one mixed float sample per tick into the sink.

use crate::region::Region;
use crate::sink::AudioSink;

/// Length counter load values, indexed by the 5-bit field of the length
/// registers.
const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Noise timer periods per video standard, indexed by the 4-bit period
/// code of $400E.
const NOISE_PERIOD_NTSC: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];
const NOISE_PERIOD_PAL: [u16; 16] = [
    4, 8, 14, 30, 60, 88, 118, 148, 188, 236, 354, 472, 708, 944, 1890, 3778,
];

/// The four 8-step pulse duty patterns.
const PULSE_DUTY: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1],
    [0, 0, 0, 0, 0, 0, 1, 1],
    [0, 0, 0, 0, 1, 1, 1, 1],
    [1, 1, 1, 1, 1, 1, 0, 0],
];

/// 32-step triangle waveform: 15 down to 0, then back up.
const TRIANGLE_SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
    13, 14, 15,
];

/// Pulse channel: duty sequencer, envelope, sweep, length counter.
#[derive(Default)]
struct Pulse {
    enabled: bool,
    duty: u8,
    length_halt: bool,
    constant_volume: bool,
    volume: u8,
    sweep_enable: bool,
    sweep_period: u8,
    sweep_negate: bool,
    sweep_shift: u8,
    timer_period: u16,
    timer: u16,
    sequencer_step: u8,
    length_counter: u8,
    envelope_start: bool,
    envelope_divider: u8,
    envelope_decay: u8,
    sweep_divider: u8,
    sweep_reload: bool,
}

impl Pulse {
    /// $4000/$4004: duty, length halt, constant volume, volume/envelope
    /// period.
    fn write_control(&mut self, data: u8) {
        self.duty = (data >> 6) & 3;
        self.length_halt = data & 0x20 != 0;
        self.constant_volume = data & 0x10 != 0;
        self.volume = data & 0x0F;
        self.envelope_start = true;
    }

    /// $4001/$4005: sweep enable, period, negate, shift.
    fn write_sweep(&mut self, data: u8) {
        self.sweep_enable = data & 0x80 != 0;
        self.sweep_period = (data >> 4) & 7;
        self.sweep_negate = data & 0x08 != 0;
        self.sweep_shift = data & 7;
        self.sweep_reload = true;
    }

    /// $4002/$4006: timer low 8 bits.
    fn write_timer_low(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x0700) | data as u16;
    }

    /// $4003/$4007: length load and timer high 3 bits; restarts the
    /// envelope and the duty sequencer.
    fn write_length(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | ((data & 7) as u16) << 8;
        if self.enabled {
            self.length_counter = LENGTH_TABLE[(data >> 3) as usize & 0x1F];
        }
        self.envelope_start = true;
        self.sequencer_step = 0;
    }

    fn clock_length(&mut self) {
        if !self.length_halt && self.length_counter > 0 {
            self.length_counter -= 1;
        }
    }

    /// One envelope tick. The tick after a restart reloads decay to 15 and
    /// does nothing else; afterwards the divider counts down and each
    /// underflow steps the decay level, wrapping to 15 only when looping.
    fn clock_envelope(&mut self) {
        if self.envelope_start {
            self.envelope_decay = 15;
            self.envelope_divider = self.volume;
            self.envelope_start = false;
        } else if self.envelope_divider > 0 {
            self.envelope_divider -= 1;
        } else {
            self.envelope_divider = self.volume;
            if self.envelope_decay > 0 {
                self.envelope_decay -= 1;
            } else if self.length_halt {
                self.envelope_decay = 15;
            }
        }
    }

    fn clock_sweep(&mut self) {
        let divider_was_zero = self.sweep_divider == 0;
        if self.sweep_divider == 0 || self.sweep_reload {
            self.sweep_divider = self.sweep_period;
            self.sweep_reload = false;
        } else {
            self.sweep_divider -= 1;
        }
        if divider_was_zero && self.sweep_enable && self.sweep_shift > 0 {
            let delta = self.timer_period >> self.sweep_shift;
            if self.sweep_negate {
                self.timer_period = self.timer_period.saturating_sub(delta);
            } else {
                self.timer_period = self.timer_period.saturating_add(delta);
            }
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled
            || self.length_counter == 0
            || self.timer_period < 8
            || self.timer_period > 0x7FF
            || PULSE_DUTY[self.duty as usize][self.sequencer_step as usize] == 0
        {
            return 0;
        }
        if self.constant_volume {
            self.volume
        } else {
            self.envelope_decay
        }
    }

    fn clock_timer(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.timer_period;
        self.sequencer_step = self.sequencer_step.wrapping_sub(1) & 7;
    }
}

/// Triangle channel: 32-step sequencer gated by both a length counter and
/// a linear counter.
#[derive(Default)]
struct Triangle {
    enabled: bool,
    length_halt: bool,
    linear_load: u8,
    timer_period: u16,
    timer: u16,
    length_counter: u8,
    linear_counter: u8,
    linear_reload: bool,
    sequencer_step: u8,
}

impl Triangle {
    /// $4008: control flag and linear counter load value.
    fn write_linear(&mut self, data: u8) {
        self.length_halt = data & 0x80 != 0;
        self.linear_load = data & 0x7F;
    }

    fn write_timer_low(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0xFF00) | data as u16;
    }

    /// $400B: length load, timer high bits, linear reload flag.
    fn write_length(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | ((data & 7) as u16) << 8;
        if self.enabled {
            self.length_counter = LENGTH_TABLE[(data >> 3) as usize & 0x1F];
        }
        self.linear_reload = true;
    }

    fn clock_length(&mut self) {
        if !self.length_halt && self.length_counter > 0 {
            self.length_counter -= 1;
        }
    }

    fn clock_linear(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_load;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.length_halt {
            self.linear_reload = false;
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled
            || self.length_counter == 0
            || self.linear_counter == 0
            || self.timer_period < 2
        {
            return 0;
        }
        TRIANGLE_SEQUENCE[self.sequencer_step as usize]
    }

    fn clock_timer(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.timer_period;
        if self.length_counter > 0 && self.linear_counter > 0 {
            self.sequencer_step = (self.sequencer_step + 1) & 31;
        }
    }
}

/// Noise channel: envelope-gated 15-bit LFSR.
#[derive(Default)]
struct Noise {
    enabled: bool,
    length_halt: bool,
    constant_volume: bool,
    volume: u8,
    mode: bool,
    period_index: u8,
    length_counter: u8,
    envelope_start: bool,
    envelope_divider: u8,
    envelope_decay: u8,
    timer: u16,
    shift: u16,
}

impl Noise {
    fn write_control(&mut self, data: u8) {
        self.length_halt = data & 0x20 != 0;
        self.constant_volume = data & 0x10 != 0;
        self.volume = data & 0x0F;
        self.envelope_start = true;
    }

    /// $400E: LFSR mode bit and 4-bit period code.
    fn write_period(&mut self, data: u8) {
        self.mode = data & 0x80 != 0;
        self.period_index = data & 0x0F;
    }

    fn write_length(&mut self, data: u8) {
        if self.enabled {
            self.length_counter = LENGTH_TABLE[(data >> 3) as usize & 0x1F];
        }
        self.envelope_start = true;
    }

    fn clock_length(&mut self) {
        if !self.length_halt && self.length_counter > 0 {
            self.length_counter -= 1;
        }
    }

    fn clock_envelope(&mut self) {
        if self.envelope_start {
            self.envelope_decay = 15;
            self.envelope_divider = self.volume;
            self.envelope_start = false;
        } else if self.envelope_divider > 0 {
            self.envelope_divider -= 1;
        } else {
            self.envelope_divider = self.volume;
            if self.envelope_decay > 0 {
                self.envelope_decay -= 1;
            } else if self.length_halt {
                self.envelope_decay = 15;
            }
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled || self.length_counter == 0 || (self.shift & 1) != 0 {
            return 0;
        }
        if self.constant_volume {
            self.volume
        } else {
            self.envelope_decay
        }
    }

    fn clock_timer(&mut self, periods: &[u16; 16]) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = periods[self.period_index as usize];
        let tap = if self.mode { 6 } else { 1 };
        let feedback = (self.shift & 1) ^ ((self.shift >> tap) & 1);
        self.shift = (self.shift >> 1) | (feedback << 14);
    }
}

/// Delta-modulation stub: registers are accepted and the channel always
/// contributes zero to the mix.
#[derive(Default)]
struct Dmc {
    output_level: u8,
}

impl Dmc {
    /// $4011 direct load is retained for completeness; the channel still
    /// reports silence.
    fn write_level(&mut self, data: u8) {
        self.output_level = data & 0x7F;
    }

    fn output(&self) -> u8 {
        let _ = self.output_level;
        0
    }
}

/// Audio unit: channel bank, frame sequencer mode, and frame IRQ state.
pub struct Apu {
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    region: Region,
    five_step: bool,
    irq_inhibit: bool,
    frame_irq: bool,
}

impl Apu {
    pub fn new() -> Self {
        Self {
            pulse1: Pulse::default(),
            pulse2: Pulse::default(),
            triangle: Triangle::default(),
            noise: Noise {
                shift: 1,
                ..Noise::default()
            },
            dmc: Dmc::default(),
            region: Region::Ntsc,
            five_step: false,
            irq_inhibit: false,
            frame_irq: false,
        }
    }

    /// Adopt the cartridge's video standard; selects the noise period
    /// table and the per-frame tick count.
    pub fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    /// Level of the frame-IRQ line, for the bus's interrupt poll.
    pub fn irq_pending(&self) -> bool {
        self.frame_irq
    }

    /// Register write dispatch for $4000-$4017.
    pub fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x4000 => self.pulse1.write_control(data),
            0x4001 => self.pulse1.write_sweep(data),
            0x4002 => self.pulse1.write_timer_low(data),
            0x4003 => self.pulse1.write_length(data),
            0x4004 => self.pulse2.write_control(data),
            0x4005 => self.pulse2.write_sweep(data),
            0x4006 => self.pulse2.write_timer_low(data),
            0x4007 => self.pulse2.write_length(data),
            0x4008 => self.triangle.write_linear(data),
            0x400A => self.triangle.write_timer_low(data),
            0x400B => self.triangle.write_length(data),
            0x400C => self.noise.write_control(data),
            0x400E => self.noise.write_period(data),
            0x400F => self.noise.write_length(data),
            0x4011 => self.dmc.write_level(data),
            0x4010 | 0x4012 | 0x4013 => {} // delta-modulation stub
            0x4015 => self.write_status(data),
            0x4017 => {
                self.five_step = data & 0x80 != 0;
                self.irq_inhibit = data & 0x40 != 0;
                if self.irq_inhibit {
                    self.frame_irq = false;
                }
            }
            _ => {}
        }
    }

    /// $4015 write: channel enables. Disabling a channel forces its length
    /// counter to zero.
    fn write_status(&mut self, data: u8) {
        self.pulse1.enabled = data & 0x01 != 0;
        self.pulse2.enabled = data & 0x02 != 0;
        self.triangle.enabled = data & 0x04 != 0;
        self.noise.enabled = data & 0x08 != 0;
        if !self.pulse1.enabled {
            self.pulse1.length_counter = 0;
        }
        if !self.pulse2.enabled {
            self.pulse2.length_counter = 0;
        }
        if !self.triangle.enabled {
            self.triangle.length_counter = 0;
        }
        if !self.noise.enabled {
            self.noise.length_counter = 0;
        }
    }

    /// $4015 read: length-counter status in bits 0-3, frame IRQ in bit 6.
    /// Reading clears the frame IRQ.
    pub fn read_status(&mut self) -> u8 {
        let mut r = 0u8;
        if self.pulse1.length_counter > 0 {
            r |= 0x01;
        }
        if self.pulse2.length_counter > 0 {
            r |= 0x02;
        }
        if self.triangle.length_counter > 0 {
            r |= 0x04;
        }
        if self.noise.length_counter > 0 {
            r |= 0x08;
        }
        if self.frame_irq {
            r |= 0x40;
        }
        self.frame_irq = false;
        r
    }

    /// Envelope and linear-counter clocks.
    fn clock_quarter_frame(&mut self) {
        self.pulse1.clock_envelope();
        self.pulse2.clock_envelope();
        self.noise.clock_envelope();
        self.triangle.clock_linear();
    }

    /// Length-counter and sweep clocks.
    fn clock_half_frame(&mut self) {
        self.pulse1.clock_length();
        self.pulse2.clock_length();
        self.triangle.clock_length();
        self.noise.clock_length();
        self.pulse1.clock_sweep();
        self.pulse2.clock_sweep();
    }

    /// Two-group non-linear mix of the current channel samples.
    fn mix(&self) -> f32 {
        let pulse_sum = (self.pulse1.output() + self.pulse2.output()) as f32;
        let pulse_out = if pulse_sum == 0.0 {
            0.0
        } else {
            95.88 / (8128.0 / pulse_sum + 100.0)
        };
        let tnd_sum = self.triangle.output() as f32 / 8227.0
            + self.noise.output() as f32 / 12241.0
            + self.dmc.output() as f32 / 22638.0;
        let tnd_out = if tnd_sum == 0.0 {
            0.0
        } else {
            159.79 / (1.0 / tnd_sum + 100.0)
        };
        pulse_out + tnd_out
    }

    /// Synthesize one video frame of audio, one sample per tick.
    ///
    /// The frame's tick count is split into 4 or 5 equal sequencer steps.
    /// Each boundary after tick zero fires the quarter-frame clocks
    /// (except the final 4-step boundary while IRQ inhibit holds); the
    /// half-frame clocks fire on step 2 and on the final step, and the
    /// frame IRQ is raised at the final 4-step boundary unless inhibited.
    pub fn run_frame(&mut self, sink: &mut dyn AudioSink) {
        let ticks = self.region.ticks_per_frame() as u64;
        let steps: u64 = if self.five_step { 5 } else { 4 };
        let periods = match self.region {
            Region::Ntsc => &NOISE_PERIOD_NTSC,
            Region::Pal => &NOISE_PERIOD_PAL,
        };

        let mut next_step = 1u64;
        for tick in 1..=ticks {
            if next_step <= steps && tick == next_step * ticks / steps {
                let last = next_step == steps;
                let four_step_final = last && !self.five_step;
                if !(four_step_final && self.irq_inhibit) {
                    self.clock_quarter_frame();
                }
                if next_step == 2 || last {
                    self.clock_half_frame();
                }
                if four_step_final && !self.irq_inhibit {
                    self.frame_irq = true;
                }
                next_step += 1;
            }

            // Pulse timers run at half the master tick rate
            if tick & 1 == 1 {
                self.pulse1.clock_timer();
                self.pulse2.clock_timer();
            }
            self.triangle.clock_timer();
            self.noise.clock_timer(periods);

            sink.push(self.mix());
        }
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
