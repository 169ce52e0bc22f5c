//! 6502 interpreter: the documented instruction set only.
//!
//! One `step` fetches and executes a single instruction and returns its
//! tick cost (base cycles plus any page-cross penalty). `clock` charges
//! that cost against a per-frame tick budget sized by the video standard;
//! when the budget rolls over, the frame is complete and the caller runs
//! the end-of-frame video/audio work.
//!
//! Any opcode outside the documented set moves the CPU into the terminal
//! `Error` state; nothing executes after that.

use crate::bus::Bus;
use crate::cpu::flags::Status;
use crate::region::Region;

/// Execution state. `Halted` is the pre-reset state; `Error` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Halted,
    Running,
    Error,
}

/// Operand addressing modes of the documented instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    IndirectX,
    IndirectY,
}

pub struct Cpu<B: Bus> {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: Status,
    pub state: RunState,
    pub bus: B,
    region: Region,
    /// Ticks left in the current frame; replenished on rollover.
    budget: i64,
    /// Page-cross / branch penalty accumulated by the current instruction.
    extra_cycles: u8,
}

impl<B: Bus> Cpu<B> {
    pub fn new(bus: B) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFF,
            pc: 0,
            status: Status::power_on(),
            state: RunState::Halted,
            bus,
            region: Region::Ntsc,
            budget: 0,
            extra_cycles: 0,
        }
    }

    /// Adopt a video standard; takes effect at the next budget reload.
    pub fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    /// Power-on / reset sequence: registers cleared, stack pointer at the
    /// top of page 1, program counter from the reset vector.
    pub fn reset(&mut self) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFF;
        self.status = Status::power_on();
        let lo = self.bus.read(0xFFFC) as u16;
        let hi = self.bus.read(0xFFFD) as u16;
        self.pc = (hi << 8) | lo;
        self.budget = self.region.ticks_per_frame() as i64;
        self.extra_cycles = 0;
        self.state = RunState::Running;
    }

    /// Run one instruction against the frame budget. Returns true when the
    /// budget rolled over, i.e. the frame is complete.
    pub fn clock(&mut self) -> bool {
        if self.state != RunState::Running {
            tracing::warn!(state = ?self.state, "clock while not running");
            return false;
        }
        if self.bus.poll_nmi() {
            self.budget -= self.nmi() as i64;
        } else if self.bus.poll_irq() {
            self.budget -= self.irq() as i64;
        }
        self.budget -= self.step() as i64;
        if self.budget <= 0 {
            self.budget += self.region.ticks_per_frame() as i64;
            return true;
        }
        false
    }

    /// Maskable interrupt entry: honored only while I is clear. Returns
    /// the tick cost (0 when masked).
    pub fn irq(&mut self) -> u8 {
        if self.status.contains(Status::I) {
            return 0;
        }
        self.interrupt(0xFFFE)
    }

    /// Non-maskable interrupt entry.
    pub fn nmi(&mut self) -> u8 {
        self.interrupt(0xFFFA)
    }

    fn interrupt(&mut self, vector: u16) -> u8 {
        self.push((self.pc >> 8) as u8);
        self.push(self.pc as u8);
        self.push(((self.status - Status::B) | Status::U).bits());
        self.status.insert(Status::I);
        let lo = self.bus.read(vector) as u16;
        let hi = self.bus.read(vector + 1) as u16;
        self.pc = (hi << 8) | lo;
        7
    }

    fn fetch_byte(&mut self) -> u8 {
        let byte = self.bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        (hi << 8) | lo
    }

    fn push(&mut self, value: u8) {
        self.bus.write(0x0100 | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.bus.read(0x0100 | self.sp as u16)
    }

    /// Resolve the operand address; indexed modes that can cross a page
    /// record the one-tick penalty in `extra_cycles`.
    fn operand_addr(&mut self, mode: Mode) -> u16 {
        match mode {
            Mode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                addr
            }
            Mode::ZeroPage => self.fetch_byte() as u16,
            Mode::ZeroPageX => self.fetch_byte().wrapping_add(self.x) as u16,
            Mode::ZeroPageY => self.fetch_byte().wrapping_add(self.y) as u16,
            Mode::Absolute => self.fetch_word(),
            Mode::AbsoluteX => {
                let base = self.fetch_word();
                let addr = base.wrapping_add(self.x as u16);
                if addr & 0xFF00 != base & 0xFF00 {
                    self.extra_cycles += 1;
                }
                addr
            }
            Mode::AbsoluteY => {
                let base = self.fetch_word();
                let addr = base.wrapping_add(self.y as u16);
                if addr & 0xFF00 != base & 0xFF00 {
                    self.extra_cycles += 1;
                }
                addr
            }
            Mode::IndirectX => {
                let ptr = self.fetch_byte().wrapping_add(self.x);
                let lo = self.bus.read(ptr as u16) as u16;
                let hi = self.bus.read(ptr.wrapping_add(1) as u16) as u16;
                (hi << 8) | lo
            }
            Mode::IndirectY => {
                let ptr = self.fetch_byte();
                let lo = self.bus.read(ptr as u16) as u16;
                let hi = self.bus.read(ptr.wrapping_add(1) as u16) as u16;
                let base = (hi << 8) | lo;
                let addr = base.wrapping_add(self.y as u16);
                if addr & 0xFF00 != base & 0xFF00 {
                    self.extra_cycles += 1;
                }
                addr
            }
        }
    }

    /// Operand address for stores and read-modify-write instructions,
    /// whose fixed cycle counts already cover the indexed access.
    fn operand_addr_fixed(&mut self, mode: Mode) -> u16 {
        let addr = self.operand_addr(mode);
        self.extra_cycles = 0;
        addr
    }

    fn read_operand(&mut self, mode: Mode) -> u8 {
        let addr = self.operand_addr(mode);
        self.bus.read(addr)
    }

    fn set_zn(&mut self, value: u8) {
        self.status.set(Status::Z, value == 0);
        self.status.set(Status::N, value & 0x80 != 0);
    }

    // --- load / store / transfer ---

    fn lda(&mut self, mode: Mode) {
        self.a = self.read_operand(mode);
        self.set_zn(self.a);
    }

    fn ldx(&mut self, mode: Mode) {
        self.x = self.read_operand(mode);
        self.set_zn(self.x);
    }

    fn ldy(&mut self, mode: Mode) {
        self.y = self.read_operand(mode);
        self.set_zn(self.y);
    }

    fn sta(&mut self, mode: Mode) {
        let addr = self.operand_addr_fixed(mode);
        self.bus.write(addr, self.a);
    }

    fn stx(&mut self, mode: Mode) {
        let addr = self.operand_addr_fixed(mode);
        self.bus.write(addr, self.x);
    }

    fn sty(&mut self, mode: Mode) {
        let addr = self.operand_addr_fixed(mode);
        self.bus.write(addr, self.y);
    }

    // --- arithmetic / logic ---

    fn adc_value(&mut self, value: u8) {
        let carry = self.status.contains(Status::C) as u16;
        let sum = self.a as u16 + value as u16 + carry;
        let result = sum as u8;
        self.status.set(Status::C, sum > 0xFF);
        self.status
            .set(Status::V, (self.a ^ result) & (value ^ result) & 0x80 != 0);
        self.a = result;
        self.set_zn(result);
    }

    fn adc(&mut self, mode: Mode) {
        let value = self.read_operand(mode);
        self.adc_value(value);
    }

    fn sbc(&mut self, mode: Mode) {
        let value = self.read_operand(mode);
        self.adc_value(!value);
    }

    fn and(&mut self, mode: Mode) {
        self.a &= self.read_operand(mode);
        self.set_zn(self.a);
    }

    fn ora(&mut self, mode: Mode) {
        self.a |= self.read_operand(mode);
        self.set_zn(self.a);
    }

    fn eor(&mut self, mode: Mode) {
        self.a ^= self.read_operand(mode);
        self.set_zn(self.a);
    }

    fn compare(&mut self, reg: u8, mode: Mode) {
        let value = self.read_operand(mode);
        self.status.set(Status::C, reg >= value);
        self.set_zn(reg.wrapping_sub(value));
    }

    fn bit(&mut self, mode: Mode) {
        let value = self.read_operand(mode);
        self.status.set(Status::Z, self.a & value == 0);
        self.status.set(Status::V, value & 0x40 != 0);
        self.status.set(Status::N, value & 0x80 != 0);
    }

    // --- increments / decrements ---

    fn inc(&mut self, mode: Mode) {
        let addr = self.operand_addr_fixed(mode);
        let value = self.bus.read(addr).wrapping_add(1);
        self.bus.write(addr, value);
        self.set_zn(value);
    }

    fn dec(&mut self, mode: Mode) {
        let addr = self.operand_addr_fixed(mode);
        let value = self.bus.read(addr).wrapping_sub(1);
        self.bus.write(addr, value);
        self.set_zn(value);
    }

    // --- shifts / rotates ---

    fn asl_value(&mut self, value: u8) -> u8 {
        self.status.set(Status::C, value & 0x80 != 0);
        let result = value << 1;
        self.set_zn(result);
        result
    }

    fn lsr_value(&mut self, value: u8) -> u8 {
        self.status.set(Status::C, value & 1 != 0);
        let result = value >> 1;
        self.set_zn(result);
        result
    }

    fn rol_value(&mut self, value: u8) -> u8 {
        let carry_in = self.status.contains(Status::C) as u8;
        self.status.set(Status::C, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.set_zn(result);
        result
    }

    fn ror_value(&mut self, value: u8) -> u8 {
        let carry_in = (self.status.contains(Status::C) as u8) << 7;
        self.status.set(Status::C, value & 1 != 0);
        let result = (value >> 1) | carry_in;
        self.set_zn(result);
        result
    }

    fn modify(&mut self, mode: Mode, op: fn(&mut Self, u8) -> u8) {
        let addr = self.operand_addr_fixed(mode);
        let value = self.bus.read(addr);
        let result = op(self, value);
        self.bus.write(addr, result);
    }

    // --- control flow ---

    fn branch(&mut self, taken: bool) {
        let offset = self.fetch_byte() as i8;
        if taken {
            self.extra_cycles += 1;
            let target = self.pc.wrapping_add(offset as u16);
            if target & 0xFF00 != self.pc & 0xFF00 {
                self.extra_cycles += 1;
            }
            self.pc = target;
        }
    }

    fn jmp_indirect(&mut self) {
        let ptr = self.fetch_word();
        let lo = self.bus.read(ptr) as u16;
        // Hardware bug: the high byte is fetched from the same page
        let hi_addr = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
        let hi = self.bus.read(hi_addr) as u16;
        self.pc = (hi << 8) | lo;
    }

    fn jsr(&mut self) {
        let target = self.fetch_word();
        let ret = self.pc.wrapping_sub(1);
        self.push((ret >> 8) as u8);
        self.push(ret as u8);
        self.pc = target;
    }

    fn rts(&mut self) {
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        self.pc = ((hi << 8) | lo).wrapping_add(1);
    }

    fn brk(&mut self) {
        let ret = self.pc.wrapping_add(1);
        self.push((ret >> 8) as u8);
        self.push(ret as u8);
        self.push((self.status | Status::B | Status::U).bits());
        self.status.insert(Status::I);
        let lo = self.bus.read(0xFFFE) as u16;
        let hi = self.bus.read(0xFFFF) as u16;
        self.pc = (hi << 8) | lo;
    }

    fn rti(&mut self) {
        let bits = self.pop();
        self.status = (Status::from_bits_retain(bits) - Status::B) | Status::U;
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        self.pc = (hi << 8) | lo;
    }

    /// Execute one instruction; returns its total tick cost. An opcode
    /// outside the documented set is terminal.
    pub fn step(&mut self) -> u8 {
        use Mode::*;
        if self.state == RunState::Error {
            return 0;
        }
        self.extra_cycles = 0;
        let pc = self.pc;
        let opcode = self.fetch_byte();
        let base: u8 = match opcode {
            // Loads
            0xA9 => { self.lda(Immediate); 2 }
            0xA5 => { self.lda(ZeroPage); 3 }
            0xB5 => { self.lda(ZeroPageX); 4 }
            0xAD => { self.lda(Absolute); 4 }
            0xBD => { self.lda(AbsoluteX); 4 }
            0xB9 => { self.lda(AbsoluteY); 4 }
            0xA1 => { self.lda(IndirectX); 6 }
            0xB1 => { self.lda(IndirectY); 5 }
            0xA2 => { self.ldx(Immediate); 2 }
            0xA6 => { self.ldx(ZeroPage); 3 }
            0xB6 => { self.ldx(ZeroPageY); 4 }
            0xAE => { self.ldx(Absolute); 4 }
            0xBE => { self.ldx(AbsoluteY); 4 }
            0xA0 => { self.ldy(Immediate); 2 }
            0xA4 => { self.ldy(ZeroPage); 3 }
            0xB4 => { self.ldy(ZeroPageX); 4 }
            0xAC => { self.ldy(Absolute); 4 }
            0xBC => { self.ldy(AbsoluteX); 4 }
            // Stores
            0x85 => { self.sta(ZeroPage); 3 }
            0x95 => { self.sta(ZeroPageX); 4 }
            0x8D => { self.sta(Absolute); 4 }
            0x9D => { self.sta(AbsoluteX); 5 }
            0x99 => { self.sta(AbsoluteY); 5 }
            0x81 => { self.sta(IndirectX); 6 }
            0x91 => { self.sta(IndirectY); 6 }
            0x86 => { self.stx(ZeroPage); 3 }
            0x96 => { self.stx(ZeroPageY); 4 }
            0x8E => { self.stx(Absolute); 4 }
            0x84 => { self.sty(ZeroPage); 3 }
            0x94 => { self.sty(ZeroPageX); 4 }
            0x8C => { self.sty(Absolute); 4 }
            // Transfers
            0xAA => { self.x = self.a; self.set_zn(self.x); 2 }
            0xA8 => { self.y = self.a; self.set_zn(self.y); 2 }
            0x8A => { self.a = self.x; self.set_zn(self.a); 2 }
            0x98 => { self.a = self.y; self.set_zn(self.a); 2 }
            0xBA => { self.x = self.sp; self.set_zn(self.x); 2 }
            0x9A => { self.sp = self.x; 2 }
            // Stack
            0x48 => { self.push(self.a); 3 }
            0x08 => { self.push((self.status | Status::B | Status::U).bits()); 3 }
            0x68 => { self.a = self.pop(); let a = self.a; self.set_zn(a); 4 }
            0x28 => {
                let bits = self.pop();
                self.status = (Status::from_bits_retain(bits) - Status::B) | Status::U;
                4
            }
            // Logic
            0x29 => { self.and(Immediate); 2 }
            0x25 => { self.and(ZeroPage); 3 }
            0x35 => { self.and(ZeroPageX); 4 }
            0x2D => { self.and(Absolute); 4 }
            0x3D => { self.and(AbsoluteX); 4 }
            0x39 => { self.and(AbsoluteY); 4 }
            0x21 => { self.and(IndirectX); 6 }
            0x31 => { self.and(IndirectY); 5 }
            0x09 => { self.ora(Immediate); 2 }
            0x05 => { self.ora(ZeroPage); 3 }
            0x15 => { self.ora(ZeroPageX); 4 }
            0x0D => { self.ora(Absolute); 4 }
            0x1D => { self.ora(AbsoluteX); 4 }
            0x19 => { self.ora(AbsoluteY); 4 }
            0x01 => { self.ora(IndirectX); 6 }
            0x11 => { self.ora(IndirectY); 5 }
            0x49 => { self.eor(Immediate); 2 }
            0x45 => { self.eor(ZeroPage); 3 }
            0x55 => { self.eor(ZeroPageX); 4 }
            0x4D => { self.eor(Absolute); 4 }
            0x5D => { self.eor(AbsoluteX); 4 }
            0x59 => { self.eor(AbsoluteY); 4 }
            0x41 => { self.eor(IndirectX); 6 }
            0x51 => { self.eor(IndirectY); 5 }
            0x24 => { self.bit(ZeroPage); 3 }
            0x2C => { self.bit(Absolute); 4 }
            // Arithmetic
            0x69 => { self.adc(Immediate); 2 }
            0x65 => { self.adc(ZeroPage); 3 }
            0x75 => { self.adc(ZeroPageX); 4 }
            0x6D => { self.adc(Absolute); 4 }
            0x7D => { self.adc(AbsoluteX); 4 }
            0x79 => { self.adc(AbsoluteY); 4 }
            0x61 => { self.adc(IndirectX); 6 }
            0x71 => { self.adc(IndirectY); 5 }
            0xE9 => { self.sbc(Immediate); 2 }
            0xE5 => { self.sbc(ZeroPage); 3 }
            0xF5 => { self.sbc(ZeroPageX); 4 }
            0xED => { self.sbc(Absolute); 4 }
            0xFD => { self.sbc(AbsoluteX); 4 }
            0xF9 => { self.sbc(AbsoluteY); 4 }
            0xE1 => { self.sbc(IndirectX); 6 }
            0xF1 => { self.sbc(IndirectY); 5 }
            // Compares
            0xC9 => { self.compare(self.a, Immediate); 2 }
            0xC5 => { self.compare(self.a, ZeroPage); 3 }
            0xD5 => { self.compare(self.a, ZeroPageX); 4 }
            0xCD => { self.compare(self.a, Absolute); 4 }
            0xDD => { self.compare(self.a, AbsoluteX); 4 }
            0xD9 => { self.compare(self.a, AbsoluteY); 4 }
            0xC1 => { self.compare(self.a, IndirectX); 6 }
            0xD1 => { self.compare(self.a, IndirectY); 5 }
            0xE0 => { self.compare(self.x, Immediate); 2 }
            0xE4 => { self.compare(self.x, ZeroPage); 3 }
            0xEC => { self.compare(self.x, Absolute); 4 }
            0xC0 => { self.compare(self.y, Immediate); 2 }
            0xC4 => { self.compare(self.y, ZeroPage); 3 }
            0xCC => { self.compare(self.y, Absolute); 4 }
            // Increments / decrements
            0xE6 => { self.inc(ZeroPage); 5 }
            0xF6 => { self.inc(ZeroPageX); 6 }
            0xEE => { self.inc(Absolute); 6 }
            0xFE => { self.inc(AbsoluteX); 7 }
            0xC6 => { self.dec(ZeroPage); 5 }
            0xD6 => { self.dec(ZeroPageX); 6 }
            0xCE => { self.dec(Absolute); 6 }
            0xDE => { self.dec(AbsoluteX); 7 }
            0xE8 => { self.x = self.x.wrapping_add(1); self.set_zn(self.x); 2 }
            0xC8 => { self.y = self.y.wrapping_add(1); self.set_zn(self.y); 2 }
            0xCA => { self.x = self.x.wrapping_sub(1); self.set_zn(self.x); 2 }
            0x88 => { self.y = self.y.wrapping_sub(1); self.set_zn(self.y); 2 }
            // Shifts / rotates
            0x0A => { self.a = self.asl_value(self.a); 2 }
            0x06 => { self.modify(ZeroPage, Self::asl_value); 5 }
            0x16 => { self.modify(ZeroPageX, Self::asl_value); 6 }
            0x0E => { self.modify(Absolute, Self::asl_value); 6 }
            0x1E => { self.modify(AbsoluteX, Self::asl_value); 7 }
            0x4A => { self.a = self.lsr_value(self.a); 2 }
            0x46 => { self.modify(ZeroPage, Self::lsr_value); 5 }
            0x56 => { self.modify(ZeroPageX, Self::lsr_value); 6 }
            0x4E => { self.modify(Absolute, Self::lsr_value); 6 }
            0x5E => { self.modify(AbsoluteX, Self::lsr_value); 7 }
            0x2A => { self.a = self.rol_value(self.a); 2 }
            0x26 => { self.modify(ZeroPage, Self::rol_value); 5 }
            0x36 => { self.modify(ZeroPageX, Self::rol_value); 6 }
            0x2E => { self.modify(Absolute, Self::rol_value); 6 }
            0x3E => { self.modify(AbsoluteX, Self::rol_value); 7 }
            0x6A => { self.a = self.ror_value(self.a); 2 }
            0x66 => { self.modify(ZeroPage, Self::ror_value); 5 }
            0x76 => { self.modify(ZeroPageX, Self::ror_value); 6 }
            0x6E => { self.modify(Absolute, Self::ror_value); 6 }
            0x7E => { self.modify(AbsoluteX, Self::ror_value); 7 }
            // Jumps / subroutines
            0x4C => { self.pc = self.fetch_word(); 3 }
            0x6C => { self.jmp_indirect(); 5 }
            0x20 => { self.jsr(); 6 }
            0x60 => { self.rts(); 6 }
            0x00 => { self.brk(); 7 }
            0x40 => { self.rti(); 6 }
            // Branches
            0x90 => { self.branch(!self.status.contains(Status::C)); 2 }
            0xB0 => { self.branch(self.status.contains(Status::C)); 2 }
            0xD0 => { self.branch(!self.status.contains(Status::Z)); 2 }
            0xF0 => { self.branch(self.status.contains(Status::Z)); 2 }
            0x10 => { self.branch(!self.status.contains(Status::N)); 2 }
            0x30 => { self.branch(self.status.contains(Status::N)); 2 }
            0x50 => { self.branch(!self.status.contains(Status::V)); 2 }
            0x70 => { self.branch(self.status.contains(Status::V)); 2 }
            // Flag operations
            0x18 => { self.status.remove(Status::C); 2 }
            0x38 => { self.status.insert(Status::C); 2 }
            0x58 => { self.status.remove(Status::I); 2 }
            0x78 => { self.status.insert(Status::I); 2 }
            0xD8 => { self.status.remove(Status::D); 2 }
            0xF8 => { self.status.insert(Status::D); 2 }
            0xB8 => { self.status.remove(Status::V); 2 }
            0xEA => 2, // NOP
            _ => {
                tracing::error!(opcode, pc, "undefined opcode");
                self.state = RunState::Error;
                0
            }
        };
        base + std::mem::take(&mut self.extra_cycles)
    }
}
