use crate::bus::Bus;
use crate::cpu::cpu::{Cpu, RunState};
use crate::cpu::flags::Status;

struct TestBus {
    mem: Box<[u8; 0x10000]>,
    nmi: bool,
    irq: bool,
}

impl TestBus {
    fn new() -> Self {
        Self {
            mem: Box::new([0; 0x10000]),
            nmi: false,
            irq: false,
        }
    }
}

impl Bus for TestBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.mem[addr as usize] = data;
    }

    fn poll_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi)
    }

    fn poll_irq(&mut self) -> bool {
        self.irq
    }
}

/// CPU with the given bytes placed at $8000 and the reset vector pointing
/// there, already reset.
fn cpu_with(program: &[u8]) -> Cpu<TestBus> {
    let mut bus = TestBus::new();
    bus.mem[0x8000..0x8000 + program.len()].copy_from_slice(program);
    bus.mem[0xFFFC] = 0x00;
    bus.mem[0xFFFD] = 0x80;
    let mut cpu = Cpu::new(bus);
    cpu.reset();
    cpu
}

#[test]
fn reset_loads_vector_and_power_on_state() {
    let cpu = cpu_with(&[]);
    assert_eq!(cpu.pc, 0x8000);
    assert_eq!(cpu.sp, 0xFF);
    assert_eq!(cpu.status, Status::I | Status::U);
    assert_eq!(cpu.state, RunState::Running);
}

#[test]
fn lda_immediate_loads_and_sets_flags() {
    let mut cpu = cpu_with(&[0xA9, 0x42, 0xA9, 0x00, 0xA9, 0x80]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.a, 0x42);
    assert!(!cpu.status.contains(Status::Z));

    cpu.step();
    assert!(cpu.status.contains(Status::Z));

    cpu.step();
    assert!(cpu.status.contains(Status::N));
}

#[test]
fn zero_page_x_wraps_within_the_page() {
    // LDX #$10; LDA $F8,X -> $0008, not $0108
    let mut cpu = cpu_with(&[0xA2, 0x10, 0xB5, 0xF8]);
    cpu.bus.mem[0x0008] = 0x77;
    cpu.bus.mem[0x0108] = 0x11;
    cpu.step();
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.a, 0x77);
}

#[test]
fn absolute_x_charges_the_page_cross_penalty() {
    // LDX #$01; LDA $80FF,X
    let mut cpu = cpu_with(&[0xA2, 0x01, 0xBD, 0xFF, 0x80]);
    cpu.step();
    assert_eq!(cpu.step(), 5, "crossing into $8100 costs one extra tick");

    // Same read without a crossing
    let mut cpu = cpu_with(&[0xA2, 0x01, 0xBD, 0x00, 0x81]);
    cpu.step();
    assert_eq!(cpu.step(), 4);
}

#[test]
fn stores_never_take_the_penalty() {
    // LDX #$01; STA $80FF,X
    let mut cpu = cpu_with(&[0xA2, 0x01, 0x9D, 0xFF, 0x80]);
    cpu.step();
    assert_eq!(cpu.step(), 5);
}

#[test]
fn indirect_x_wraps_the_pointer_in_zero_page() {
    // LDX #$05; LDA ($FE,X) -> pointer at $03/$04
    let mut cpu = cpu_with(&[0xA2, 0x05, 0xA1, 0xFE]);
    cpu.bus.mem[0x0003] = 0x34;
    cpu.bus.mem[0x0004] = 0x12;
    cpu.bus.mem[0x1234] = 0x99;
    cpu.step();
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.a, 0x99);
}

#[test]
fn indirect_y_adds_penalty_on_crossing() {
    // LDY #$01; LDA ($10),Y with pointer $80FF
    let mut cpu = cpu_with(&[0xA0, 0x01, 0xB1, 0x10]);
    cpu.bus.mem[0x0010] = 0xFF;
    cpu.bus.mem[0x0011] = 0x80;
    cpu.step();
    assert_eq!(cpu.step(), 6);
}

#[test]
fn adc_sets_carry_and_overflow() {
    // LDA #$7F; ADC #$01 -> 0x80: V set, C clear
    let mut cpu = cpu_with(&[0xA9, 0x7F, 0x69, 0x01, 0xA9, 0xFF, 0x69, 0x01]);
    cpu.step();
    cpu.step();
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.status.contains(Status::V));
    assert!(!cpu.status.contains(Status::C));

    // LDA #$FF; ADC #$01 -> 0x00 with carry (carry was clear)
    cpu.step();
    cpu.step();
    assert_eq!(cpu.a, 0x00);
    assert!(cpu.status.contains(Status::C));
    assert!(cpu.status.contains(Status::Z));
    assert!(!cpu.status.contains(Status::V));
}

#[test]
fn sbc_borrows_through_the_carry() {
    // SEC; LDA #$10; SBC #$08
    let mut cpu = cpu_with(&[0x38, 0xA9, 0x10, 0xE9, 0x08]);
    cpu.step();
    cpu.step();
    cpu.step();
    assert_eq!(cpu.a, 0x08);
    assert!(cpu.status.contains(Status::C), "no borrow");
}

#[test]
fn compare_orders_the_flags() {
    let mut cpu = cpu_with(&[0xA9, 0x40, 0xC9, 0x40, 0xC9, 0x41]);
    cpu.step();
    cpu.step();
    assert!(cpu.status.contains(Status::C));
    assert!(cpu.status.contains(Status::Z));
    cpu.step();
    assert!(!cpu.status.contains(Status::C));
    assert!(cpu.status.contains(Status::N));
}

#[test]
fn branch_costs_scale_with_distance() {
    // BNE +0 with Z clear: taken, same page -> 3
    let mut cpu = cpu_with(&[0xA9, 0x01, 0xD0, 0x00]);
    cpu.step();
    assert_eq!(cpu.step(), 3);

    // BEQ with Z clear: not taken -> 2
    let mut cpu = cpu_with(&[0xA9, 0x01, 0xF0, 0x10]);
    cpu.step();
    assert_eq!(cpu.step(), 2);

    // Taken branch crossing back into $7Fxx -> 4
    let mut cpu = cpu_with(&[0xA9, 0x01, 0xD0, 0x80]);
    cpu.step();
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.pc, 0x7F84);
}

#[test]
fn jmp_indirect_reproduces_the_page_boundary_bug() {
    // JMP ($10FF): high byte comes from $1000, not $1100
    let mut cpu = cpu_with(&[0x6C, 0xFF, 0x10]);
    cpu.bus.mem[0x10FF] = 0x34;
    cpu.bus.mem[0x1000] = 0x12;
    cpu.bus.mem[0x1100] = 0x56;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.pc, 0x1234);
}

#[test]
fn jsr_rts_round_trip() {
    // JSR $9000 ... $9000: RTS
    let mut cpu = cpu_with(&[0x20, 0x00, 0x90]);
    cpu.bus.mem[0x9000] = 0x60;
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.pc, 0x9000);
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.pc, 0x8003);
    assert_eq!(cpu.sp, 0xFF);
}

#[test]
fn rmw_modifies_memory_in_place() {
    // INC $10; ASL $10
    let mut cpu = cpu_with(&[0xE6, 0x10, 0x06, 0x10]);
    cpu.bus.mem[0x0010] = 0x41;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.bus.mem[0x0010], 0x42);
    cpu.step();
    assert_eq!(cpu.bus.mem[0x0010], 0x84);
    assert!(cpu.status.contains(Status::N));
}

#[test]
fn rotates_move_the_carry_through() {
    // SEC; ROL A with A=0 -> 1; ROR A -> carry out
    let mut cpu = cpu_with(&[0x38, 0x2A, 0x6A]);
    cpu.step();
    cpu.step();
    assert_eq!(cpu.a, 0x01);
    assert!(!cpu.status.contains(Status::C));
    cpu.step();
    assert_eq!(cpu.a, 0x00);
    assert!(cpu.status.contains(Status::C));
}

#[test]
fn stack_wraps_within_page_one() {
    let mut cpu = cpu_with(&[0x48, 0x48]); // PHA, PHA
    cpu.sp = 0x00;
    cpu.a = 0xAB;
    cpu.step();
    assert_eq!(cpu.sp, 0xFF);
    assert_eq!(cpu.bus.mem[0x0100], 0xAB);
    cpu.step();
    assert_eq!(cpu.bus.mem[0x01FF], 0xAB);
}

#[test]
fn undefined_opcode_is_terminal() {
    let mut cpu = cpu_with(&[0x02, 0xA9, 0x42]); // $02 is not documented
    assert_eq!(cpu.step(), 0);
    assert_eq!(cpu.state, RunState::Error);
    assert!(!cpu.clock(), "clock refuses to run in Error state");
    assert_eq!(cpu.a, 0, "nothing executes after the fault");
}

#[test]
fn irq_pushes_frame_and_rti_restores_it() {
    // CLI; NOP; handler at $9000: RTI
    let mut cpu = cpu_with(&[0x58, 0xEA, 0xEA]);
    cpu.bus.mem[0xFFFE] = 0x00;
    cpu.bus.mem[0xFFFF] = 0x90;
    cpu.bus.mem[0x9000] = 0x40;
    cpu.step(); // CLI
    let before_pc = cpu.pc;
    let before_status = cpu.status;

    assert_eq!(cpu.irq(), 7);
    assert_eq!(cpu.pc, 0x9000);
    assert!(cpu.status.contains(Status::I), "entry masks interrupts");
    // Stack frame: PCH, PCL, then status
    assert_eq!(cpu.bus.mem[0x01FF], (before_pc >> 8) as u8);
    assert_eq!(cpu.bus.mem[0x01FE], before_pc as u8);
    assert_eq!(
        cpu.bus.mem[0x01FD],
        ((before_status - Status::B) | Status::U).bits()
    );

    cpu.step(); // RTI
    assert_eq!(cpu.pc, before_pc);
    assert_eq!(cpu.status, before_status);
    assert_eq!(cpu.sp, 0xFF);
}

#[test]
fn irq_is_ignored_while_masked() {
    let mut cpu = cpu_with(&[0xEA]);
    assert!(cpu.status.contains(Status::I));
    assert_eq!(cpu.irq(), 0);
    assert_eq!(cpu.pc, 0x8000);
}

#[test]
fn nmi_fires_regardless_of_the_mask() {
    let mut cpu = cpu_with(&[0xEA]);
    cpu.bus.mem[0xFFFA] = 0x00;
    cpu.bus.mem[0xFFFB] = 0xA0;
    assert_eq!(cpu.nmi(), 7);
    assert_eq!(cpu.pc, 0xA000);
}

#[test]
fn brk_vectors_through_fffe_with_b_set() {
    let mut cpu = cpu_with(&[0x00, 0xFF]); // BRK + padding
    cpu.bus.mem[0xFFFE] = 0x00;
    cpu.bus.mem[0xFFFF] = 0x90;
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x9000);
    // Pushed return address skips the padding byte
    assert_eq!(cpu.bus.mem[0x01FF], 0x80);
    assert_eq!(cpu.bus.mem[0x01FE], 0x02);
    assert!(cpu.bus.mem[0x01FD] & Status::B.bits() != 0);
}

#[test]
fn clock_polls_nmi_from_the_bus() {
    let mut cpu = cpu_with(&[0xEA]);
    cpu.bus.mem[0xFFFA] = 0x00;
    cpu.bus.mem[0xFFFB] = 0xA0;
    cpu.bus.mem[0xA000] = 0xEA;
    cpu.bus.nmi = true;
    cpu.clock();
    // NMI ran first, then the instruction at the vector target
    assert_eq!(cpu.pc, 0xA001);
}

#[test]
fn frame_budget_rolls_over() {
    // A 2-tick instruction loop: frame ends after ceil(29830 / 2) steps
    let mut cpu = cpu_with(&[]);
    cpu.bus.mem[0x8000..0x8006].copy_from_slice(&[0xA9, 0x01, 0x4C, 0x00, 0x80, 0x00]);
    let mut steps = 0u32;
    while !cpu.clock() {
        steps += 1;
        assert!(steps < 40_000, "frame never ended");
    }
    // LDA(2) + JMP(3) alternate; 29830 ticks / 5 per pair
    assert!((11_000..12_500).contains(&steps));
}

#[test]
fn bit_copies_the_operand_flags() {
    let mut cpu = cpu_with(&[0xA9, 0x01, 0x24, 0x10]);
    cpu.bus.mem[0x0010] = 0xC0;
    cpu.step();
    cpu.step();
    assert!(cpu.status.contains(Status::N));
    assert!(cpu.status.contains(Status::V));
    assert!(cpu.status.contains(Status::Z), "A & operand == 0");
}
