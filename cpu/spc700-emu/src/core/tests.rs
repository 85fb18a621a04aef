use super::*;
use test_log::test;

struct TestBus {
    memory: Vec<u8>,
    cycles: u32,
    reads: Vec<u16>,
    writes: Vec<(u16, u8)>,
}

impl TestBus {
    fn new() -> Self {
        Self { memory: vec![0; 0x10000], cycles: 0, reads: Vec::new(), writes: Vec::new() }
    }

    fn load(&mut self, address: u16, bytes: &[u8]) {
        let start = address as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl BusInterface for TestBus {
    fn read(&mut self, address: u16) -> u8 {
        self.cycles += 1;
        self.reads.push(address);
        self.memory[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.cycles += 1;
        self.writes.push((address, value));
        self.memory[address as usize] = value;
    }

    fn idle(&mut self) {
        self.cycles += 1;
    }
}

fn cpu_at(pc: u16) -> Spc700 {
    let mut cpu = Spc700::new();
    let mut registers = cpu.registers().clone();
    registers.pc = pc;
    cpu.set_registers(registers);
    cpu
}

// Execute one instruction and return the number of bus cycles it took, opcode fetch included
fn step(cpu: &mut Spc700, bus: &mut TestBus) -> u32 {
    let before = bus.cycles;
    cpu.execute_instruction(bus);
    bus.cycles - before
}

#[test]
fn reset_loads_vector_and_initial_registers() {
    let mut bus = TestBus::new();
    bus.load(RESET_VECTOR, &[0xC0, 0xFF]);

    let mut cpu = Spc700::new();
    cpu.reset(&mut bus);

    let registers = cpu.registers();
    assert_eq!(registers.pc, 0xFFC0);
    assert_eq!(registers.sp, 0xEF);
    assert_eq!(u8::from(registers.psw), 0x02);
    assert_eq!(bus.reads, vec![0xFFFE, 0xFFFF]);
}

#[test]
fn psw_round_trips_through_u8() {
    for value in [0x00_u8, 0x02, 0x20, 0x80, 0xA5, 0xFF] {
        assert_eq!(u8::from(StatusRegister::from(value)), value);
    }
}

#[test]
fn adc_sets_half_carry_and_overflow() {
    let mut bus = TestBus::new();
    // MOV A,#$78 ; ADC A,#$08 ; ADC A,#$10
    bus.load(0x0200, &[0xE8, 0x78, 0x88, 0x08, 0x88, 0x10]);
    let mut cpu = cpu_at(0x0200);

    step(&mut cpu, &mut bus);
    assert_eq!(step(&mut cpu, &mut bus), 2);
    let registers = cpu.registers();
    assert_eq!(registers.a, 0x80);
    assert!(registers.psw.half_carry);
    assert!(registers.psw.overflow);
    assert!(registers.psw.negative);
    assert!(!registers.psw.carry);

    step(&mut cpu, &mut bus);
    let registers = cpu.registers();
    assert_eq!(registers.a, 0x90);
    assert!(!registers.psw.half_carry);
    assert!(!registers.psw.overflow);
}

#[test]
fn sbc_borrows_when_carry_is_clear() {
    let mut bus = TestBus::new();
    // MOV A,#$10 ; CLRC ; SBC A,#$01
    bus.load(0x0200, &[0xE8, 0x10, 0x60, 0xA8, 0x01]);
    let mut cpu = cpu_at(0x0200);

    for _ in 0..3 {
        step(&mut cpu, &mut bus);
    }

    let registers = cpu.registers();
    assert_eq!(registers.a, 0x0E);
    assert!(registers.psw.carry);
    assert!(!registers.psw.half_carry);
    assert!(!registers.psw.zero);
}

#[test]
fn instruction_cycle_counts() {
    let cases: &[(&str, &[u8], u32)] = &[
        ("NOP", &[0x00], 2),
        ("MOV A,#imm", &[0xE8, 0x01], 2),
        ("MOV A,(X)", &[0xE6], 3),
        ("MOV A,(X)+", &[0xBF], 4),
        ("MOV A,dp", &[0xE4, 0x10], 3),
        ("MOV A,dp+X", &[0xF4, 0x10], 4),
        ("MOV A,abs", &[0xE5, 0x00, 0x03], 4),
        ("MOV A,abs+Y", &[0xF6, 0x00, 0x03], 5),
        ("MOV A,[dp+X]", &[0xE7, 0x10], 6),
        ("MOV A,[dp]+Y", &[0xF7, 0x10], 6),
        ("MOV dp,A", &[0xC4, 0x10], 4),
        ("MOV abs+X,A", &[0xD5, 0x00, 0x03], 6),
        ("MOV [dp]+Y,A", &[0xD7, 0x10], 7),
        ("MOV (X)+,A", &[0xAF], 4),
        ("MOV dp,dp", &[0xFA, 0x10, 0x11], 5),
        ("MOV dp,#imm", &[0x8F, 0x01, 0x10], 5),
        ("OR (X),(Y)", &[0x19], 5),
        ("AND dp,dp", &[0x29, 0x10, 0x11], 6),
        ("ASL A", &[0x1C], 2),
        ("ROL dp+X", &[0x3B, 0x10], 5),
        ("INC abs", &[0xAC, 0x00, 0x03], 5),
        ("PUSH A", &[0x2D], 4),
        ("POP X", &[0xCE], 4),
        ("MOVW YA,dp", &[0xBA, 0x10], 5),
        ("MOVW dp,YA", &[0xDA, 0x10], 5),
        ("INCW dp", &[0x3A, 0x10], 6),
        ("ADDW YA,dp", &[0x7A, 0x10], 5),
        ("CMPW YA,dp", &[0x5A, 0x10], 4),
        ("MUL YA", &[0xCF], 9),
        ("DIV YA,X", &[0x9E], 12),
        ("XCN A", &[0x9F], 5),
        ("DAA A", &[0xDF], 3),
        ("EI", &[0xA0], 3),
        ("SET1 dp.0", &[0x02, 0x10], 4),
        ("TSET1 abs", &[0x0E, 0x00, 0x03], 6),
        ("OR1 C,abs.bit", &[0x0A, 0x00, 0x03], 5),
        ("MOV1 abs.bit,C", &[0xCA, 0x00, 0x03], 6),
        ("JMP abs", &[0x5F, 0x00, 0x03], 3),
        ("JMP [abs+X]", &[0x1F, 0x00, 0x03], 6),
        ("CALL abs", &[0x3F, 0x00, 0x03], 8),
        ("PCALL up", &[0x4F, 0x10], 6),
        ("TCALL 0", &[0x01], 8),
        ("BRK", &[0x0F], 8),
        ("RET", &[0x6F], 5),
        ("RETI", &[0x7F], 6),
        // Z is set after reset
        ("BNE not taken", &[0xD0, 0x10], 2),
        ("BEQ taken", &[0xF0, 0x10], 4),
        ("BBS not taken", &[0x03, 0x10, 0x10], 5),
        ("BBC taken", &[0x13, 0x10, 0x10], 7),
        ("DBNZ Y taken", &[0xFE, 0x10], 6),
    ];

    for &(name, program, expected) in cases {
        let mut bus = TestBus::new();
        bus.load(0x0200, program);
        let mut cpu = cpu_at(0x0200);

        assert_eq!(step(&mut cpu, &mut bus), expected, "{name}");
    }
}

#[test]
fn stores_read_before_writing() {
    let mut bus = TestBus::new();
    // MOV A,#$5A ; MOV $0300,A
    bus.load(0x0200, &[0xE8, 0x5A, 0xC5, 0x00, 0x03]);
    let mut cpu = cpu_at(0x0200);

    step(&mut cpu, &mut bus);
    bus.reads.clear();
    step(&mut cpu, &mut bus);

    assert_eq!(bus.reads, vec![0x0202, 0x0203, 0x0204, 0x0300]);
    assert_eq!(bus.writes, vec![(0x0300, 0x5A)]);
}

#[test]
fn direct_page_flag_selects_page_one() {
    let mut bus = TestBus::new();
    bus.load(0x0010, &[0x11]);
    bus.load(0x0110, &[0x22]);
    // MOV A,$10 ; SETP ; MOV A,$10
    bus.load(0x0200, &[0xE4, 0x10, 0x40, 0xE4, 0x10]);
    let mut cpu = cpu_at(0x0200);

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.registers().a, 0x11);

    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.registers().a, 0x22);
}

#[test]
fn memory_compare_does_not_write() {
    let mut bus = TestBus::new();
    bus.load(0x0010, &[0x40]);
    // CMP $10,#$40
    bus.load(0x0200, &[0x78, 0x40, 0x10]);
    let mut cpu = cpu_at(0x0200);

    assert_eq!(step(&mut cpu, &mut bus), 5);
    assert!(bus.writes.is_empty());
    assert!(cpu.registers().psw.zero);
    assert!(cpu.registers().psw.carry);
}

#[test]
fn mul_and_div() {
    let mut bus = TestBus::new();
    // MOV A,#$34 ; MOV Y,#$12 ; MUL YA
    bus.load(0x0200, &[0xE8, 0x34, 0x8D, 0x12, 0xCF]);
    let mut cpu = cpu_at(0x0200);
    for _ in 0..3 {
        step(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.registers().ya(), 0x12 * 0x34);

    let mut registers = cpu.registers().clone();
    registers.set_ya(0x1234);
    registers.x = 0x56;
    registers.pc = 0x0300;
    cpu.set_registers(registers);
    bus.load(0x0300, &[0x9E, 0x9E]);

    step(&mut cpu, &mut bus);
    let registers = cpu.registers();
    assert_eq!(registers.a, (0x1234 / 0x56) as u8);
    assert_eq!(registers.y, (0x1234 % 0x56) as u8);
    assert!(!registers.psw.overflow);

    // Quotient overflows 9 bits
    let mut registers = cpu.registers().clone();
    registers.set_ya(0xFF00);
    registers.x = 0x01;
    cpu.set_registers(registers);

    step(&mut cpu, &mut bus);
    let registers = cpu.registers();
    assert!(registers.psw.overflow);
    assert_eq!(registers.a, (255 - (0xFF00 - 0x200) / 255) as u8);
    assert_eq!(registers.y, (1 + (0xFF00 - 0x200) % 255) as u8);
}

#[test]
fn decimal_adjust_after_addition() {
    let mut bus = TestBus::new();
    // MOV A,#$19 ; CLRC ; ADC A,#$28 ; DAA A
    bus.load(0x0200, &[0xE8, 0x19, 0x60, 0x88, 0x28, 0xDF]);
    let mut cpu = cpu_at(0x0200);

    for _ in 0..4 {
        step(&mut cpu, &mut bus);
    }

    assert_eq!(cpu.registers().a, 0x47);
    assert!(!cpu.registers().psw.carry);
}

#[test]
fn incw_carries_into_high_byte() {
    let mut bus = TestBus::new();
    bus.load(0x0010, &[0xFF, 0x12]);
    // INCW $10
    bus.load(0x0200, &[0x3A, 0x10]);
    let mut cpu = cpu_at(0x0200);

    step(&mut cpu, &mut bus);

    assert_eq!(bus.writes, vec![(0x0010, 0x00), (0x0011, 0x13)]);
    assert!(!cpu.registers().psw.zero);
    assert!(!cpu.registers().psw.negative);
}

#[test]
fn addw_and_subw_update_ya() {
    let mut bus = TestBus::new();
    bus.load(0x0010, &[0x01, 0x80]);
    // ADDW YA,$10 ; SUBW YA,$10
    bus.load(0x0200, &[0x7A, 0x10, 0x9A, 0x10]);
    let mut cpu = cpu_at(0x0200);
    let mut registers = cpu.registers().clone();
    registers.set_ya(0x7FFF);
    cpu.set_registers(registers);

    step(&mut cpu, &mut bus);
    let registers = cpu.registers();
    assert_eq!(registers.ya(), 0x0000);
    assert!(registers.psw.carry);
    assert!(registers.psw.zero);
    assert!(registers.psw.half_carry);
    assert!(!registers.psw.overflow);

    step(&mut cpu, &mut bus);
    let registers = cpu.registers();
    assert_eq!(registers.ya(), 0x7FFF);
    assert!(!registers.psw.carry);
    assert!(!registers.psw.overflow);
    assert!(!registers.psw.zero);
}

#[test]
fn call_and_ret_use_page_one_stack() {
    let mut bus = TestBus::new();
    // CALL $0300
    bus.load(0x0200, &[0x3F, 0x00, 0x03]);
    // RET
    bus.load(0x0300, &[0x6F]);
    let mut cpu = cpu_at(0x0200);

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.registers().pc, 0x0300);
    assert_eq!(cpu.registers().sp, 0xED);
    assert_eq!(bus.writes, vec![(0x01EF, 0x02), (0x01EE, 0x03)]);

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.registers().pc, 0x0203);
    assert_eq!(cpu.registers().sp, 0xEF);
}

#[test]
fn tcall_and_brk_vectors() {
    let mut bus = TestBus::new();
    // TCALL 15 reads $FFC0, TCALL 1 reads $FFDC, BRK reads $FFDE
    bus.load(0xFFC0, &[0x00, 0x04]);
    bus.load(0xFFDC, &[0x00, 0x05, 0x00, 0x06]);
    bus.load(0x0200, &[0xF1]);
    bus.load(0x0400, &[0x11]);
    bus.load(0x0500, &[0x0F]);
    let mut cpu = cpu_at(0x0200);

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.registers().pc, 0x0400);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.registers().pc, 0x0500);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.registers().pc, 0x0600);
    assert!(cpu.registers().psw.break_flag);
    assert!(!cpu.registers().psw.interrupt_enabled);
}

#[test]
fn dbnz_and_cbne_loop() {
    let mut bus = TestBus::new();
    bus.load(0x0010, &[0x03]);
    // loop: DBNZ $10,loop
    bus.load(0x0200, &[0x6E, 0x10, 0xFD]);
    let mut cpu = cpu_at(0x0200);

    for _ in 0..3 {
        step(&mut cpu, &mut bus);
    }
    assert_eq!(bus.memory[0x0010], 0x00);
    assert_eq!(cpu.registers().pc, 0x0203);

    // CBNE $11,+2 with A == ($11) falls through
    bus.load(0x0011, &[0x00]);
    bus.load(0x0203, &[0x2E, 0x11, 0x02]);
    assert_eq!(step(&mut cpu, &mut bus), 5);
    assert_eq!(cpu.registers().pc, 0x0206);
}

#[test]
fn bit_instructions() {
    let mut bus = TestBus::new();
    bus.load(0x0300, &[0b0000_0100]);
    bus.load(
        0x0200,
        &[
            // MOV1 C,$0300.2
            0xAA, 0x00, 0x43,
            // NOT1 $0300.2
            0xEA, 0x00, 0x43,
            // MOV1 $0300.7,C
            0xCA, 0x00, 0xE3,
            // MOV A,#$81 ; TSET1 $0300
            0xE8, 0x81, 0x0E, 0x00, 0x03,
            // CLR1 $10.0 ; SET1 $10.3
            0x12, 0x10, 0x62, 0x10,
        ],
    );
    let mut cpu = cpu_at(0x0200);

    step(&mut cpu, &mut bus);
    assert!(cpu.registers().psw.carry);

    step(&mut cpu, &mut bus);
    assert_eq!(bus.memory[0x0300], 0x00);

    step(&mut cpu, &mut bus);
    assert_eq!(bus.memory[0x0300], 0x80);

    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(bus.memory[0x0300], 0x81);
    // A - original value = $01
    assert!(!cpu.registers().psw.zero);
    assert!(!cpu.registers().psw.negative);

    bus.memory[0x0010] = 0x01;
    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(bus.memory[0x0010], 0x08);
}

#[test]
fn indirect_increment_addressing() {
    let mut bus = TestBus::new();
    // MOV X,#$20 ; MOV A,#$AB ; MOV (X)+,A ; MOV (X)+,A ; MOV X,#$20 ; MOV A,(X)+
    bus.load(0x0200, &[0xCD, 0x20, 0xE8, 0xAB, 0xAF, 0xAF, 0xCD, 0x20, 0xBF]);
    let mut cpu = cpu_at(0x0200);

    for _ in 0..4 {
        step(&mut cpu, &mut bus);
    }
    assert_eq!(&bus.memory[0x20..0x22], &[0xAB, 0xAB]);
    assert_eq!(cpu.registers().x, 0x22);

    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.registers().a, 0xAB);
    assert_eq!(cpu.registers().x, 0x21);
}

#[test]
fn stop_idles_until_reset() {
    let mut bus = TestBus::new();
    bus.load(0x0200, &[0xFF, 0xE8, 0x01]);
    bus.load(RESET_VECTOR, &[0x01, 0x02]);
    let mut cpu = cpu_at(0x0200);

    step(&mut cpu, &mut bus);
    assert!(cpu.is_stopped());

    for _ in 0..4 {
        assert_eq!(step(&mut cpu, &mut bus), 1);
    }
    assert_eq!(cpu.registers().pc, 0x0201);

    cpu.reset(&mut bus);
    assert!(!cpu.is_stopped());
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.registers().a, 0x01);
}
