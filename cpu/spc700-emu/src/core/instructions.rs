mod alu;
mod bits;
mod flow;
mod load;

use crate::core::{Registers, Spc700, StatusRegister};
use crate::traits::BusInterface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    // (X)
    XIndirect,
    // (X)+
    XIndirectIncrement,
    Direct,
    DirectX,
    DirectY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    // [dp+X]
    IndexedIndirect,
    // [dp]+Y
    IndirectIndexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Register {
    A,
    X,
    Y,
}

impl Register {
    fn get(self, registers: &Registers) -> u8 {
        match self {
            Self::A => registers.a,
            Self::X => registers.x,
            Self::Y => registers.y,
        }
    }

    fn set(self, registers: &mut Registers, value: u8) {
        match self {
            Self::A => registers.a = value,
            Self::X => registers.x = value,
            Self::Y => registers.y = value,
        }
    }
}

/// Operand pair of a memory-to-memory ALU instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operands {
    // (X),(Y)
    XY,
    // dp,dp
    DirectDirect,
    // dp,#imm
    DirectImmediate,
}

// Takes (left, right) and returns the value stored back to the left operand
type AluOp = fn(&mut StatusRegister, u8, u8) -> u8;
type ModifyOp = fn(&mut StatusRegister, u8) -> u8;

/// Run the addressing cycles of `mode` and return the effective address.
fn resolve<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, mode: Mode, access: Access) -> u16 {
    match mode {
        Mode::XIndirect | Mode::XIndirectIncrement => {
            bus.idle();
            cpu.direct_address(cpu.registers.x)
        }
        Mode::Direct => {
            let offset = cpu.fetch(bus);
            cpu.direct_address(offset)
        }
        Mode::DirectX | Mode::DirectY => {
            let offset = cpu.fetch(bus);
            bus.idle();
            let index = if mode == Mode::DirectX { cpu.registers.x } else { cpu.registers.y };
            cpu.direct_address(offset.wrapping_add(index))
        }
        Mode::Absolute => cpu.fetch_u16(bus),
        Mode::AbsoluteX | Mode::AbsoluteY => {
            let address = cpu.fetch_u16(bus);
            bus.idle();
            let index = if mode == Mode::AbsoluteX { cpu.registers.x } else { cpu.registers.y };
            address.wrapping_add(index.into())
        }
        Mode::IndexedIndirect => {
            let offset = cpu.fetch(bus);
            bus.idle();
            read_pointer(cpu, bus, offset.wrapping_add(cpu.registers.x))
        }
        Mode::IndirectIndexed => {
            let offset = cpu.fetch(bus);
            // Stores spend the internal cycle after the pointer instead of before it
            if access == Access::Read {
                bus.idle();
            }
            let pointer = read_pointer(cpu, bus, offset);
            if access == Access::Write {
                bus.idle();
            }
            pointer.wrapping_add(cpu.registers.y.into())
        }
    }
}

// Both pointer bytes come from the direct page; the high byte wraps within it
fn read_pointer<B: BusInterface>(cpu: &Spc700, bus: &mut B, offset: u8) -> u16 {
    let lsb = bus.read(cpu.direct_address(offset));
    let msb = bus.read(cpu.direct_address(offset.wrapping_add(1)));
    u16::from_le_bytes([lsb, msb])
}

fn read_operand<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, mode: Option<Mode>) -> u8 {
    match mode {
        None => cpu.fetch(bus),
        Some(Mode::XIndirectIncrement) => {
            let address = resolve(cpu, bus, Mode::XIndirect, Access::Read);
            let value = bus.read(address);
            bus.idle();
            cpu.registers.x = cpu.registers.x.wrapping_add(1);
            value
        }
        Some(mode) => {
            let address = resolve(cpu, bus, mode, Access::Read);
            bus.read(address)
        }
    }
}

/// Register-operand read instruction (OR, AND, EOR, CMP, ADC, SBC into A; CMP X/Y). Immediate
/// operands pass `None`.
fn register_read<B: BusInterface>(
    cpu: &mut Spc700,
    bus: &mut B,
    register: Register,
    mode: Option<Mode>,
    op: AluOp,
) {
    let value = read_operand(cpu, bus, mode);
    let current = register.get(&cpu.registers);
    let result = op(&mut cpu.registers.psw, current, value);
    register.set(&mut cpu.registers, result);
}

fn load<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, register: Register, mode: Option<Mode>) {
    let value = read_operand(cpu, bus, mode);
    register.set(&mut cpu.registers, value);
    cpu.registers.set_nz(value);
}

/// Register store. Every store except `(X)+` reads the target before writing it.
fn store<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, mode: Mode, register: Register) {
    let value = register.get(&cpu.registers);

    if mode == Mode::XIndirectIncrement {
        bus.idle();
        bus.idle();
        bus.write(cpu.direct_address(cpu.registers.x), value);
        cpu.registers.x = cpu.registers.x.wrapping_add(1);
        return;
    }

    let address = resolve(cpu, bus, mode, Access::Write);
    bus.read(address);
    bus.write(address, value);
}

/// Memory-to-memory ALU instruction. CMP passes `write = false` and idles instead of writing.
fn memory_op<B: BusInterface>(
    cpu: &mut Spc700,
    bus: &mut B,
    operands: Operands,
    op: AluOp,
    write: bool,
) {
    let (address, left, right) = match operands {
        Operands::XY => {
            bus.idle();
            let right = bus.read(cpu.direct_address(cpu.registers.y));
            let address = cpu.direct_address(cpu.registers.x);
            (address, bus.read(address), right)
        }
        Operands::DirectDirect => {
            let source = cpu.fetch(bus);
            let right = bus.read(cpu.direct_address(source));
            let destination = cpu.fetch(bus);
            let address = cpu.direct_address(destination);
            (address, bus.read(address), right)
        }
        Operands::DirectImmediate => {
            let right = cpu.fetch(bus);
            let destination = cpu.fetch(bus);
            let address = cpu.direct_address(destination);
            (address, bus.read(address), right)
        }
    };

    let result = op(&mut cpu.registers.psw, left, right);
    if write {
        bus.write(address, result);
    } else {
        bus.idle();
    }
}

/// Read-modify-write on memory (ASL, ROL, LSR, ROR, DEC, INC).
fn modify<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, mode: Mode, op: ModifyOp) {
    let address = resolve(cpu, bus, mode, Access::Read);
    let value = bus.read(address);
    let result = op(&mut cpu.registers.psw, value);
    bus.write(address, result);
}

/// Read-modify-write on a register.
fn modify_register<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, register: Register, op: ModifyOp) {
    bus.idle();
    let current = register.get(&cpu.registers);
    let result = op(&mut cpu.registers.psw, current);
    register.set(&mut cpu.registers, result);
}

/// Implied-operand instruction with a single internal cycle.
fn implied<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, op: fn(&mut Registers)) {
    bus.idle();
    op(&mut cpu.registers);
}

// Two internal cycles (NOTC, EI, DI, DAA, DAS)
fn implied_long<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, op: fn(&mut Registers)) {
    bus.idle();
    bus.idle();
    op(&mut cpu.registers);
}

// Rows $00-$BF of columns 4 through 9: OR, AND, EOR, CMP, ADC, SBC on A or memory
fn execute_alu_group<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, opcode: u8) {
    let (op, write): (AluOp, bool) = match opcode >> 5 {
        0 => (alu::or, true),
        1 => (alu::and, true),
        2 => (alu::eor, true),
        3 => (alu::cmp, false),
        4 => (alu::adc, true),
        5 => (alu::sbc, true),
        _ => unreachable!("ALU group only covers opcodes below $C0"),
    };

    let odd_row = opcode & 0x10 != 0;
    let mode = match (opcode & 0x0F, odd_row) {
        (0x04, false) => Some(Mode::Direct),
        (0x04, true) => Some(Mode::DirectX),
        (0x05, false) => Some(Mode::Absolute),
        (0x05, true) => Some(Mode::AbsoluteX),
        (0x06, false) => Some(Mode::XIndirect),
        (0x06, true) => Some(Mode::AbsoluteY),
        (0x07, false) => Some(Mode::IndexedIndirect),
        (0x07, true) => Some(Mode::IndirectIndexed),
        (0x08, false) => None,
        (0x08, true) => return memory_op(cpu, bus, Operands::DirectImmediate, op, write),
        (0x09, false) => return memory_op(cpu, bus, Operands::DirectDirect, op, write),
        (0x09, true) => return memory_op(cpu, bus, Operands::XY, op, write),
        _ => unreachable!("ALU group only covers columns 4 through 9"),
    };

    register_read(cpu, bus, Register::A, mode, op);
}

// Rows $00-$BF of columns B and C: ASL, ROL, LSR, ROR, DEC, INC
fn execute_shift_group<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, opcode: u8) {
    let op: ModifyOp = match opcode >> 5 {
        0 => alu::asl,
        1 => alu::rol,
        2 => alu::lsr,
        3 => alu::ror,
        4 => alu::dec,
        5 => alu::inc,
        _ => unreachable!("shift group only covers opcodes below $C0"),
    };

    match (opcode & 0x0F, opcode & 0x10 != 0) {
        (0x0B, false) => modify(cpu, bus, Mode::Direct, op),
        (0x0B, true) => modify(cpu, bus, Mode::DirectX, op),
        (0x0C, false) => modify(cpu, bus, Mode::Absolute, op),
        (0x0C, true) => modify_register(cpu, bus, Register::A, op),
        _ => unreachable!("shift group only covers columns B and C"),
    }
}

#[allow(clippy::too_many_lines)]
pub(crate) fn execute<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let opcode = cpu.fetch(bus);

    log::trace!("Executing opcode {opcode:02X} at {:04X}", cpu.registers.pc.wrapping_sub(1));

    match opcode {
        0x00 => implied(cpu, bus, |_| {}),

        // TCALL n
        0x01 | 0x11 | 0x21 | 0x31 | 0x41 | 0x51 | 0x61 | 0x71 | 0x81 | 0x91 | 0xA1 | 0xB1
        | 0xC1 | 0xD1 | 0xE1 | 0xF1 => flow::tcall(cpu, bus, opcode >> 4),

        // SET1 / CLR1 dp.bit
        0x02 | 0x12 | 0x22 | 0x32 | 0x42 | 0x52 | 0x62 | 0x72 | 0x82 | 0x92 | 0xA2 | 0xB2
        | 0xC2 | 0xD2 | 0xE2 | 0xF2 => bits::set1(cpu, bus, opcode >> 5, opcode & 0x10 == 0),

        // BBS / BBC dp.bit, rel
        0x03 | 0x13 | 0x23 | 0x33 | 0x43 | 0x53 | 0x63 | 0x73 | 0x83 | 0x93 | 0xA3 | 0xB3
        | 0xC3 | 0xD3 | 0xE3 | 0xF3 => flow::branch_bit(cpu, bus, opcode >> 5, opcode & 0x10 == 0),

        0x00..=0xBF if (0x04..=0x09).contains(&(opcode & 0x0F)) => {
            execute_alu_group(cpu, bus, opcode);
        }
        0x00..=0xBF if (0x0B..=0x0C).contains(&(opcode & 0x0F)) => {
            execute_shift_group(cpu, bus, opcode);
        }

        // Branches
        0x10 => flow::branch(cpu, bus, |p| !p.negative),
        0x30 => flow::branch(cpu, bus, |p| p.negative),
        0x50 => flow::branch(cpu, bus, |p| !p.overflow),
        0x70 => flow::branch(cpu, bus, |p| p.overflow),
        0x90 => flow::branch(cpu, bus, |p| !p.carry),
        0xB0 => flow::branch(cpu, bus, |p| p.carry),
        0xD0 => flow::branch(cpu, bus, |p| !p.zero),
        0xF0 => flow::branch(cpu, bus, |p| p.zero),
        0x2F => flow::branch(cpu, bus, |_| true),
        0x2E => flow::cbne(cpu, bus, Mode::Direct),
        0xDE => flow::cbne(cpu, bus, Mode::DirectX),
        0x6E => flow::dbnz_direct(cpu, bus),
        0xFE => flow::dbnz_y(cpu, bus),

        // Flags
        0x20 => implied(cpu, bus, |r| r.psw.direct_page = false),
        0x40 => implied(cpu, bus, |r| r.psw.direct_page = true),
        0x60 => implied(cpu, bus, |r| r.psw.carry = false),
        0x80 => implied(cpu, bus, |r| r.psw.carry = true),
        0xE0 => implied(cpu, bus, |r| {
            r.psw.overflow = false;
            r.psw.half_carry = false;
        }),
        0xED => implied_long(cpu, bus, |r| r.psw.carry = !r.psw.carry),
        0xA0 => implied_long(cpu, bus, |r| r.psw.interrupt_enabled = true),
        0xC0 => implied_long(cpu, bus, |r| r.psw.interrupt_enabled = false),

        // MOV into A
        0xE8 => load(cpu, bus, Register::A, None),
        0xE4 => load(cpu, bus, Register::A, Some(Mode::Direct)),
        0xF4 => load(cpu, bus, Register::A, Some(Mode::DirectX)),
        0xE5 => load(cpu, bus, Register::A, Some(Mode::Absolute)),
        0xF5 => load(cpu, bus, Register::A, Some(Mode::AbsoluteX)),
        0xE6 => load(cpu, bus, Register::A, Some(Mode::XIndirect)),
        0xF6 => load(cpu, bus, Register::A, Some(Mode::AbsoluteY)),
        0xE7 => load(cpu, bus, Register::A, Some(Mode::IndexedIndirect)),
        0xF7 => load(cpu, bus, Register::A, Some(Mode::IndirectIndexed)),
        0xBF => load(cpu, bus, Register::A, Some(Mode::XIndirectIncrement)),

        // MOV into X / Y
        0xCD => load(cpu, bus, Register::X, None),
        0xF8 => load(cpu, bus, Register::X, Some(Mode::Direct)),
        0xF9 => load(cpu, bus, Register::X, Some(Mode::DirectY)),
        0xE9 => load(cpu, bus, Register::X, Some(Mode::Absolute)),
        0x8D => load(cpu, bus, Register::Y, None),
        0xEB => load(cpu, bus, Register::Y, Some(Mode::Direct)),
        0xFB => load(cpu, bus, Register::Y, Some(Mode::DirectX)),
        0xEC => load(cpu, bus, Register::Y, Some(Mode::Absolute)),

        // MOV into memory
        0xC4 => store(cpu, bus, Mode::Direct, Register::A),
        0xD4 => store(cpu, bus, Mode::DirectX, Register::A),
        0xC5 => store(cpu, bus, Mode::Absolute, Register::A),
        0xD5 => store(cpu, bus, Mode::AbsoluteX, Register::A),
        0xC6 => store(cpu, bus, Mode::XIndirect, Register::A),
        0xD6 => store(cpu, bus, Mode::AbsoluteY, Register::A),
        0xC7 => store(cpu, bus, Mode::IndexedIndirect, Register::A),
        0xD7 => store(cpu, bus, Mode::IndirectIndexed, Register::A),
        0xAF => store(cpu, bus, Mode::XIndirectIncrement, Register::A),
        0xD8 => store(cpu, bus, Mode::Direct, Register::X),
        0xD9 => store(cpu, bus, Mode::DirectY, Register::X),
        0xC9 => store(cpu, bus, Mode::Absolute, Register::X),
        0xCB => store(cpu, bus, Mode::Direct, Register::Y),
        0xDB => store(cpu, bus, Mode::DirectX, Register::Y),
        0xCC => store(cpu, bus, Mode::Absolute, Register::Y),
        0xFA => load::mov_direct_direct(cpu, bus),
        0x8F => load::mov_direct_immediate(cpu, bus),

        // Register transfers
        0x7D => load::transfer(cpu, bus, |r| r.a = r.x, |r| r.a),
        0xDD => load::transfer(cpu, bus, |r| r.a = r.y, |r| r.a),
        0x5D => load::transfer(cpu, bus, |r| r.x = r.a, |r| r.x),
        0xFD => load::transfer(cpu, bus, |r| r.y = r.a, |r| r.y),
        0x9D => load::transfer(cpu, bus, |r| r.x = r.sp, |r| r.x),
        0xBD => implied(cpu, bus, |r| r.sp = r.x),

        // CMP X / CMP Y
        0xC8 => register_read(cpu, bus, Register::X, None, alu::cmp),
        0x3E => register_read(cpu, bus, Register::X, Some(Mode::Direct), alu::cmp),
        0x1E => register_read(cpu, bus, Register::X, Some(Mode::Absolute), alu::cmp),
        0xAD => register_read(cpu, bus, Register::Y, None, alu::cmp),
        0x7E => register_read(cpu, bus, Register::Y, Some(Mode::Direct), alu::cmp),
        0x5E => register_read(cpu, bus, Register::Y, Some(Mode::Absolute), alu::cmp),

        // INC / DEC on X and Y
        0x3D => modify_register(cpu, bus, Register::X, alu::inc),
        0x1D => modify_register(cpu, bus, Register::X, alu::dec),
        0xFC => modify_register(cpu, bus, Register::Y, alu::inc),
        0xDC => modify_register(cpu, bus, Register::Y, alu::dec),

        // 16-bit operations
        0xBA => load::movw_ya_direct(cpu, bus),
        0xDA => load::movw_direct_ya(cpu, bus),
        0x3A => alu::step_word(cpu, bus, 1),
        0x1A => alu::step_word(cpu, bus, u16::MAX),
        0x7A => alu::addw(cpu, bus),
        0x9A => alu::subw(cpu, bus),
        0x5A => alu::cmpw(cpu, bus),

        // Multiply, divide, decimal adjust, nibble swap
        0xCF => alu::mul(cpu, bus),
        0x9E => alu::div(cpu, bus),
        0xDF => implied_long(cpu, bus, alu::daa),
        0xBE => implied_long(cpu, bus, alu::das),
        0x9F => alu::xcn(cpu, bus),

        // Bit operations on absolute addresses
        0x0E => bits::test_and_set(cpu, bus, true),
        0x4E => bits::test_and_set(cpu, bus, false),
        0x4A => bits::and1(cpu, bus, false),
        0x6A => bits::and1(cpu, bus, true),
        0x0A => bits::or1(cpu, bus, |c, bit| c | bit),
        0x2A => bits::or1(cpu, bus, |c, bit| c | !bit),
        0x8A => bits::or1(cpu, bus, |c, bit| c ^ bit),
        0xEA => bits::not1(cpu, bus),
        0xAA => bits::mov1_to_carry(cpu, bus),
        0xCA => bits::mov1_from_carry(cpu, bus),

        // Stack
        0x2D => load::push(cpu, bus, |r| r.a),
        0x4D => load::push(cpu, bus, |r| r.x),
        0x6D => load::push(cpu, bus, |r| r.y),
        0x0D => load::push(cpu, bus, |r| r.psw.into()),
        0xAE => load::pop(cpu, bus, |r, value| r.a = value),
        0xCE => load::pop(cpu, bus, |r, value| r.x = value),
        0xEE => load::pop(cpu, bus, |r, value| r.y = value),
        0x8E => load::pop(cpu, bus, |r, value| r.psw = value.into()),

        // Jumps, calls, returns
        0x5F => flow::jmp_absolute(cpu, bus),
        0x1F => flow::jmp_indexed_indirect(cpu, bus),
        0x3F => flow::call(cpu, bus),
        0x4F => flow::pcall(cpu, bus),
        0x6F => flow::ret(cpu, bus),
        0x7F => flow::reti(cpu, bus),
        0x0F => flow::brk(cpu, bus),

        // SLEEP / STOP
        0xEF | 0xFF => flow::stop(cpu, bus),

        _ => unreachable!("every SPC700 opcode is decoded above"),
    }
}
