mod alu;
mod flow;
mod load;

use crate::core::{Registers, SoftwareInterrupt, Wdc65816};
use crate::traits::BusInterface;

/// Effective address of an operand, with the wrapping rule for its following bytes.
#[derive(Debug, Clone, Copy)]
enum Address {
    // Offset into the direct page; wraps within bank 0 (or within the page in emulation mode)
    Direct(u16),
    // Offset from DBR:0000; may carry into the next bank
    Bank(u32),
    // Full 24-bit address
    Long(u32),
    // Offset from S; wraps within bank 0
    Stack(u16),
}

impl Address {
    fn byte(self, cpu: &Wdc65816, i: u16) -> u32 {
        match self {
            Self::Direct(offset) => cpu.direct_address(offset.wrapping_add(i)),
            Self::Bank(offset) => cpu.bank_address(offset + u32::from(i)),
            Self::Long(address) => (address + u32::from(i)) & 0xFFFFFF,
            Self::Stack(offset) => cpu.stack_address(offset.wrapping_add(i)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Direct,
    DirectX,
    DirectY,
    DirectIndirect,
    DirectIndexedIndirect,
    DirectIndirectIndexed,
    DirectIndirectLong,
    DirectIndirectLongIndexed,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    AbsoluteLong,
    AbsoluteLongX,
    StackRelative,
    StackRelativeIndirectIndexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

type AluOp = fn(&mut Registers, u16, bool);
type ModifyOp = fn(&mut Registers, u16, bool) -> u16;

fn resolve<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, mode: Mode, access: Access) -> Address {
    match mode {
        Mode::Direct => {
            let offset = cpu.fetch(bus);
            cpu.idle2(bus);
            Address::Direct(offset.into())
        }
        Mode::DirectX | Mode::DirectY => {
            let offset = cpu.fetch(bus);
            cpu.idle2(bus);
            bus.idle();
            let index = if mode == Mode::DirectX { cpu.registers.x } else { cpu.registers.y };
            Address::Direct(u16::from(offset).wrapping_add(index))
        }
        Mode::DirectIndirect => {
            let offset = cpu.fetch(bus);
            cpu.idle2(bus);
            let pointer = read_pointer(cpu, bus, Address::Direct(offset.into()));
            Address::Bank(pointer.into())
        }
        Mode::DirectIndexedIndirect => {
            let offset = cpu.fetch(bus);
            cpu.idle2(bus);
            bus.idle();
            let offset = u16::from(offset).wrapping_add(cpu.registers.x);
            let pointer = read_pointer(cpu, bus, Address::Direct(offset));
            Address::Bank(pointer.into())
        }
        Mode::DirectIndirectIndexed => {
            let offset = cpu.fetch(bus);
            cpu.idle2(bus);
            let pointer = read_pointer(cpu, bus, Address::Direct(offset.into()));
            let y = cpu.registers.y;
            match access {
                Access::Read => cpu.idle4(bus, pointer, pointer.wrapping_add(y)),
                Access::Write => bus.idle(),
            }
            Address::Bank(u32::from(pointer) + u32::from(y))
        }
        Mode::DirectIndirectLong | Mode::DirectIndirectLongIndexed => {
            let offset = u16::from(cpu.fetch(bus));
            cpu.idle2(bus);
            let lsb = bus.read(cpu.direct_address_native(offset));
            let mid = bus.read(cpu.direct_address_native(offset.wrapping_add(1)));
            let bank = bus.read(cpu.direct_address_native(offset.wrapping_add(2)));
            let pointer = u32::from_le_bytes([lsb, mid, bank, 0]);
            let index =
                if mode == Mode::DirectIndirectLongIndexed { u32::from(cpu.registers.y) } else { 0 };
            Address::Long(pointer + index)
        }
        Mode::Absolute => {
            let address = cpu.fetch_u16(bus);
            Address::Bank(address.into())
        }
        Mode::AbsoluteX | Mode::AbsoluteY => {
            let address = cpu.fetch_u16(bus);
            let index = if mode == Mode::AbsoluteX { cpu.registers.x } else { cpu.registers.y };
            match access {
                Access::Read => cpu.idle4(bus, address, address.wrapping_add(index)),
                Access::Write => bus.idle(),
            }
            Address::Bank(u32::from(address) + u32::from(index))
        }
        Mode::AbsoluteLong | Mode::AbsoluteLongX => {
            let address = cpu.fetch_u16(bus);
            let bank = cpu.fetch(bus);
            let index = if mode == Mode::AbsoluteLongX { u32::from(cpu.registers.x) } else { 0 };
            Address::Long(((u32::from(bank) << 16) | u32::from(address)) + index)
        }
        Mode::StackRelative => {
            let offset = cpu.fetch(bus);
            bus.idle();
            Address::Stack(offset.into())
        }
        Mode::StackRelativeIndirectIndexed => {
            let offset = cpu.fetch(bus);
            bus.idle();
            let pointer = read_pointer(cpu, bus, Address::Stack(offset.into()));
            bus.idle();
            Address::Bank(u32::from(pointer) + u32::from(cpu.registers.y))
        }
    }
}

fn read_pointer<B: BusInterface>(cpu: &Wdc65816, bus: &mut B, address: Address) -> u16 {
    let lsb = bus.read(address.byte(cpu, 0));
    let msb = bus.read(address.byte(cpu, 1));
    u16::from_le_bytes([lsb, msb])
}

fn read_operand<B: BusInterface>(
    cpu: &Wdc65816,
    bus: &mut B,
    address: Address,
    wide: bool,
) -> u16 {
    if !wide {
        cpu.last_cycle(bus);
        return bus.read(address.byte(cpu, 0)).into();
    }

    let lsb = bus.read(address.byte(cpu, 0));
    cpu.last_cycle(bus);
    let msb = bus.read(address.byte(cpu, 1));
    u16::from_le_bytes([lsb, msb])
}

fn write_operand<B: BusInterface>(
    cpu: &Wdc65816,
    bus: &mut B,
    address: Address,
    value: u16,
    wide: bool,
) {
    let [lsb, msb] = value.to_le_bytes();
    if wide {
        bus.write(address.byte(cpu, 0), lsb);
        cpu.last_cycle(bus);
        bus.write(address.byte(cpu, 1), msb);
    } else {
        cpu.last_cycle(bus);
        bus.write(address.byte(cpu, 0), lsb);
    }
}

fn read_immediate<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, wide: bool) -> u16 {
    if !wide {
        cpu.last_cycle(bus);
        return cpu.fetch(bus).into();
    }

    let lsb = cpu.fetch(bus);
    cpu.last_cycle(bus);
    let msb = cpu.fetch(bus);
    u16::from_le_bytes([lsb, msb])
}

/// Accumulator-width read instruction (ORA, AND, EOR, ADC, LDA, CMP, SBC, BIT).
fn accumulator_read<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, mode: Option<Mode>, op: AluOp) {
    let wide = cpu.registers.accumulator_wide();
    let value = match mode {
        None => read_immediate(cpu, bus, wide),
        Some(mode) => {
            let address = resolve(cpu, bus, mode, Access::Read);
            read_operand(cpu, bus, address, wide)
        }
    };
    op(&mut cpu.registers, value, wide);
}

/// Index-width read instruction (LDX, LDY, CPX, CPY).
fn index_read<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, mode: Option<Mode>, op: AluOp) {
    let wide = cpu.registers.index_wide();
    let value = match mode {
        None => read_immediate(cpu, bus, wide),
        Some(mode) => {
            let address = resolve(cpu, bus, mode, Access::Read);
            read_operand(cpu, bus, address, wide)
        }
    };
    op(&mut cpu.registers, value, wide);
}

fn store<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, mode: Mode, value: u16, wide: bool) {
    let address = resolve(cpu, bus, mode, Access::Write);
    write_operand(cpu, bus, address, value, wide);
}

/// Read-modify-write on memory (ASL, LSR, ROL, ROR, INC, DEC, TSB, TRB).
fn modify<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, mode: Mode, op: ModifyOp) {
    let wide = cpu.registers.accumulator_wide();
    let address = resolve(cpu, bus, mode, Access::Write);

    let lsb = bus.read(address.byte(cpu, 0));
    let msb = if wide { bus.read(address.byte(cpu, 1)) } else { 0 };
    bus.idle();

    let [lsb, msb] = op(&mut cpu.registers, u16::from_le_bytes([lsb, msb]), wide).to_le_bytes();
    if wide {
        bus.write(address.byte(cpu, 1), msb);
    }
    cpu.last_cycle(bus);
    bus.write(address.byte(cpu, 0), lsb);
}

/// Read-modify-write on the accumulator.
fn modify_accumulator<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, op: ModifyOp) {
    cpu.last_cycle(bus);
    cpu.idle_irq(bus);

    let wide = cpu.registers.accumulator_wide();
    let value = cpu.registers.accumulator(wide);
    let result = op(&mut cpu.registers, value, wide);
    cpu.registers.set_accumulator(result, wide);
}

/// Implied-operand instruction that only touches registers.
fn implied<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, op: fn(&mut Registers)) {
    cpu.last_cycle(bus);
    cpu.idle_irq(bus);
    op(&mut cpu.registers);
}

// Addressing mode of the regular ORA/AND/EOR/ADC/STA/LDA/CMP/SBC opcode column
fn group_one_mode(opcode: u8) -> Option<Mode> {
    match opcode & 0x1F {
        0x01 => Some(Mode::DirectIndexedIndirect),
        0x03 => Some(Mode::StackRelative),
        0x05 => Some(Mode::Direct),
        0x07 => Some(Mode::DirectIndirectLong),
        0x0D => Some(Mode::Absolute),
        0x0F => Some(Mode::AbsoluteLong),
        0x11 => Some(Mode::DirectIndirectIndexed),
        0x12 => Some(Mode::DirectIndirect),
        0x13 => Some(Mode::StackRelativeIndirectIndexed),
        0x15 => Some(Mode::DirectX),
        0x17 => Some(Mode::DirectIndirectLongIndexed),
        0x19 => Some(Mode::AbsoluteY),
        0x1D => Some(Mode::AbsoluteX),
        0x1F => Some(Mode::AbsoluteLongX),
        _ => None,
    }
}

fn execute_group_one<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, opcode: u8) {
    // Immediate operands live in column $09
    let mode = if opcode & 0x1F == 0x09 { None } else { group_one_mode(opcode) };

    let op: AluOp = match opcode >> 5 {
        0 => alu::ora,
        1 => alu::and,
        2 => alu::eor,
        3 => alu::adc,
        4 => {
            let Some(mode) = mode else {
                unreachable!("STA has no immediate form; $89 is decoded as BIT")
            };
            let wide = cpu.registers.accumulator_wide();
            let value = cpu.registers.accumulator(wide);
            store(cpu, bus, mode, value, wide);
            return;
        }
        5 => alu::lda,
        6 => alu::cmp,
        7 => alu::sbc,
        _ => unreachable!("opcode >> 5 is always <= 7"),
    };

    accumulator_read(cpu, bus, mode, op);
}

#[allow(clippy::too_many_lines)]
pub(crate) fn execute<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let opcode = cpu.fetch(bus);

    log::trace!("Executing opcode {opcode:02X} at {:06X}", cpu.pc_address().wrapping_sub(1));

    match opcode {
        // BRK / COP
        0x00 => flow::software_interrupt(cpu, bus, SoftwareInterrupt::Breakpoint),
        0x02 => flow::software_interrupt(cpu, bus, SoftwareInterrupt::Coprocessor),

        // TSB / TRB
        0x04 => modify(cpu, bus, Mode::Direct, alu::tsb),
        0x0C => modify(cpu, bus, Mode::Absolute, alu::tsb),
        0x14 => modify(cpu, bus, Mode::Direct, alu::trb),
        0x1C => modify(cpu, bus, Mode::Absolute, alu::trb),

        // ASL
        0x06 => modify(cpu, bus, Mode::Direct, alu::asl),
        0x0A => modify_accumulator(cpu, bus, alu::asl),
        0x0E => modify(cpu, bus, Mode::Absolute, alu::asl),
        0x16 => modify(cpu, bus, Mode::DirectX, alu::asl),
        0x1E => modify(cpu, bus, Mode::AbsoluteX, alu::asl),

        // ROL
        0x26 => modify(cpu, bus, Mode::Direct, alu::rol),
        0x2A => modify_accumulator(cpu, bus, alu::rol),
        0x2E => modify(cpu, bus, Mode::Absolute, alu::rol),
        0x36 => modify(cpu, bus, Mode::DirectX, alu::rol),
        0x3E => modify(cpu, bus, Mode::AbsoluteX, alu::rol),

        // LSR
        0x46 => modify(cpu, bus, Mode::Direct, alu::lsr),
        0x4A => modify_accumulator(cpu, bus, alu::lsr),
        0x4E => modify(cpu, bus, Mode::Absolute, alu::lsr),
        0x56 => modify(cpu, bus, Mode::DirectX, alu::lsr),
        0x5E => modify(cpu, bus, Mode::AbsoluteX, alu::lsr),

        // ROR
        0x66 => modify(cpu, bus, Mode::Direct, alu::ror),
        0x6A => modify_accumulator(cpu, bus, alu::ror),
        0x6E => modify(cpu, bus, Mode::Absolute, alu::ror),
        0x76 => modify(cpu, bus, Mode::DirectX, alu::ror),
        0x7E => modify(cpu, bus, Mode::AbsoluteX, alu::ror),

        // INC / DEC
        0x1A => modify_accumulator(cpu, bus, alu::inc),
        0x3A => modify_accumulator(cpu, bus, alu::dec),
        0xC6 => modify(cpu, bus, Mode::Direct, alu::dec),
        0xCE => modify(cpu, bus, Mode::Absolute, alu::dec),
        0xD6 => modify(cpu, bus, Mode::DirectX, alu::dec),
        0xDE => modify(cpu, bus, Mode::AbsoluteX, alu::dec),
        0xE6 => modify(cpu, bus, Mode::Direct, alu::inc),
        0xEE => modify(cpu, bus, Mode::Absolute, alu::inc),
        0xF6 => modify(cpu, bus, Mode::DirectX, alu::inc),
        0xFE => modify(cpu, bus, Mode::AbsoluteX, alu::inc),

        // INX / INY / DEX / DEY
        0xE8 => implied(cpu, bus, |r| load::increment_index(r, load::Index::X, 1)),
        0xC8 => implied(cpu, bus, |r| load::increment_index(r, load::Index::Y, 1)),
        0xCA => implied(cpu, bus, |r| load::increment_index(r, load::Index::X, u16::MAX)),
        0x88 => implied(cpu, bus, |r| load::increment_index(r, load::Index::Y, u16::MAX)),

        // BIT
        0x24 => accumulator_read(cpu, bus, Some(Mode::Direct), alu::bit),
        0x2C => accumulator_read(cpu, bus, Some(Mode::Absolute), alu::bit),
        0x34 => accumulator_read(cpu, bus, Some(Mode::DirectX), alu::bit),
        0x3C => accumulator_read(cpu, bus, Some(Mode::AbsoluteX), alu::bit),
        0x89 => accumulator_read(cpu, bus, None, alu::bit_immediate),

        // LDX / LDY / CPX / CPY
        0xA2 => index_read(cpu, bus, None, alu::ldx),
        0xA6 => index_read(cpu, bus, Some(Mode::Direct), alu::ldx),
        0xAE => index_read(cpu, bus, Some(Mode::Absolute), alu::ldx),
        0xB6 => index_read(cpu, bus, Some(Mode::DirectY), alu::ldx),
        0xBE => index_read(cpu, bus, Some(Mode::AbsoluteY), alu::ldx),
        0xA0 => index_read(cpu, bus, None, alu::ldy),
        0xA4 => index_read(cpu, bus, Some(Mode::Direct), alu::ldy),
        0xAC => index_read(cpu, bus, Some(Mode::Absolute), alu::ldy),
        0xB4 => index_read(cpu, bus, Some(Mode::DirectX), alu::ldy),
        0xBC => index_read(cpu, bus, Some(Mode::AbsoluteX), alu::ldy),
        0xE0 => index_read(cpu, bus, None, alu::cpx),
        0xE4 => index_read(cpu, bus, Some(Mode::Direct), alu::cpx),
        0xEC => index_read(cpu, bus, Some(Mode::Absolute), alu::cpx),
        0xC0 => index_read(cpu, bus, None, alu::cpy),
        0xC4 => index_read(cpu, bus, Some(Mode::Direct), alu::cpy),
        0xCC => index_read(cpu, bus, Some(Mode::Absolute), alu::cpy),

        // STX / STY / STZ
        0x86 => load::store_index(cpu, bus, Mode::Direct, load::Index::X),
        0x8E => load::store_index(cpu, bus, Mode::Absolute, load::Index::X),
        0x96 => load::store_index(cpu, bus, Mode::DirectY, load::Index::X),
        0x84 => load::store_index(cpu, bus, Mode::Direct, load::Index::Y),
        0x8C => load::store_index(cpu, bus, Mode::Absolute, load::Index::Y),
        0x94 => load::store_index(cpu, bus, Mode::DirectX, load::Index::Y),
        0x64 => load::store_zero(cpu, bus, Mode::Direct),
        0x74 => load::store_zero(cpu, bus, Mode::DirectX),
        0x9C => load::store_zero(cpu, bus, Mode::Absolute),
        0x9E => load::store_zero(cpu, bus, Mode::AbsoluteX),

        // Flag instructions
        0x18 => implied(cpu, bus, |r| r.p.carry = false),
        0x38 => implied(cpu, bus, |r| r.p.carry = true),
        0x58 => implied(cpu, bus, |r| r.p.irq_disabled = false),
        0x78 => implied(cpu, bus, |r| r.p.irq_disabled = true),
        0xB8 => implied(cpu, bus, |r| r.p.overflow = false),
        0xD8 => implied(cpu, bus, |r| r.p.decimal_mode = false),
        0xF8 => implied(cpu, bus, |r| r.p.decimal_mode = true),
        0xC2 => load::rep_sep(cpu, bus, false),
        0xE2 => load::rep_sep(cpu, bus, true),
        0xFB => implied(cpu, bus, load::xce),

        // Register transfers
        0xAA => implied(cpu, bus, |r| {
            let value = r.a;
            load::transfer_to_index(r, value, load::Index::X);
        }),
        0xA8 => implied(cpu, bus, |r| {
            let value = r.a;
            load::transfer_to_index(r, value, load::Index::Y);
        }),
        0x9B => implied(cpu, bus, |r| {
            let value = r.x;
            load::transfer_to_index(r, value, load::Index::Y);
        }),
        0xBB => implied(cpu, bus, |r| {
            let value = r.y;
            load::transfer_to_index(r, value, load::Index::X);
        }),
        0xBA => implied(cpu, bus, |r| {
            let value = r.s;
            load::transfer_to_index(r, value, load::Index::X);
        }),
        0x8A => implied(cpu, bus, |r| {
            let value = r.x;
            load::transfer_to_accumulator(r, value);
        }),
        0x98 => implied(cpu, bus, |r| {
            let value = r.y;
            load::transfer_to_accumulator(r, value);
        }),
        0x9A => implied(cpu, bus, load::txs),
        0x1B => implied(cpu, bus, load::tcs),
        0x3B => implied(cpu, bus, load::tsc),
        0x5B => implied(cpu, bus, load::tcd),
        0x7B => implied(cpu, bus, load::tdc),
        0xEB => load::xba(cpu, bus),

        // Stack
        0x08 => load::php(cpu, bus),
        0x28 => load::plp(cpu, bus),
        0x48 => load::push_register(cpu, bus, load::StackRegister::A),
        0x68 => load::pull_register(cpu, bus, load::StackRegister::A),
        0xDA => load::push_register(cpu, bus, load::StackRegister::X),
        0xFA => load::pull_register(cpu, bus, load::StackRegister::X),
        0x5A => load::push_register(cpu, bus, load::StackRegister::Y),
        0x7A => load::pull_register(cpu, bus, load::StackRegister::Y),
        0x8B => load::phb(cpu, bus),
        0xAB => load::plb(cpu, bus),
        0x4B => load::phk(cpu, bus),
        0x0B => load::phd(cpu, bus),
        0x2B => load::pld(cpu, bus),
        0xF4 => load::pea(cpu, bus),
        0xD4 => load::pei(cpu, bus),
        0x62 => load::per(cpu, bus),

        // Block moves
        0x44 => load::block_move(cpu, bus, u16::MAX),
        0x54 => load::block_move(cpu, bus, 1),

        // Branches
        0x10 => flow::branch(cpu, bus, |p| !p.negative),
        0x30 => flow::branch(cpu, bus, |p| p.negative),
        0x50 => flow::branch(cpu, bus, |p| !p.overflow),
        0x70 => flow::branch(cpu, bus, |p| p.overflow),
        0x80 => flow::branch(cpu, bus, |_| true),
        0x90 => flow::branch(cpu, bus, |p| !p.carry),
        0xB0 => flow::branch(cpu, bus, |p| p.carry),
        0xD0 => flow::branch(cpu, bus, |p| !p.zero),
        0xF0 => flow::branch(cpu, bus, |p| p.zero),
        0x82 => flow::brl(cpu, bus),

        // Jumps, calls, returns
        0x4C => flow::jmp_absolute(cpu, bus),
        0x5C => flow::jml_long(cpu, bus),
        0x6C => flow::jmp_indirect(cpu, bus),
        0x7C => flow::jmp_indexed_indirect(cpu, bus),
        0xDC => flow::jml_indirect(cpu, bus),
        0x20 => flow::jsr_absolute(cpu, bus),
        0x22 => flow::jsl(cpu, bus),
        0xFC => flow::jsr_indexed_indirect(cpu, bus),
        0x40 => flow::rti(cpu, bus),
        0x60 => flow::rts(cpu, bus),
        0x6B => flow::rtl(cpu, bus),

        // Miscellaneous
        0x42 => {
            // WDM: two-byte NOP
            cpu.last_cycle(bus);
            cpu.fetch(bus);
        }
        0xEA => implied(cpu, bus, |_| {}),
        0xCB => flow::wai(cpu, bus),
        0xDB => flow::stp(cpu, bus),

        _ => execute_group_one(cpu, bus, opcode),
    }
}
