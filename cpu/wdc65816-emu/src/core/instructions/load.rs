use crate::core::instructions::{Mode, store};
use crate::core::{Registers, Wdc65816};
use crate::traits::BusInterface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Index {
    X,
    Y,
}

impl Index {
    fn get(self, registers: &Registers) -> u16 {
        match self {
            Self::X => registers.x,
            Self::Y => registers.y,
        }
    }

    fn set(self, registers: &mut Registers, value: u16) {
        match self {
            Self::X => registers.x = value,
            Self::Y => registers.y = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StackRegister {
    A,
    X,
    Y,
}

pub(super) fn increment_index(registers: &mut Registers, index: Index, delta: u16) {
    let wide = registers.index_wide();
    let mask = if wide { 0xFFFF } else { 0x00FF };
    let value = index.get(registers).wrapping_add(delta) & mask;
    index.set(registers, value);
    registers.set_nz(value, wide);
}

// STX / STY
pub(super) fn store_index<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, mode: Mode, index: Index) {
    let wide = cpu.registers.index_wide();
    let value = index.get(&cpu.registers);
    store(cpu, bus, mode, value, wide);
}

// STZ
pub(super) fn store_zero<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, mode: Mode) {
    let wide = cpu.registers.accumulator_wide();
    store(cpu, bus, mode, 0, wide);
}

// REP / SEP
pub(super) fn rep_sep<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, set: bool) {
    let mask = cpu.fetch(bus);
    cpu.last_cycle(bus);
    bus.idle();

    let p = u8::from(cpu.registers.p);
    cpu.registers.set_p(if set { p | mask } else { p & !mask });
}

// XCE
pub(super) fn xce(registers: &mut Registers) {
    let carry = registers.p.carry;
    registers.p.carry = registers.emulation_mode;
    registers.emulation_mode = carry;
    registers.enforce_mode();
}

// TAX / TAY / TXY / TYX / TSX
pub(super) fn transfer_to_index(registers: &mut Registers, value: u16, index: Index) {
    let wide = registers.index_wide();
    let value = if wide { value } else { value & 0x00FF };
    index.set(registers, value);
    registers.set_nz(value, wide);
}

// TXA / TYA
pub(super) fn transfer_to_accumulator(registers: &mut Registers, value: u16) {
    let wide = registers.accumulator_wide();
    registers.set_accumulator(value, wide);
    registers.set_nz(value, wide);
}

// TXS
pub(super) fn txs(registers: &mut Registers) {
    registers.s = if registers.emulation_mode {
        0x0100 | (registers.x & 0x00FF)
    } else {
        registers.x
    };
}

// TCS
pub(super) fn tcs(registers: &mut Registers) {
    registers.s = if registers.emulation_mode {
        0x0100 | (registers.a & 0x00FF)
    } else {
        registers.a
    };
}

// TSC
pub(super) fn tsc(registers: &mut Registers) {
    registers.a = registers.s;
    registers.set_nz(registers.a, true);
}

// TCD
pub(super) fn tcd(registers: &mut Registers) {
    registers.d = registers.a;
    registers.set_nz(registers.d, true);
}

// TDC
pub(super) fn tdc(registers: &mut Registers) {
    registers.a = registers.d;
    registers.set_nz(registers.a, true);
}

// XBA
pub(super) fn xba<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    cpu.last_cycle(bus);
    bus.idle();

    cpu.registers.a = cpu.registers.a.swap_bytes();
    let a = cpu.registers.a;
    cpu.registers.set_nz(a, false);
}

// PHP
pub(super) fn php<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    cpu.last_cycle(bus);
    cpu.push(bus, cpu.registers.p.into());
}

// PLP
pub(super) fn plp<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    bus.idle();
    cpu.last_cycle(bus);
    let p = cpu.pull(bus);
    cpu.registers.set_p(p);
}

impl StackRegister {
    fn wide(self, registers: &Registers) -> bool {
        match self {
            Self::A => registers.accumulator_wide(),
            Self::X | Self::Y => registers.index_wide(),
        }
    }

    fn get(self, registers: &Registers) -> u16 {
        match self {
            Self::A => registers.a,
            Self::X => registers.x,
            Self::Y => registers.y,
        }
    }

    fn set(self, registers: &mut Registers, value: u16, wide: bool) {
        match self {
            Self::A => registers.set_accumulator(value, wide),
            Self::X => registers.x = value,
            Self::Y => registers.y = value,
        }
    }
}

// PHA / PHX / PHY
pub(super) fn push_register<B: BusInterface>(
    cpu: &mut Wdc65816,
    bus: &mut B,
    register: StackRegister,
) {
    bus.idle();

    let wide = register.wide(&cpu.registers);
    let [lsb, msb] = register.get(&cpu.registers).to_le_bytes();
    if wide {
        cpu.push(bus, msb);
    }
    cpu.last_cycle(bus);
    cpu.push(bus, lsb);
}

// PLA / PLX / PLY
pub(super) fn pull_register<B: BusInterface>(
    cpu: &mut Wdc65816,
    bus: &mut B,
    register: StackRegister,
) {
    bus.idle();
    bus.idle();

    let wide = register.wide(&cpu.registers);
    let value = if wide {
        let lsb = cpu.pull(bus);
        cpu.last_cycle(bus);
        let msb = cpu.pull(bus);
        u16::from_le_bytes([lsb, msb])
    } else {
        cpu.last_cycle(bus);
        cpu.pull(bus).into()
    };

    register.set(&mut cpu.registers, value, wide);
    cpu.registers.set_nz(value, wide);
}

// PHB
pub(super) fn phb<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    cpu.last_cycle(bus);
    cpu.push(bus, cpu.registers.dbr);
}

// PHK
pub(super) fn phk<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    cpu.last_cycle(bus);
    cpu.push(bus, cpu.registers.pbr);
}

// PLB
pub(super) fn plb<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    bus.idle();
    cpu.last_cycle(bus);
    let value = cpu.pull_native(bus);
    cpu.fix_emulation_stack();

    cpu.registers.dbr = value;
    cpu.registers.set_nz(value.into(), false);
}

// PHD
pub(super) fn phd<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    let [lsb, msb] = cpu.registers.d.to_le_bytes();
    push_native_u16(cpu, bus, lsb, msb);
}

// PLD
pub(super) fn pld<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    bus.idle();
    let lsb = cpu.pull_native(bus);
    cpu.last_cycle(bus);
    let msb = cpu.pull_native(bus);
    cpu.fix_emulation_stack();

    let value = u16::from_le_bytes([lsb, msb]);
    cpu.registers.d = value;
    cpu.registers.set_nz(value, true);
}

// PEA
pub(super) fn pea<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let [lsb, msb] = cpu.fetch_u16(bus).to_le_bytes();
    push_native_u16(cpu, bus, lsb, msb);
}

// PEI
pub(super) fn pei<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let offset = u16::from(cpu.fetch(bus));
    cpu.idle2(bus);
    let lsb = bus.read(cpu.direct_address_native(offset));
    let msb = bus.read(cpu.direct_address_native(offset.wrapping_add(1)));
    push_native_u16(cpu, bus, lsb, msb);
}

// PER
pub(super) fn per<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let displacement = cpu.fetch_u16(bus);
    bus.idle();
    let [lsb, msb] = cpu.registers.pc.wrapping_add(displacement).to_le_bytes();
    push_native_u16(cpu, bus, lsb, msb);
}

fn push_native_u16<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, lsb: u8, msb: u8) {
    cpu.push_native(bus, msb);
    cpu.last_cycle(bus);
    cpu.push_native(bus, lsb);
    cpu.fix_emulation_stack();
}

// MVN / MVP: move one byte per execution, repeating the instruction until A underflows
pub(super) fn block_move<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B, adjust: u16) {
    let destination_bank = cpu.fetch(bus);
    let source_bank = cpu.fetch(bus);
    cpu.registers.dbr = destination_bank;

    let source = (u32::from(source_bank) << 16) | u32::from(cpu.registers.x);
    let value = bus.read(source);
    let destination = (u32::from(destination_bank) << 16) | u32::from(cpu.registers.y);
    bus.write(destination, value);
    bus.idle();

    let mask = if cpu.registers.index_wide() { 0xFFFF } else { 0x00FF };
    cpu.registers.x = cpu.registers.x.wrapping_add(adjust) & mask;
    cpu.registers.y = cpu.registers.y.wrapping_add(adjust) & mask;

    cpu.last_cycle(bus);
    bus.idle();

    let remaining = cpu.registers.a;
    cpu.registers.a = remaining.wrapping_sub(1);
    if remaining != 0 {
        cpu.registers.pc = cpu.registers.pc.wrapping_sub(3);
    }
}
