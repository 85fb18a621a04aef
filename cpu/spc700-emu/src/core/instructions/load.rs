use crate::core::{Registers, Spc700};
use crate::traits::BusInterface;

// MOV dp, dp: the destination is not read first
pub(super) fn mov_direct_direct<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let source = cpu.fetch(bus);
    let value = bus.read(cpu.direct_address(source));
    let destination = cpu.fetch(bus);
    bus.write(cpu.direct_address(destination), value);
}

// MOV dp, #imm
pub(super) fn mov_direct_immediate<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let value = cpu.fetch(bus);
    let destination = cpu.fetch(bus);
    let address = cpu.direct_address(destination);
    bus.read(address);
    bus.write(address, value);
}

/// Register-to-register MOV that sets N and Z from the destination.
pub(super) fn transfer<B: BusInterface>(
    cpu: &mut Spc700,
    bus: &mut B,
    op: fn(&mut Registers),
    destination: fn(&Registers) -> u8,
) {
    bus.idle();
    op(&mut cpu.registers);
    let value = destination(&cpu.registers);
    cpu.registers.set_nz(value);
}

// MOVW YA, dp: Z covers both bytes, N comes from Y
pub(super) fn movw_ya_direct<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let offset = cpu.fetch(bus);
    let lsb = bus.read(cpu.direct_address(offset));
    bus.idle();
    let msb = bus.read(cpu.direct_address(offset.wrapping_add(1)));

    let value = u16::from_le_bytes([lsb, msb]);
    cpu.registers.set_ya(value);
    cpu.registers.psw.zero = value == 0;
    cpu.registers.psw.negative = msb & 0x80 != 0;
}

// MOVW dp, YA
pub(super) fn movw_direct_ya<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let offset = cpu.fetch(bus);
    let lsb_address = cpu.direct_address(offset);
    bus.read(lsb_address);
    bus.write(lsb_address, cpu.registers.a);
    bus.write(cpu.direct_address(offset.wrapping_add(1)), cpu.registers.y);
}

pub(super) fn push<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, value: fn(&Registers) -> u8) {
    bus.idle();
    let value = value(&cpu.registers);
    cpu.push(bus, value);
    bus.idle();
}

pub(super) fn pop<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, op: fn(&mut Registers, u8)) {
    bus.idle();
    bus.idle();
    let value = cpu.pull(bus);
    op(&mut cpu.registers, value);
}
