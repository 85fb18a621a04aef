use super::{Access, Mode, resolve};
use crate::core::{Spc700, StatusRegister};
use crate::traits::BusInterface;
use snes_common::num::GetBit;

const BRK_VECTOR: u16 = 0xFFDE;

// Taken branches spend two more cycles
fn take_branch<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, offset: u8) {
    bus.idle();
    bus.idle();
    cpu.registers.pc = cpu.registers.pc.wrapping_add(offset as i8 as u16);
}

pub(super) fn branch<B: BusInterface>(
    cpu: &mut Spc700,
    bus: &mut B,
    condition: fn(&StatusRegister) -> bool,
) {
    let offset = cpu.fetch(bus);
    if condition(&cpu.registers.psw) {
        take_branch(cpu, bus, offset);
    }
}

// BBS / BBC dp.bit, rel
pub(super) fn branch_bit<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, bit: u8, set: bool) {
    let offset = cpu.fetch(bus);
    let value = bus.read(cpu.direct_address(offset));
    bus.idle();
    let displacement = cpu.fetch(bus);

    if value.bit(bit) == set {
        take_branch(cpu, bus, displacement);
    }
}

// CBNE dp, rel / CBNE dp+X, rel
pub(super) fn cbne<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, mode: Mode) {
    let address = resolve(cpu, bus, mode, Access::Read);
    let value = bus.read(address);
    bus.idle();
    let displacement = cpu.fetch(bus);

    if cpu.registers.a != value {
        take_branch(cpu, bus, displacement);
    }
}

// DBNZ dp, rel
pub(super) fn dbnz_direct<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let offset = cpu.fetch(bus);
    let address = cpu.direct_address(offset);
    let value = bus.read(address).wrapping_sub(1);
    bus.write(address, value);
    let displacement = cpu.fetch(bus);

    if value != 0 {
        take_branch(cpu, bus, displacement);
    }
}

// DBNZ Y, rel
pub(super) fn dbnz_y<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    bus.idle();
    bus.idle();
    let displacement = cpu.fetch(bus);
    cpu.registers.y = cpu.registers.y.wrapping_sub(1);

    if cpu.registers.y != 0 {
        take_branch(cpu, bus, displacement);
    }
}

// JMP abs
pub(super) fn jmp_absolute<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    cpu.registers.pc = cpu.fetch_u16(bus);
}

// JMP [abs+X]
pub(super) fn jmp_indexed_indirect<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let address = cpu.fetch_u16(bus).wrapping_add(cpu.registers.x.into());
    bus.idle();
    let lsb = bus.read(address);
    let msb = bus.read(address.wrapping_add(1));
    cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
}

fn push_pc<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let [pc_lsb, pc_msb] = cpu.registers.pc.to_le_bytes();
    cpu.push(bus, pc_msb);
    cpu.push(bus, pc_lsb);
}

// CALL abs
pub(super) fn call<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let target = cpu.fetch_u16(bus);
    bus.idle();
    push_pc(cpu, bus);
    bus.idle();
    bus.idle();
    cpu.registers.pc = target;
}

// PCALL up: call into the uppermost page
pub(super) fn pcall<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let offset = cpu.fetch(bus);
    bus.idle();
    push_pc(cpu, bus);
    bus.idle();
    cpu.registers.pc = u16::from_le_bytes([offset, 0xFF]);
}

fn jump_to_vector<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, vector: u16) {
    let lsb = bus.read(vector);
    let msb = bus.read(vector.wrapping_add(1));
    cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
}

// TCALL n: vectors count down from $FFDE
pub(super) fn tcall<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, n: u8) {
    bus.read(cpu.registers.pc);
    bus.idle();
    push_pc(cpu, bus);
    bus.idle();
    jump_to_vector(cpu, bus, BRK_VECTOR - 2 * u16::from(n));
}

// BRK shares TCALL 0's vector
pub(super) fn brk<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    bus.idle();
    push_pc(cpu, bus);
    cpu.push(bus, cpu.registers.psw.into());
    bus.idle();
    jump_to_vector(cpu, bus, BRK_VECTOR);

    cpu.registers.psw.break_flag = true;
    cpu.registers.psw.interrupt_enabled = false;
}

pub(super) fn ret<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    bus.idle();
    bus.idle();
    let lsb = cpu.pull(bus);
    let msb = cpu.pull(bus);
    cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
}

pub(super) fn reti<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    bus.idle();
    bus.idle();
    cpu.registers.psw = cpu.pull(bus).into();
    let lsb = cpu.pull(bus);
    let msb = cpu.pull(bus);
    cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
}

// SLEEP / STOP: there are no SPC700 interrupts to wake from, so both halt until reset
pub(super) fn stop<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    bus.idle();
    cpu.stopped = true;
}
