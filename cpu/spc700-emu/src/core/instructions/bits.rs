//! Single-bit instructions.
//!
//! The absolute-bit forms encode `bit:address` in their 16-bit operand, the bit number in the top
//! three bits and a 13-bit address below it.

use crate::core::Spc700;
use crate::traits::BusInterface;
use snes_common::num::{GetBit, SignBit};

fn fetch_bit_address<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> (u16, u8) {
    let operand = cpu.fetch_u16(bus);
    (operand & 0x1FFF, (operand >> 13) as u8)
}

// SET1 / CLR1 dp.bit
pub(super) fn set1<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, bit: u8, set: bool) {
    let offset = cpu.fetch(bus);
    let address = cpu.direct_address(offset);
    let value = bus.read(address);
    let mask = 1 << bit;
    bus.write(address, if set { value | mask } else { value & !mask });
}

// TSET1 / TCLR1 abs: flags compare A against the original value
pub(super) fn test_and_set<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, set: bool) {
    let address = cpu.fetch_u16(bus);
    let value = bus.read(address);
    bus.read(address);

    let a = cpu.registers.a;
    let difference = a.wrapping_sub(value);
    cpu.registers.psw.zero = difference == 0;
    cpu.registers.psw.negative = difference.sign_bit();

    bus.write(address, if set { value | a } else { value & !a });
}

// AND1 C, [/]abs.bit
pub(super) fn and1<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, inverted: bool) {
    let (address, bit) = fetch_bit_address(cpu, bus);
    let value = bus.read(address).bit(bit) ^ inverted;
    cpu.registers.psw.carry &= value;
}

// OR1 / EOR1 C, [/]abs.bit
pub(super) fn or1<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, op: fn(bool, bool) -> bool) {
    let (address, bit) = fetch_bit_address(cpu, bus);
    let value = bus.read(address).bit(bit);
    bus.idle();
    cpu.registers.psw.carry = op(cpu.registers.psw.carry, value);
}

// NOT1 abs.bit
pub(super) fn not1<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let (address, bit) = fetch_bit_address(cpu, bus);
    let value = bus.read(address);
    bus.write(address, value ^ (1 << bit));
}

// MOV1 C, abs.bit
pub(super) fn mov1_to_carry<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let (address, bit) = fetch_bit_address(cpu, bus);
    cpu.registers.psw.carry = bus.read(address).bit(bit);
}

// MOV1 abs.bit, C
pub(super) fn mov1_from_carry<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let (address, bit) = fetch_bit_address(cpu, bus);
    let value = bus.read(address);
    bus.idle();

    let mask = 1 << bit;
    let value = if cpu.registers.psw.carry { value | mask } else { value & !mask };
    bus.write(address, value);
}
