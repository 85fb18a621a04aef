//! Arithmetic, logic, shift, and 16-bit operations.
//!
//! 8-bit operations take `(left, right)` and return the value stored back to the left operand.

use crate::core::{Registers, Spc700, StatusRegister};
use crate::traits::BusInterface;
use snes_common::num::{GetBit, SignBit, U16Ext};

#[inline]
fn set_nz(psw: &mut StatusRegister, value: u8) {
    psw.zero = value == 0;
    psw.negative = value.sign_bit();
}

#[inline]
fn set_nz_word(psw: &mut StatusRegister, value: u16) {
    psw.zero = value == 0;
    psw.negative = value.sign_bit();
}

pub(super) fn or(psw: &mut StatusRegister, left: u8, right: u8) -> u8 {
    let result = left | right;
    set_nz(psw, result);
    result
}

pub(super) fn and(psw: &mut StatusRegister, left: u8, right: u8) -> u8 {
    let result = left & right;
    set_nz(psw, result);
    result
}

pub(super) fn eor(psw: &mut StatusRegister, left: u8, right: u8) -> u8 {
    let result = left ^ right;
    set_nz(psw, result);
    result
}

// Leaves the left operand unchanged
pub(super) fn cmp(psw: &mut StatusRegister, left: u8, right: u8) -> u8 {
    psw.carry = left >= right;
    set_nz(psw, left.wrapping_sub(right));
    left
}

pub(super) fn adc(psw: &mut StatusRegister, left: u8, right: u8) -> u8 {
    let carry = u8::from(psw.carry);
    let sum = u16::from(left) + u16::from(right) + u16::from(carry);
    let result = sum as u8;

    psw.carry = sum > 0xFF;
    psw.half_carry = (left & 0x0F) + (right & 0x0F) + carry > 0x0F;
    psw.overflow = !(left ^ right) & (left ^ result) & 0x80 != 0;
    set_nz(psw, result);
    result
}

pub(super) fn sbc(psw: &mut StatusRegister, left: u8, right: u8) -> u8 {
    let borrow = u8::from(!psw.carry);
    let difference = i16::from(left) - i16::from(right) - i16::from(borrow);
    let result = difference as u8;

    psw.carry = difference >= 0;
    psw.half_carry = (left & 0x0F) >= (right & 0x0F) + borrow;
    psw.overflow = (left ^ right) & (left ^ result) & 0x80 != 0;
    set_nz(psw, result);
    result
}

pub(super) fn asl(psw: &mut StatusRegister, value: u8) -> u8 {
    let result = value << 1;
    psw.carry = value.bit(7);
    set_nz(psw, result);
    result
}

pub(super) fn rol(psw: &mut StatusRegister, value: u8) -> u8 {
    let result = (value << 1) | u8::from(psw.carry);
    psw.carry = value.bit(7);
    set_nz(psw, result);
    result
}

pub(super) fn lsr(psw: &mut StatusRegister, value: u8) -> u8 {
    let result = value >> 1;
    psw.carry = value.bit(0);
    set_nz(psw, result);
    result
}

pub(super) fn ror(psw: &mut StatusRegister, value: u8) -> u8 {
    let result = (value >> 1) | (u8::from(psw.carry) << 7);
    psw.carry = value.bit(0);
    set_nz(psw, result);
    result
}

pub(super) fn inc(psw: &mut StatusRegister, value: u8) -> u8 {
    let result = value.wrapping_add(1);
    set_nz(psw, result);
    result
}

pub(super) fn dec(psw: &mut StatusRegister, value: u8) -> u8 {
    let result = value.wrapping_sub(1);
    set_nz(psw, result);
    result
}

fn read_word_operand<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, idle: bool) -> u16 {
    let offset = cpu.fetch(bus);
    let lsb = bus.read(cpu.direct_address(offset));
    if idle {
        bus.idle();
    }
    let msb = bus.read(cpu.direct_address(offset.wrapping_add(1)));
    u16::from_le_bytes([lsb, msb])
}

// INCW / DECW dp: the low byte is written back before the high byte is read
pub(super) fn step_word<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, delta: u16) {
    let offset = cpu.fetch(bus);
    let lsb_address = cpu.direct_address(offset);
    let msb_address = cpu.direct_address(offset.wrapping_add(1));

    let lsb = bus.read(lsb_address);
    bus.write(lsb_address, lsb.wrapping_add(delta as u8));
    let msb = bus.read(msb_address);

    let result = u16::from_le_bytes([lsb, msb]).wrapping_add(delta);
    bus.write(msb_address, result.msb());
    set_nz_word(&mut cpu.registers.psw, result);
}

// ADDW YA, dp
pub(super) fn addw<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let operand = read_word_operand(cpu, bus, true);
    let ya = cpu.registers.ya();
    let (result, carry) = ya.overflowing_add(operand);

    let psw = &mut cpu.registers.psw;
    psw.carry = carry;
    psw.half_carry = (ya & 0x0FFF) + (operand & 0x0FFF) > 0x0FFF;
    psw.overflow = !(ya ^ operand) & (ya ^ result) & 0x8000 != 0;
    set_nz_word(psw, result);
    cpu.registers.set_ya(result);
}

// SUBW YA, dp
pub(super) fn subw<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let operand = read_word_operand(cpu, bus, true);
    let ya = cpu.registers.ya();
    let (result, borrow) = ya.overflowing_sub(operand);

    let psw = &mut cpu.registers.psw;
    psw.carry = !borrow;
    psw.half_carry = (ya & 0x0FFF) >= (operand & 0x0FFF);
    psw.overflow = (ya ^ operand) & (ya ^ result) & 0x8000 != 0;
    set_nz_word(psw, result);
    cpu.registers.set_ya(result);
}

// CMPW YA, dp
pub(super) fn cmpw<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    let operand = read_word_operand(cpu, bus, false);
    let ya = cpu.registers.ya();

    let psw = &mut cpu.registers.psw;
    psw.carry = ya >= operand;
    set_nz_word(psw, ya.wrapping_sub(operand));
}

// MUL YA: flags come from the high byte only
pub(super) fn mul<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    for _ in 0..8 {
        bus.idle();
    }

    let product = u16::from(cpu.registers.y) * u16::from(cpu.registers.a);
    cpu.registers.set_ya(product);
    set_nz(&mut cpu.registers.psw, cpu.registers.y);
}

// DIV YA, X: quotients that do not fit in 9 bits produce the hardware's garbage result
pub(super) fn div<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    for _ in 0..11 {
        bus.idle();
    }

    let ya = u32::from(cpu.registers.ya());
    let x = u32::from(cpu.registers.x);
    let y = cpu.registers.y;

    cpu.registers.psw.overflow = y >= cpu.registers.x;
    cpu.registers.psw.half_carry = y & 0x0F >= cpu.registers.x & 0x0F;

    if u32::from(y) < x << 1 {
        cpu.registers.a = (ya / x) as u8;
        cpu.registers.y = (ya % x) as u8;
    } else {
        let remainder = ya - (x << 9);
        let divisor = 256 - x;
        cpu.registers.a = (255 - remainder / divisor) as u8;
        cpu.registers.y = (x + remainder % divisor) as u8;
    }

    set_nz(&mut cpu.registers.psw, cpu.registers.a);
}

pub(super) fn daa(registers: &mut Registers) {
    let psw = &mut registers.psw;
    if psw.carry || registers.a > 0x99 {
        psw.carry = true;
        registers.a = registers.a.wrapping_add(0x60);
    }
    if psw.half_carry || registers.a & 0x0F > 0x09 {
        registers.a = registers.a.wrapping_add(0x06);
    }
    set_nz(psw, registers.a);
}

pub(super) fn das(registers: &mut Registers) {
    let psw = &mut registers.psw;
    if !psw.carry || registers.a > 0x99 {
        psw.carry = false;
        registers.a = registers.a.wrapping_sub(0x60);
    }
    if !psw.half_carry || registers.a & 0x0F > 0x09 {
        registers.a = registers.a.wrapping_sub(0x06);
    }
    set_nz(psw, registers.a);
}

// XCN: swap the nibbles of A
pub(super) fn xcn<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) {
    for _ in 0..4 {
        bus.idle();
    }

    cpu.registers.a = cpu.registers.a.rotate_left(4);
    set_nz(&mut cpu.registers.psw, cpu.registers.a);
}
