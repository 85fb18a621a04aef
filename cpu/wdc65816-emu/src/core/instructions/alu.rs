//! Arithmetic, logic, compare, and shift operations.
//!
//! Every operation takes the operand as a `u16` and a `wide` flag; 8-bit operations only look at
//! and only modify the low byte.

use crate::core::Registers;
use snes_common::num::{GetBit, SignBit};

#[inline]
fn mask(wide: bool) -> u16 {
    if wide { 0xFFFF } else { 0x00FF }
}

#[inline]
fn sign(value: u16, wide: bool) -> bool {
    if wide { value.sign_bit() } else { value.bit(7) }
}

pub(super) fn ora(registers: &mut Registers, value: u16, wide: bool) {
    let result = registers.accumulator(wide) | value;
    registers.set_accumulator(result, wide);
    registers.set_nz(result, wide);
}

pub(super) fn and(registers: &mut Registers, value: u16, wide: bool) {
    let result = registers.accumulator(wide) & value;
    registers.set_accumulator(result, wide);
    registers.set_nz(result, wide);
}

pub(super) fn eor(registers: &mut Registers, value: u16, wide: bool) {
    let result = registers.accumulator(wide) ^ value;
    registers.set_accumulator(result, wide);
    registers.set_nz(result, wide);
}

pub(super) fn lda(registers: &mut Registers, value: u16, wide: bool) {
    registers.set_accumulator(value, wide);
    registers.set_nz(value, wide);
}

pub(super) fn ldx(registers: &mut Registers, value: u16, wide: bool) {
    registers.x = value & mask(wide);
    registers.set_nz(value, wide);
}

pub(super) fn ldy(registers: &mut Registers, value: u16, wide: bool) {
    registers.y = value & mask(wide);
    registers.set_nz(value, wide);
}

fn compare(registers: &mut Registers, register: u16, value: u16, wide: bool) {
    let register = register & mask(wide);
    let value = value & mask(wide);
    let result = register.wrapping_sub(value) & mask(wide);

    registers.p.carry = register >= value;
    registers.set_nz(result, wide);
}

pub(super) fn cmp(registers: &mut Registers, value: u16, wide: bool) {
    let register = registers.a;
    compare(registers, register, value, wide);
}

pub(super) fn cpx(registers: &mut Registers, value: u16, wide: bool) {
    let register = registers.x;
    compare(registers, register, value, wide);
}

pub(super) fn cpy(registers: &mut Registers, value: u16, wide: bool) {
    let register = registers.y;
    compare(registers, register, value, wide);
}

pub(super) fn bit(registers: &mut Registers, value: u16, wide: bool) {
    registers.p.zero = registers.accumulator(wide) & value & mask(wide) == 0;
    registers.p.negative = sign(value, wide);
    registers.p.overflow = if wide { value.bit(14) } else { value.bit(6) };
}

// BIT #imm only affects the Z flag
pub(super) fn bit_immediate(registers: &mut Registers, value: u16, wide: bool) {
    registers.p.zero = registers.accumulator(wide) & value & mask(wide) == 0;
}

fn adc_binary(registers: &mut Registers, value: u16, wide: bool) {
    let accumulator = u32::from(registers.accumulator(wide));
    let value = u32::from(value & mask(wide));
    let sum = accumulator + value + u32::from(registers.p.carry);

    let sign_mask = if wide { 0x8000 } else { 0x80 };
    let result = sum as u16 & mask(wide);

    registers.p.carry = sum > u32::from(mask(wide));
    registers.p.overflow = (!(accumulator ^ value) & (accumulator ^ u32::from(result))) & sign_mask != 0;
    registers.set_accumulator(result, wide);
    registers.set_nz(result, wide);
}

fn adc_bcd(registers: &mut Registers, value: u8) {
    // Formulas from http://www.6502.org/tutorials/decimal_mode.html#A which correctly handle
    // invalid values and undocumented behaviors

    let original_a = registers.a as u8;
    let existing_carry: u8 = registers.p.carry.into();

    let mut al = (original_a & 0x0F) + (value & 0x0F) + existing_carry;
    if al >= 0x0A {
        al = 0x10 | ((al + 0x06) & 0x0F);
    }

    let mut a = u16::from(original_a & 0xF0) + u16::from(value & 0xF0) + u16::from(al);
    if a >= 0xA0 {
        a += 0x60;
    }

    let s = i16::from((original_a & 0xF0) as i8) + i16::from((value & 0xF0) as i8) + i16::from(al);

    let result = a as u8;
    registers.a = (registers.a & 0xFF00) | u16::from(result);
    registers.p.zero = result == 0;
    registers.p.carry = a >= 0x0100;
    registers.p.negative = result.sign_bit();
    registers.p.overflow = !(-128..128).contains(&s);
}

fn sbc_bcd(registers: &mut Registers, value: u8) {
    let original_a = registers.a as u8;
    let existing_borrow: u8 = (!registers.p.carry).into();

    let mut al = u16::from(original_a & 0x0F)
        .wrapping_sub(u16::from(value & 0x0F))
        .wrapping_sub(u16::from(existing_borrow));
    if al.sign_bit() {
        al = (al.wrapping_sub(0x06) & 0x0F).wrapping_sub(0x10);
    }

    let mut a = u16::from(original_a & 0xF0).wrapping_sub(u16::from(value & 0xF0)).wrapping_add(al);
    if a.sign_bit() {
        a = a.wrapping_sub(0x60);
    }

    // Carry and overflow follow binary arithmetic
    let borrow = u16::from(original_a) < u16::from(value) + u16::from(existing_borrow);
    let bit_6_borrow = original_a & 0x7F < (value & 0x7F) + existing_borrow;

    let result = a as u8;
    registers.a = (registers.a & 0xFF00) | u16::from(result);
    registers.p.zero = result == 0;
    registers.p.negative = result.sign_bit();
    registers.p.carry = !borrow;
    registers.p.overflow = bit_6_borrow != borrow;
}

// 16-bit decimal operations run the 8-bit operation on each byte, low byte first
fn decimal_u16(registers: &mut Registers, value: u16, op: fn(&mut Registers, u8)) {
    let [value_lsb, value_msb] = value.to_le_bytes();

    op(registers, value_lsb);
    registers.a = registers.a.swap_bytes();
    op(registers, value_msb);
    registers.a = registers.a.swap_bytes();

    registers.p.zero = registers.a == 0;
}

pub(super) fn adc(registers: &mut Registers, value: u16, wide: bool) {
    match (registers.p.decimal_mode, wide) {
        (false, _) => adc_binary(registers, value, wide),
        (true, false) => adc_bcd(registers, value as u8),
        (true, true) => decimal_u16(registers, value, adc_bcd),
    }
}

pub(super) fn sbc(registers: &mut Registers, value: u16, wide: bool) {
    match (registers.p.decimal_mode, wide) {
        (false, _) => adc_binary(registers, !value, wide),
        (true, false) => sbc_bcd(registers, value as u8),
        (true, true) => decimal_u16(registers, value, sbc_bcd),
    }
}

pub(super) fn asl(registers: &mut Registers, value: u16, wide: bool) -> u16 {
    registers.p.carry = sign(value, wide);
    let result = (value << 1) & mask(wide);
    registers.set_nz(result, wide);
    result
}

pub(super) fn lsr(registers: &mut Registers, value: u16, wide: bool) -> u16 {
    registers.p.carry = value.bit(0);
    let result = (value & mask(wide)) >> 1;
    registers.set_nz(result, wide);
    result
}

pub(super) fn rol(registers: &mut Registers, value: u16, wide: bool) -> u16 {
    let carry_in = u16::from(registers.p.carry);
    registers.p.carry = sign(value, wide);
    let result = ((value << 1) | carry_in) & mask(wide);
    registers.set_nz(result, wide);
    result
}

pub(super) fn ror(registers: &mut Registers, value: u16, wide: bool) -> u16 {
    let carry_in = if registers.p.carry { if wide { 0x8000 } else { 0x80 } } else { 0 };
    registers.p.carry = value.bit(0);
    let result = ((value & mask(wide)) >> 1) | carry_in;
    registers.set_nz(result, wide);
    result
}

pub(super) fn inc(registers: &mut Registers, value: u16, wide: bool) -> u16 {
    let result = value.wrapping_add(1) & mask(wide);
    registers.set_nz(result, wide);
    result
}

pub(super) fn dec(registers: &mut Registers, value: u16, wide: bool) -> u16 {
    let result = value.wrapping_sub(1) & mask(wide);
    registers.set_nz(result, wide);
    result
}

pub(super) fn tsb(registers: &mut Registers, value: u16, wide: bool) -> u16 {
    let accumulator = registers.accumulator(wide);
    registers.p.zero = accumulator & value & mask(wide) == 0;
    (value | accumulator) & mask(wide)
}

pub(super) fn trb(registers: &mut Registers, value: u16, wide: bool) -> u16 {
    let accumulator = registers.accumulator(wide);
    registers.p.zero = accumulator & value & mask(wide) == 0;
    value & !accumulator & mask(wide)
}
