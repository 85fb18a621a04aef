mod instructions;

#[cfg(test)]
mod tests;

use crate::traits::BusInterface;
use bincode::{Decode, Encode};
use snes_common::num::GetBit;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct StatusRegister {
    pub negative: bool,
    pub overflow: bool,
    pub direct_page: bool,
    pub break_flag: bool,
    pub half_carry: bool,
    pub interrupt_enabled: bool,
    pub zero: bool,
    pub carry: bool,
}

impl From<StatusRegister> for u8 {
    fn from(value: StatusRegister) -> Self {
        (u8::from(value.negative) << 7)
            | (u8::from(value.overflow) << 6)
            | (u8::from(value.direct_page) << 5)
            | (u8::from(value.break_flag) << 4)
            | (u8::from(value.half_carry) << 3)
            | (u8::from(value.interrupt_enabled) << 2)
            | (u8::from(value.zero) << 1)
            | u8::from(value.carry)
    }
}

impl From<u8> for StatusRegister {
    fn from(value: u8) -> Self {
        Self {
            negative: value.bit(7),
            overflow: value.bit(6),
            direct_page: value.bit(5),
            break_flag: value.bit(4),
            half_carry: value.bit(3),
            interrupt_enabled: value.bit(2),
            zero: value.bit(1),
            carry: value.bit(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    // Stack pointer; the stack always lives in page 1
    pub sp: u8,
    pub pc: u16,
    pub psw: StatusRegister,
}

impl Registers {
    fn new() -> Self {
        Self { a: 0, x: 0, y: 0, sp: 0xEF, pc: 0, psw: 0x02.into() }
    }

    /// The YA register pair used by the 16-bit instructions, Y in the high byte.
    #[inline]
    #[must_use]
    pub fn ya(&self) -> u16 {
        u16::from_le_bytes([self.a, self.y])
    }

    #[inline]
    pub fn set_ya(&mut self, value: u16) {
        [self.a, self.y] = value.to_le_bytes();
    }

    #[inline]
    fn set_nz(&mut self, value: u8) {
        self.psw.zero = value == 0;
        self.psw.negative = value.bit(7);
    }
}

pub const RESET_VECTOR: u16 = 0xFFFE;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Spc700 {
    registers: Registers,
    stopped: bool,
}

impl Spc700 {
    #[must_use]
    pub fn new() -> Self {
        Self { registers: Registers::new(), stopped: false }
    }

    /// Execute a single instruction. A stopped CPU spends one idle cycle instead.
    pub fn execute_instruction<B: BusInterface>(&mut self, bus: &mut B) {
        if self.stopped {
            bus.idle();
            return;
        }

        instructions::execute(self, bus);
    }

    /// Reset the registers and load PC from the reset vector.
    pub fn reset<B: BusInterface>(&mut self, bus: &mut B) {
        self.registers = Registers::new();
        self.stopped = false;

        let lsb = bus.read(RESET_VECTOR);
        let msb = bus.read(RESET_VECTOR.wrapping_add(1));
        self.registers.pc = u16::from_le_bytes([lsb, msb]);
    }

    #[inline]
    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn set_registers(&mut self, registers: Registers) {
        self.registers = registers;
    }

    /// The CPU executed SLEEP or STOP; only a reset resumes it.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    #[inline]
    fn fetch<B: BusInterface>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);
        value
    }

    #[inline]
    fn fetch_u16<B: BusInterface>(&mut self, bus: &mut B) -> u16 {
        let lsb = self.fetch(bus);
        let msb = self.fetch(bus);
        u16::from_le_bytes([lsb, msb])
    }

    // The P flag selects page 0 or page 1
    #[inline]
    fn direct_address(&self, offset: u8) -> u16 {
        u16::from_le_bytes([offset, self.registers.psw.direct_page.into()])
    }

    fn push<B: BusInterface>(&mut self, bus: &mut B, value: u8) {
        bus.write(0x0100 | u16::from(self.registers.sp), value);
        self.registers.sp = self.registers.sp.wrapping_sub(1);
    }

    fn pull<B: BusInterface>(&mut self, bus: &mut B) -> u8 {
        self.registers.sp = self.registers.sp.wrapping_add(1);
        bus.read(0x0100 | u16::from(self.registers.sp))
    }
}

impl Default for Spc700 {
    fn default() -> Self {
        Self::new()
    }
}
