mod instructions;


use crate::traits::BusInterface;
use bincode::{Decode, Encode};
use snes_common::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum SizeBits {
    Eight,
    Sixteen,
}

impl SizeBits {
    fn from_bit(bit: bool) -> Self {
        if bit { Self::Eight } else { Self::Sixteen }
    }

    fn to_bit(self) -> bool {
        self == Self::Eight
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct StatusRegister {
    pub carry: bool,
    pub zero: bool,
    pub irq_disabled: bool,
    pub decimal_mode: bool,
    pub index_size: SizeBits,
    pub accumulator_size: SizeBits,
    pub overflow: bool,
    pub negative: bool,
}

impl Default for StatusRegister {
    fn default() -> Self {
        Self {
            carry: false,
            zero: false,
            irq_disabled: true,
            decimal_mode: false,
            index_size: SizeBits::Eight,
            accumulator_size: SizeBits::Eight,
            overflow: false,
            negative: false,
        }
    }
}

impl From<StatusRegister> for u8 {
    fn from(value: StatusRegister) -> Self {
        (u8::from(value.negative) << 7)
            | (u8::from(value.overflow) << 6)
            | (u8::from(value.accumulator_size.to_bit()) << 5)
            | (u8::from(value.index_size.to_bit()) << 4)
            | (u8::from(value.decimal_mode) << 3)
            | (u8::from(value.irq_disabled) << 2)
            | (u8::from(value.zero) << 1)
            | u8::from(value.carry)
    }
}

impl From<u8> for StatusRegister {
    fn from(value: u8) -> Self {
        Self {
            carry: value.bit(0),
            zero: value.bit(1),
            irq_disabled: value.bit(2),
            decimal_mode: value.bit(3),
            index_size: SizeBits::from_bit(value.bit(4)),
            accumulator_size: SizeBits::from_bit(value.bit(5)),
            overflow: value.bit(6),
            negative: value.bit(7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Registers {
    // Accumulator
    pub a: u16,
    // Index registers
    pub x: u16,
    pub y: u16,
    // Stack pointer
    pub s: u16,
    // Direct page pointer
    pub d: u16,
    // Program bank register
    pub pbr: u8,
    // Program counter
    pub pc: u16,
    // Data bank register
    pub dbr: u8,
    // Status register
    pub p: StatusRegister,
    // Emulation mode flag
    pub emulation_mode: bool,
}

impl Registers {
    fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0x01FF,
            d: 0,
            pbr: 0,
            pc: 0,
            dbr: 0,
            p: StatusRegister::default(),
            // 65816 always powers on in emulation mode
            emulation_mode: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn accumulator_wide(&self) -> bool {
        self.p.accumulator_size == SizeBits::Sixteen
    }

    #[inline]
    #[must_use]
    pub fn index_wide(&self) -> bool {
        self.p.index_size == SizeBits::Sixteen
    }

    #[inline]
    fn accumulator(&self, wide: bool) -> u16 {
        if wide { self.a } else { self.a & 0x00FF }
    }

    #[inline]
    fn set_accumulator(&mut self, value: u16, wide: bool) {
        if wide {
            self.a = value;
        } else {
            self.a = (self.a & 0xFF00) | (value & 0x00FF);
        }
    }

    #[inline]
    fn set_nz(&mut self, value: u16, wide: bool) {
        if wide {
            self.p.zero = value == 0;
            self.p.negative = value.bit(15);
        } else {
            self.p.zero = value & 0x00FF == 0;
            self.p.negative = value.bit(7);
        }
    }

    /// Apply the invariants of emulation mode and 8-bit index registers after P or E changed.
    fn enforce_mode(&mut self) {
        if self.emulation_mode {
            self.p.accumulator_size = SizeBits::Eight;
            self.p.index_size = SizeBits::Eight;
            self.s = 0x0100 | (self.s & 0x00FF);
        }

        if !self.index_wide() {
            self.x &= 0x00FF;
            self.y &= 0x00FF;
        }
    }

    fn set_p(&mut self, value: u8) {
        self.p = value.into();
        self.enforce_mode();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SoftwareInterrupt {
    Breakpoint,
    Coprocessor,
}

impl SoftwareInterrupt {
    const fn emulation_vector(self) -> u16 {
        match self {
            Self::Coprocessor => 0xFFF4,
            Self::Breakpoint => 0xFFFE,
        }
    }

    const fn native_vector(self) -> u16 {
        match self {
            Self::Coprocessor => 0xFFE4,
            Self::Breakpoint => 0xFFE6,
        }
    }
}

pub const RESET_VECTOR: u16 = 0xFFFC;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Wdc65816 {
    registers: Registers,
    waiting: bool,
    stopped: bool,
}

impl Wdc65816 {
    #[must_use]
    pub fn new() -> Self {
        Self { registers: Registers::new(), waiting: false, stopped: false }
    }

    /// Execute a single instruction.
    pub fn execute_instruction<B: BusInterface>(&mut self, bus: &mut B) {
        instructions::execute(self, bus);
    }

    /// Run the hardware interrupt sequence (NMI or IRQ) through the given vector.
    pub fn interrupt<B: BusInterface>(&mut self, bus: &mut B, vector: u16) {
        bus.read(self.pc_address());
        bus.idle();

        if !self.registers.emulation_mode {
            self.push(bus, self.registers.pbr);
        }
        let [pc_lsb, pc_msb] = self.registers.pc.to_le_bytes();
        self.push(bus, pc_msb);
        self.push(bus, pc_lsb);

        // The B flag shares bit 4 with X and reads as clear for hardware interrupts
        let p = u8::from(self.registers.p);
        self.push(bus, if self.registers.emulation_mode { p & !0x10 } else { p });

        self.registers.p.irq_disabled = true;
        self.registers.p.decimal_mode = false;

        self.jump_to_vector(bus, vector);
    }

    /// Run the reset sequence: the interrupt sequence with stack writes suppressed, loading the
    /// reset vector in emulation mode.
    pub fn reset<B: BusInterface>(&mut self, bus: &mut B) {
        self.waiting = false;
        self.stopped = false;

        self.registers.emulation_mode = true;
        self.registers.d = 0;
        self.registers.dbr = 0;
        self.registers.pbr = 0;
        self.registers.p.irq_disabled = true;
        self.registers.p.decimal_mode = false;
        self.registers.enforce_mode();

        bus.read(self.pc_address());
        bus.idle();

        for _ in 0..3 {
            bus.read(self.stack_address(0));
            self.registers.s = 0x0100 | (self.registers.s.wrapping_sub(1) & 0x00FF);
        }

        self.jump_to_vector(bus, RESET_VECTOR);
    }

    fn jump_to_vector<B: BusInterface>(&mut self, bus: &mut B, vector: u16) {
        let pc_lsb = bus.read(vector.into());
        self.last_cycle(bus);
        let pc_msb = bus.read(vector.wrapping_add(1).into());
        self.registers.pc = u16::from_le_bytes([pc_lsb, pc_msb]);
        self.registers.pbr = 0;
    }

    #[inline]
    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn set_registers(&mut self, registers: Registers) {
        self.registers = registers;
        self.registers.enforce_mode();
    }

    /// The CPU executed WAI and has not seen an interrupt since.
    #[inline]
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn wake(&mut self) {
        self.waiting = false;
    }

    /// The CPU executed STP; only a reset resumes it.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    #[inline]
    fn pc_address(&self) -> u32 {
        (u32::from(self.registers.pbr) << 16) | u32::from(self.registers.pc)
    }

    #[inline]
    fn fetch<B: BusInterface>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.pc_address());
        self.registers.pc = self.registers.pc.wrapping_add(1);
        value
    }

    #[inline]
    fn fetch_u16<B: BusInterface>(&mut self, bus: &mut B) -> u16 {
        let lsb = self.fetch(bus);
        let msb = self.fetch(bus);
        u16::from_le_bytes([lsb, msb])
    }

    #[inline]
    fn last_cycle<B: BusInterface>(&self, bus: &mut B) {
        bus.last_cycle(self.registers.p.irq_disabled);
    }

    // Extra cycle when the direct page register is not page-aligned
    #[inline]
    fn idle2<B: BusInterface>(&self, bus: &mut B) {
        if self.registers.d & 0x00FF != 0 {
            bus.idle();
        }
    }

    // Extra cycle for 16-bit index registers or an index that crosses a page
    #[inline]
    fn idle4<B: BusInterface>(&self, bus: &mut B, base: u16, indexed: u16) {
        if self.registers.index_wide() || (base ^ indexed) & 0xFF00 != 0 {
            bus.idle();
        }
    }

    // Extra cycle for taken branches that cross a page in emulation mode
    #[inline]
    fn idle6<B: BusInterface>(&self, bus: &mut B, target: u16) {
        if self.registers.emulation_mode && (self.registers.pc ^ target) & 0xFF00 != 0 {
            bus.idle();
        }
    }

    // Implied-operand cycle; becomes a bus read of the next opcode if an interrupt is pending
    #[inline]
    fn idle_irq<B: BusInterface>(&self, bus: &mut B) {
        if bus.interrupt_pending() {
            bus.read(self.pc_address());
        } else {
            bus.idle();
        }
    }

    #[inline]
    fn direct_address(&self, offset: u16) -> u32 {
        let d = self.registers.d;
        if self.registers.emulation_mode && d & 0x00FF == 0 {
            u32::from(d | (offset & 0x00FF))
        } else {
            u32::from(d.wrapping_add(offset))
        }
    }

    #[inline]
    fn direct_address_native(&self, offset: u16) -> u32 {
        u32::from(self.registers.d.wrapping_add(offset))
    }

    #[inline]
    fn bank_address(&self, offset: u32) -> u32 {
        ((u32::from(self.registers.dbr) << 16) + offset) & 0xFFFFFF
    }

    #[inline]
    fn stack_address(&self, offset: u16) -> u32 {
        u32::from(self.registers.s.wrapping_add(offset))
    }

    fn push<B: BusInterface>(&mut self, bus: &mut B, value: u8) {
        bus.write(self.stack_address(0), value);
        if self.registers.emulation_mode {
            self.registers.s = 0x0100 | (self.registers.s.wrapping_sub(1) & 0x00FF);
        } else {
            self.registers.s = self.registers.s.wrapping_sub(1);
        }
    }

    fn pull<B: BusInterface>(&mut self, bus: &mut B) -> u8 {
        if self.registers.emulation_mode {
            self.registers.s = 0x0100 | (self.registers.s.wrapping_add(1) & 0x00FF);
        } else {
            self.registers.s = self.registers.s.wrapping_add(1);
        }
        bus.read(self.stack_address(0))
    }

    // New 65816 stack instructions ignore the page 1 wrap until the instruction completes
    fn push_native<B: BusInterface>(&mut self, bus: &mut B, value: u8) {
        bus.write(self.stack_address(0), value);
        self.registers.s = self.registers.s.wrapping_sub(1);
    }

    fn pull_native<B: BusInterface>(&mut self, bus: &mut B) -> u8 {
        self.registers.s = self.registers.s.wrapping_add(1);
        bus.read(self.stack_address(0))
    }

    fn fix_emulation_stack(&mut self) {
        if self.registers.emulation_mode {
            self.registers.s = 0x0100 | (self.registers.s & 0x00FF);
        }
    }
}

impl Default for Wdc65816 {
    fn default() -> Self {
        Self::new()
    }
}
