use bincode::{Decode, Encode};
use snes_common::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum AccessFlipflop {
    #[default]
    First,
    Second,
}

impl AccessFlipflop {
    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum VramAddressTranslation {
    #[default]
    None,
    EightBit,
    NineBit,
    TenBit,
}

impl VramAddressTranslation {
    fn from_byte(byte: u8) -> Self {
        match byte & 0x0C {
            0x00 => Self::None,
            0x04 => Self::EightBit,
            0x08 => Self::NineBit,
            _ => Self::TenBit,
        }
    }

    /// Rotate the low 8/9/10 address bits left by 3, which lets software write 2bpp/4bpp/8bpp
    /// tile rows with a linear CPU-side address.
    pub fn apply(self, vram_addr: u16) -> u16 {
        match self {
            Self::None => vram_addr,
            Self::EightBit => {
                (vram_addr & 0xFF00) | ((vram_addr >> 5) & 0x0007) | ((vram_addr & 0x001F) << 3)
            }
            Self::NineBit => {
                (vram_addr & 0xFE00) | ((vram_addr >> 6) & 0x0007) | ((vram_addr & 0x003F) << 3)
            }
            Self::TenBit => {
                (vram_addr & 0xFC00) | ((vram_addr >> 7) & 0x0007) | ((vram_addr & 0x007F) << 3)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum VramIncrementMode {
    #[default]
    Low,
    High,
}

impl VramIncrementMode {
    fn from_byte(byte: u8) -> Self {
        if byte.bit(7) { Self::High } else { Self::Low }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Registers {
    // INIDISP
    pub forced_blanking: bool,
    pub brightness: u8,
    // OBSEL
    pub obsel: u8,
    // OAMADDL/OAMADDH
    pub oam_address: u16,
    pub oam_address_reload_value: u16,
    pub oam_priority_rotate: bool,
    pub oam_write_buffer: u8,
    pub oam_data_flipflop: AccessFlipflop,
    // VMAIN/VMADDL/VMADDH
    pub vram_address: u16,
    pub vram_address_increment_step: u16,
    pub vram_address_translation: VramAddressTranslation,
    pub vram_address_increment_mode: VramIncrementMode,
    pub vram_prefetch_buffer: u16,
    // M7A/M7B, also the PPU multiplier operands
    pub mode_7_latch: u8,
    pub multiply_operand_l: i16,
    pub multiply_operand_r: i8,
    // CGADD
    pub cgram_address: u8,
    pub cgram_write_buffer: u8,
    pub cgram_flipflop: AccessFlipflop,
    // SETINI
    pub interlaced: bool,
    pub overscan: bool,
    pub setini: u8,
    // Write-only rendering registers with no modeled side effects, indexed by address & 0x3F
    pub raw: [u8; 0x40],
    // H/V counter latch
    pub latched_h_counter: u16,
    pub latched_v_counter: u16,
    pub new_hv_latched: bool,
    pub h_counter_flipflop: AccessFlipflop,
    pub v_counter_flipflop: AccessFlipflop,
    // Copied from WRIO CPU register (needed for H/V counter latching)
    pub programmable_joypad_port: u8,
}

impl Registers {
    pub fn new() -> Self {
        Self {
            forced_blanking: true,
            brightness: 0,
            obsel: 0,
            oam_address: 0,
            oam_address_reload_value: 0,
            oam_priority_rotate: false,
            oam_write_buffer: 0,
            oam_data_flipflop: AccessFlipflop::default(),
            vram_address: 0,
            vram_address_increment_step: 1,
            vram_address_translation: VramAddressTranslation::default(),
            vram_address_increment_mode: VramIncrementMode::default(),
            vram_prefetch_buffer: 0,
            mode_7_latch: 0,
            multiply_operand_l: 0,
            multiply_operand_r: 0,
            cgram_address: 0,
            cgram_write_buffer: 0,
            cgram_flipflop: AccessFlipflop::default(),
            interlaced: false,
            overscan: false,
            setini: 0,
            raw: [0; 0x40],
            latched_h_counter: 0,
            latched_v_counter: 0,
            new_hv_latched: false,
            h_counter_flipflop: AccessFlipflop::default(),
            v_counter_flipflop: AccessFlipflop::default(),
            programmable_joypad_port: 0xFF,
        }
    }

    pub fn write_inidisp(&mut self, value: u8) {
        // INIDISP: Display control 1
        self.forced_blanking = value.bit(7);
        self.brightness = value & 0x0F;

        log::trace!("  Forced blanking: {}", self.forced_blanking);
        log::trace!("  Brightness: {}", self.brightness);
    }

    pub fn write_oamaddl(&mut self, value: u8) {
        // OAMADDL: OAM address, low byte
        let reload_value = (self.oam_address_reload_value & 0xFF00) | u16::from(value);
        self.oam_address_reload_value = reload_value;
        self.oam_address = reload_value;
        self.oam_data_flipflop = AccessFlipflop::First;

        log::trace!("  OAM address reload value: {:04X}", self.oam_address_reload_value);
    }

    pub fn write_oamaddh(&mut self, value: u8) {
        // OAMADDH: OAM address, high byte
        let reload_value =
            (self.oam_address_reload_value & 0x00FF) | (u16::from(value & 0x01) << 8);
        self.oam_address_reload_value = reload_value;
        self.oam_address = reload_value;
        self.oam_data_flipflop = AccessFlipflop::First;
        self.oam_priority_rotate = value.bit(7);

        log::trace!("  OAM address reload value: {:04X}", self.oam_address_reload_value);
    }

    pub fn write_vmain(&mut self, value: u8) {
        // VMAIN: VRAM address increment mode
        self.vram_address_increment_step = match value & 0x03 {
            0x00 => 1,
            0x01 => 32,
            _ => 128,
        };
        self.vram_address_translation = VramAddressTranslation::from_byte(value);
        self.vram_address_increment_mode = VramIncrementMode::from_byte(value);

        log::trace!("  VRAM data port increment step: {}", self.vram_address_increment_step);
        log::trace!("  VRAM data port address translation: {:?}", self.vram_address_translation);
        log::trace!("  VRAM data port increment on byte: {:?}", self.vram_address_increment_mode);
    }

    pub fn write_m7a(&mut self, value: u8) {
        // M7A: Mode 7 matrix A, also the 16-bit signed multiplier operand
        self.multiply_operand_l = i16::from_le_bytes([self.mode_7_latch, value]);
        self.mode_7_latch = value;
    }

    pub fn write_m7b(&mut self, value: u8) {
        // M7B: Mode 7 matrix B; the multiplier uses only the most recent byte
        self.multiply_operand_r = value as i8;
        self.mode_7_latch = value;
    }

    pub fn write_cgadd(&mut self, value: u8) {
        // CGADD: CGRAM address
        self.cgram_address = value;
        self.cgram_flipflop = AccessFlipflop::First;

        log::trace!("  CGRAM data port address: {value:02X}");
    }

    pub fn write_setini(&mut self, value: u8) {
        // SETINI: Display control 2
        self.setini = value;
        self.interlaced = value.bit(0);
        self.overscan = value.bit(2);

        log::trace!("  Interlaced: {}", self.interlaced);
        log::trace!("  Overscan (239-line mode): {}", self.overscan);
    }

    pub fn multiply_result(&self) -> i32 {
        i32::from(self.multiply_operand_l) * i32::from(self.multiply_operand_r)
    }

    pub fn latch_counters(&mut self, h_counter: u16, v_counter: u16) {
        self.latched_h_counter = h_counter;
        self.latched_v_counter = v_counter;
        self.new_hv_latched = true;
    }

    pub fn read_ophct(&mut self, ppu2_open_bus: u8) -> u8 {
        // Bits 1-7 of high byte are PPU2 open bus
        let value = match self.h_counter_flipflop {
            AccessFlipflop::First => self.latched_h_counter as u8,
            AccessFlipflop::Second => (ppu2_open_bus & 0xFE) | (self.latched_h_counter >> 8) as u8,
        };
        self.h_counter_flipflop = self.h_counter_flipflop.toggle();
        value
    }

    pub fn read_opvct(&mut self, ppu2_open_bus: u8) -> u8 {
        // Bits 1-7 of high byte are PPU2 open bus
        let value = match self.v_counter_flipflop {
            AccessFlipflop::First => self.latched_v_counter as u8,
            AccessFlipflop::Second => (ppu2_open_bus & 0xFE) | (self.latched_v_counter >> 8) as u8,
        };
        self.v_counter_flipflop = self.v_counter_flipflop.toggle();
        value
    }

    pub fn reset_hv_counter_flipflops(&mut self) {
        self.h_counter_flipflop = AccessFlipflop::First;
        self.v_counter_flipflop = AccessFlipflop::First;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn vram_address_translation() {
        assert_eq!(VramAddressTranslation::None.apply(0x1234), 0x1234);
        // aaaaaaaa YYYxxxxx -> aaaaaaaa xxxxxYYY
        assert_eq!(VramAddressTranslation::EightBit.apply(0x00E1), 0x000F);
        assert_eq!(VramAddressTranslation::NineBit.apply(0x01C1), 0x000F);
        assert_eq!(VramAddressTranslation::TenBit.apply(0x0381), 0x000F);
    }

    #[test]
    fn multiplier_uses_signed_operands() {
        let mut registers = Registers::new();
        registers.write_m7a(0x00);
        registers.write_m7a(0x80);
        registers.write_m7b(0x02);
        assert_eq!(registers.multiply_result(), -0x8000 * 2);
    }
}
