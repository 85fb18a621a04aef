//! PPU register file and video memories.
//!
//! The PPU runs its own copy of the beam counter one dot (4 master clocks) at a time and signals
//! the scheduler when it reaches the first line of vertical blank. Rendering is not modeled; the
//! PPU exists so that CPU-visible state (VRAM/OAM/CGRAM contents, data port address sequencing,
//! the H/V latch, status registers, open bus) behaves like hardware.

mod registers;

use crate::counter::Counter;
use crate::ppu::registers::{AccessFlipflop, Registers, VramIncrementMode};
use bincode::{Decode, Encode};
use snes_common::boxedarray::{BoxedByteArray, BoxedWordArray};
use snes_common::frontend::TimingMode;
use snes_common::num::{U16Ext, U24Ext};
use snes_common::thread::Thread;
use snes_config::SnesConfig;

const VRAM_LEN_WORDS: usize = 64 * 1024 / 2;
const OAM_LOW_LEN_WORDS: usize = 512 / 2;
const OAM_HIGH_LEN_BYTES: usize = 32;
const CGRAM_LEN_WORDS: usize = 256;

const VRAM_ADDRESS_MASK: u16 = (1 << 15) - 1;
const OAM_ADDRESS_MASK: u16 = (1 << 9) - 1;

const DOT_CLOCKS: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuTickEffect {
    None,
    FrameComplete,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ppu {
    thread: Thread,
    counter: Counter,
    timing_mode: TimingMode,
    registers: Registers,
    vram: BoxedWordArray<VRAM_LEN_WORDS>,
    oam_low: BoxedWordArray<OAM_LOW_LEN_WORDS>,
    oam_high: BoxedByteArray<OAM_HIGH_LEN_BYTES>,
    cgram: BoxedWordArray<CGRAM_LEN_WORDS>,
    ppu1_open_bus: u8,
    ppu2_open_bus: u8,
    config: SnesConfig,
    frame_count: u64,
}

impl Ppu {
    pub fn new(timing_mode: TimingMode, cpu_frequency: u64, config: &SnesConfig) -> Self {
        let mut registers = Registers::new();
        registers.overscan = config.overscan;

        Self {
            thread: Thread::new(cpu_frequency),
            counter: Counter::new(timing_mode),
            timing_mode,
            registers,
            vram: BoxedWordArray::new(),
            oam_low: BoxedWordArray::new(),
            oam_high: BoxedByteArray::new(),
            cgram: BoxedWordArray::new(),
            ppu1_open_bus: 0,
            ppu2_open_bus: 0,
            config: *config,
            frame_count: 0,
        }
    }

    pub fn power(&mut self) {
        *self = Self::new(self.timing_mode, self.thread.frequency(), &self.config);
    }

    pub fn reset(&mut self) {
        self.thread.reset();
        self.counter.reset();

        // Enable forced blanking
        self.registers.write_inidisp(0x80);

        // Return to 224-line non-interlaced mode
        self.registers.write_setini(0x00);
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn thread_mut(&mut self) -> &mut Thread {
        &mut self.thread
    }

    /// Advance by one dot.
    pub fn main(&mut self, cpu_frequency: u64) -> PpuTickEffect {
        let new_line = self.counter.tick(DOT_CLOCKS as u16, self.registers.interlaced);
        self.thread.step(DOT_CLOCKS, cpu_frequency);

        if new_line && self.counter.vcounter() == self.vdisp() {
            if !self.registers.forced_blanking {
                self.registers.oam_address = self.registers.oam_address_reload_value;
            }
            self.frame_count += 1;
            return PpuTickEffect::FrameComplete;
        }

        PpuTickEffect::None
    }

    /// First line of vertical blank.
    pub fn vdisp(&self) -> u16 {
        if self.registers.overscan { 240 } else { 225 }
    }

    pub fn interlace(&self) -> bool {
        self.registers.interlaced
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn vram(&self) -> &[u16] {
        self.vram.as_slice()
    }

    pub fn cgram(&self) -> &[u16] {
        self.cgram.as_slice()
    }

    fn vblank_flag(&self) -> bool {
        self.counter.vcounter() >= self.vdisp()
    }

    pub fn read_port(&mut self, address: u32) -> Option<u8> {
        log::trace!("Read PPU register: {address:06X}");

        let address_lsb = address & 0xFF;
        let value = match address_lsb {
            0x34 => self.registers.multiply_result().low_byte(),
            0x35 => self.registers.multiply_result().mid_byte(),
            0x36 => self.registers.multiply_result().high_byte(),
            0x37 => {
                // SLHV: Latch H/V counter
                if self.registers.programmable_joypad_port & 0x80 != 0 {
                    self.latch_counters();
                }

                // Reading from this address returns CPU open bus
                return None;
            }
            0x38 => {
                // RDOAM: OAM data port, read
                self.read_oam_data_port()
            }
            0x39 => {
                // RDVRAML: VRAM data port, read, low byte
                self.read_vram_data_port_low()
            }
            0x3A => {
                // RDVRAMH: VRAM data port, read, high byte
                self.read_vram_data_port_high()
            }
            0x3B => {
                // RDCGRAM: CGRAM data port, read
                self.read_cgram_data_port()
            }
            0x3C => self.registers.read_ophct(self.ppu2_open_bus),
            0x3D => self.registers.read_opvct(self.ppu2_open_bus),
            0x3E => {
                // STAT77: PPU1 status and version number
                // Bit 4 is PPU1 open bus
                (self.ppu1_open_bus & 0x10) | (self.config.ppu1_version & 0x0F)
            }
            0x3F => {
                // STAT78: PPU2 status and version number
                // Bit 5 is PPU2 open bus
                let value = (u8::from(self.counter.field()) << 7)
                    | (u8::from(self.registers.new_hv_latched) << 6)
                    | (self.ppu2_open_bus & 0x20)
                    | (u8::from(self.timing_mode == TimingMode::Pal) << 4)
                    | (self.config.ppu2_version & 0x0F);

                self.registers.new_hv_latched = false;
                self.registers.reset_hv_counter_flipflops();

                value
            }
            0x04 | 0x05 | 0x06 | 0x08 | 0x09 | 0x0A | 0x14 | 0x15 | 0x16 | 0x18 | 0x19 | 0x1A
            | 0x24 | 0x25 | 0x26 | 0x28 | 0x29 | 0x2A => {
                // PPU1 open bus (all 8 bits)
                self.ppu1_open_bus
            }
            _ => {
                // CPU open bus
                return None;
            }
        };

        if (0x34..0x37).contains(&address_lsb)
            || (0x38..0x3B).contains(&address_lsb)
            || address_lsb == 0x3E
        {
            // Reading $2134-$2136, $2138-$213A, or $213E sets PPU1 open bus
            self.ppu1_open_bus = value;
        } else if (0x3B..0x3E).contains(&address_lsb) || address_lsb == 0x3F {
            // Reading $213B-$213D or $213F sets PPU2 open bus
            self.ppu2_open_bus = value;
        }

        Some(value)
    }

    pub fn write_port(&mut self, address: u32, value: u8) {
        if log::log_enabled!(log::Level::Trace) {
            // Don't log data port writes
            let address = address & 0xFF;
            if address != 0x04 && address != 0x18 && address != 0x19 && address != 0x22 {
                log::trace!(
                    "PPU register write: 21{address:02X} {value:02X} (line {} clock {})",
                    self.counter.vcounter(),
                    self.counter.hcounter(),
                );
            }
        }

        match address & 0xFF {
            0x00 => self.registers.write_inidisp(value),
            0x01 => self.registers.obsel = value,
            0x02 => self.registers.write_oamaddl(value),
            0x03 => self.registers.write_oamaddh(value),
            0x04 => {
                // OAMDATA: OAM data port (write)
                self.write_oam_data_port(value);
            }
            0x15 => self.registers.write_vmain(value),
            0x16 => {
                // VMADDL: VRAM address, low byte
                self.registers.vram_address.set_lsb(value);
                self.fill_vram_prefetch_buffer();
            }
            0x17 => {
                // VMADDH: VRAM address, high byte
                self.registers.vram_address.set_msb(value);
                self.fill_vram_prefetch_buffer();
            }
            0x18 => {
                // VMDATAL: VRAM data port (write), low byte
                self.write_vram_data_port_low(value);
            }
            0x19 => {
                // VMDATAH: VRAM data port (write), high byte
                self.write_vram_data_port_high(value);
            }
            0x1B => self.registers.write_m7a(value),
            0x1C => self.registers.write_m7b(value),
            0x21 => self.registers.write_cgadd(value),
            0x22 => {
                // CGDATA: CGRAM data port (write)
                self.write_cgram_data_port(value);
            }
            0x33 => self.registers.write_setini(value),
            address @ (0x05..=0x14 | 0x1A | 0x1D..=0x20 | 0x23..=0x32) => {
                self.registers.raw[address as usize] = value;
            }
            _ => {
                // No other mappings are valid; do nothing
            }
        }
    }

    fn write_vram_data_port_low(&mut self, value: u8) {
        if self.vblank_flag() || self.registers.forced_blanking {
            // VRAM writes only allowed during VBlank and forced blanking
            let vram_addr = self.translated_vram_address();
            self.vram[vram_addr].set_lsb(value);
        }

        if self.registers.vram_address_increment_mode == VramIncrementMode::Low {
            self.increment_vram_address();
        }
    }

    fn write_vram_data_port_high(&mut self, value: u8) {
        if self.vblank_flag() || self.registers.forced_blanking {
            // VRAM writes only allowed during VBlank and forced blanking
            let vram_addr = self.translated_vram_address();
            self.vram[vram_addr].set_msb(value);
        }

        if self.registers.vram_address_increment_mode == VramIncrementMode::High {
            self.increment_vram_address();
        }
    }

    fn read_vram_data_port_low(&mut self) -> u8 {
        let vram_byte = self.registers.vram_prefetch_buffer.lsb();

        if self.registers.vram_address_increment_mode == VramIncrementMode::Low {
            // Fill prefetch buffer *before* address increment
            self.fill_vram_prefetch_buffer();
            self.increment_vram_address();
        }

        vram_byte
    }

    fn read_vram_data_port_high(&mut self) -> u8 {
        let vram_byte = self.registers.vram_prefetch_buffer.msb();

        if self.registers.vram_address_increment_mode == VramIncrementMode::High {
            // Fill prefetch buffer *before* address increment
            self.fill_vram_prefetch_buffer();
            self.increment_vram_address();
        }

        vram_byte
    }

    fn translated_vram_address(&self) -> usize {
        (self.registers.vram_address_translation.apply(self.registers.vram_address)
            & VRAM_ADDRESS_MASK) as usize
    }

    fn increment_vram_address(&mut self) {
        self.registers.vram_address =
            self.registers.vram_address.wrapping_add(self.registers.vram_address_increment_step);
    }

    fn fill_vram_prefetch_buffer(&mut self) {
        let vram_addr = self.translated_vram_address();
        self.registers.vram_prefetch_buffer = self.vram[vram_addr];
    }

    fn write_oam_data_port(&mut self, value: u8) {
        if self.registers.oam_address >= 0x100 {
            // Writes to $100 or higher immediately go through to high OAM at (address << 1) & 0x1F
            // $220-$3FF are mirrors of $200-$21F
            let second_write = self.registers.oam_data_flipflop == AccessFlipflop::Second;
            let oam_high_addr = (self.registers.oam_address << 1) | u16::from(second_write);
            self.oam_high[(oam_high_addr & 0x1F) as usize] = value;

            self.registers.oam_data_flipflop = self.registers.oam_data_flipflop.toggle();
            if second_write {
                self.registers.oam_address = (self.registers.oam_address + 1) & OAM_ADDRESS_MASK;
            }
        } else {
            // Writes to $000-$1FF go to low OAM; requires two writes to persist a word
            match self.registers.oam_data_flipflop {
                AccessFlipflop::First => {
                    // First write: Latch LSB
                    self.registers.oam_write_buffer = value;
                }
                AccessFlipflop::Second => {
                    // Second write: Write word to OAM
                    self.oam_low[self.registers.oam_address as usize] =
                        u16::from_le_bytes([self.registers.oam_write_buffer, value]);
                    self.registers.oam_address =
                        (self.registers.oam_address + 1) & OAM_ADDRESS_MASK;
                }
            }
            self.registers.oam_data_flipflop = self.registers.oam_data_flipflop.toggle();
        }
    }

    fn read_oam_data_port(&mut self) -> u8 {
        let second_read = self.registers.oam_data_flipflop == AccessFlipflop::Second;

        let oam_byte = if self.registers.oam_address >= 0x100 {
            // High OAM; $220-$3FF mirrors $200-$21F
            let oam_high_addr = (self.registers.oam_address << 1) | u16::from(second_read);
            self.oam_high[(oam_high_addr & 0x1F) as usize]
        } else {
            // Low OAM
            let word_bytes = self.oam_low[self.registers.oam_address as usize].to_le_bytes();
            word_bytes[usize::from(second_read)]
        };

        self.registers.oam_data_flipflop = self.registers.oam_data_flipflop.toggle();
        if second_read {
            self.registers.oam_address = (self.registers.oam_address + 1) & OAM_ADDRESS_MASK;
        }

        oam_byte
    }

    fn write_cgram_data_port(&mut self, value: u8) {
        match self.registers.cgram_flipflop {
            AccessFlipflop::First => {
                self.registers.cgram_write_buffer = value;
                self.registers.cgram_flipflop = AccessFlipflop::Second;
            }
            AccessFlipflop::Second => {
                // Only bits 6-0 of high byte are persisted
                self.cgram[self.registers.cgram_address as usize] =
                    u16::from_le_bytes([self.registers.cgram_write_buffer, value & 0x7F]);
                self.registers.cgram_flipflop = AccessFlipflop::First;

                self.registers.cgram_address = self.registers.cgram_address.wrapping_add(1);
            }
        }
    }

    fn read_cgram_data_port(&mut self) -> u8 {
        let word = self.cgram[self.registers.cgram_address as usize];

        match self.registers.cgram_flipflop {
            AccessFlipflop::First => {
                // Low byte
                self.registers.cgram_flipflop = AccessFlipflop::Second;

                word.lsb()
            }
            AccessFlipflop::Second => {
                // High byte; bit 7 is PPU2 open bus
                self.registers.cgram_flipflop = AccessFlipflop::First;
                self.registers.cgram_address = self.registers.cgram_address.wrapping_add(1);

                (self.ppu2_open_bus & 0x80) | word.msb()
            }
        }
    }

    fn latch_counters(&mut self) {
        let h_counter = self.counter.hcounter() >> 2;
        let v_counter = self.counter.vcounter();
        self.registers.latch_counters(h_counter, v_counter);
    }

    /// WRIO ($4201) bit 7 doubles as the H/V latch line; a falling edge latches the counters.
    pub fn update_wrio(&mut self, wrio: u8) {
        if self.registers.programmable_joypad_port & 0x80 != 0 && wrio & 0x80 == 0 {
            self.latch_counters();
        }
        self.registers.programmable_joypad_port = wrio;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const CPU_FREQUENCY: u64 = 21_477_272;

    fn new_ppu() -> Ppu {
        Ppu::new(TimingMode::Ntsc, CPU_FREQUENCY, &SnesConfig::default())
    }

    fn run_until_frame(ppu: &mut Ppu) -> u64 {
        let mut dots = 1;
        while ppu.main(CPU_FREQUENCY) != PpuTickEffect::FrameComplete {
            dots += 1;
        }
        dots
    }

    #[test]
    fn frame_completes_at_first_vblank_line() {
        let mut ppu = new_ppu();
        assert_eq!(run_until_frame(&mut ppu), 225 * 1364 / 4);
        assert_eq!(ppu.frame_count(), 1);
        assert!(ppu.vblank_flag());

        // Full field to the next one
        assert_eq!(run_until_frame(&mut ppu), 262 * 1364 / 4);
    }

    #[test]
    fn vram_writes_only_land_in_blanking() {
        let mut ppu = new_ppu();

        // Forced blank from power-on; increment after high byte
        ppu.write_port(0x2115, 0x80);
        ppu.write_port(0x2116, 0x00);
        ppu.write_port(0x2117, 0x10);
        ppu.write_port(0x2118, 0x34);
        ppu.write_port(0x2119, 0x12);
        assert_eq!(ppu.vram()[0x1000], 0x1234);

        // Leave forced blank during active display: address still increments, data dropped
        ppu.write_port(0x2100, 0x0F);
        ppu.write_port(0x2118, 0x78);
        ppu.write_port(0x2119, 0x56);
        assert_eq!(ppu.vram()[0x1001], 0x0000);

        ppu.write_port(0x2100, 0x80);
        ppu.write_port(0x2118, 0xBC);
        ppu.write_port(0x2119, 0x9A);
        assert_eq!(ppu.vram()[0x1002], 0x9ABC);
    }

    #[test]
    fn vram_reads_lag_one_word_behind() {
        let mut ppu = new_ppu();
        ppu.write_port(0x2115, 0x80);
        ppu.write_port(0x2116, 0x00);
        ppu.write_port(0x2117, 0x00);
        for word in [0x1234_u16, 0x5678] {
            ppu.write_port(0x2118, word.lsb());
            ppu.write_port(0x2119, word.msb());
        }

        // The address write fills the prefetch buffer; each incrementing read refills it from
        // the address before the increment
        ppu.write_port(0x2116, 0x00);
        let reads: Vec<_> =
            [0x2139, 0x213A, 0x2139, 0x213A, 0x2139].map(|address| ppu.read_port(address)).into();
        assert_eq!(reads, [Some(0x34), Some(0x12), Some(0x34), Some(0x12), Some(0x78)]);
    }

    #[test]
    fn multiplier_reads_signed_product() {
        let mut ppu = new_ppu();
        // M7A = -256, M7B = 2
        ppu.write_port(0x211B, 0x00);
        ppu.write_port(0x211B, 0xFF);
        ppu.write_port(0x211C, 0x02);

        let product: Vec<_> = [0x2134, 0x2135, 0x2136].map(|address| ppu.read_port(address)).into();
        assert_eq!(product, [Some(0x00), Some(0xFE), Some(0xFF)]);
    }

    #[test]
    fn cgram_port_pairs_bytes() {
        let mut ppu = new_ppu();
        ppu.write_port(0x2121, 0x10);
        ppu.write_port(0x2122, 0xFF);
        ppu.write_port(0x2122, 0xFF);
        assert_eq!(ppu.cgram()[0x10], 0x7FFF);

        ppu.write_port(0x2121, 0x10);
        assert_eq!(ppu.read_port(0x213B), Some(0xFF));
        // Bit 7 of the high byte is PPU2 open bus, set to $FF by the previous read
        assert_eq!(ppu.read_port(0x213B), Some(0xFF));

        ppu.write_port(0x2121, 0x11);
        ppu.read_port(0x213B);
        assert_eq!(ppu.read_port(0x213B), Some(0x00));
    }

    #[test]
    fn oam_high_table_mirrors() {
        let mut ppu = new_ppu();
        ppu.write_port(0x2102, 0x00);
        ppu.write_port(0x2103, 0x01);
        ppu.write_port(0x2104, 0xAB);

        ppu.write_port(0x2102, 0x10);
        ppu.write_port(0x2103, 0x01);
        assert_eq!(ppu.read_port(0x2138), Some(0xAB));
    }

    #[test]
    fn status_and_open_bus() {
        let mut ppu = new_ppu();

        assert_eq!(ppu.read_port(0x213E), Some(0x01));
        assert_eq!(ppu.read_port(0x213F), Some(0x03));
        assert_eq!(ppu.read_port(0x2140), None);

        // Write-only PPU1 registers return PPU1 open bus
        ppu.write_port(0x211B, 0x00);
        ppu.write_port(0x211B, 0x10);
        ppu.write_port(0x211C, 0xFF);
        assert_eq!(ppu.read_port(0x2136), Some(0xFF));
        assert_eq!(ppu.read_port(0x2105), Some(0xFF));
    }

    #[test]
    fn wrio_falling_edge_latches_counters() {
        let mut ppu = new_ppu();
        for _ in 0..1364 / 4 + 10 {
            ppu.main(CPU_FREQUENCY);
        }

        ppu.update_wrio(0x00);
        assert_eq!(ppu.read_port(0x213F).map(|value| value & 0x40), Some(0x40));
        assert_eq!(ppu.read_port(0x213C), Some(10));
        assert_eq!(ppu.read_port(0x213D), Some(1));

        // Flag was cleared by the $213F read
        assert_eq!(ppu.read_port(0x213F).map(|value| value & 0x40), Some(0x00));

        // SLHV does nothing while WRIO bit 7 is low
        assert_eq!(ppu.read_port(0x2137), None);
        assert_eq!(ppu.read_port(0x213F).map(|value| value & 0x40), Some(0x00));
    }
}
