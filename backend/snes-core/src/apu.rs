//! SMP (S-SMP) side of the audio unit.
//!
//! The SPC700 runs out of 64 KiB of audio RAM with the IPL boot ROM overlaid at $FFC0, and talks
//! to the main CPU through four mailbox ports. Its I/O registers at $F0-$FF cover the timers, the
//! ports, and the DSP register file; the DSP registers are plain storage and no audio is produced.

mod bootrom;
mod timer;

use crate::apu::bootrom::IPL_ROM;
use crate::apu::timer::{FastTimer, SlowTimer};
use bincode::{Decode, Encode};
use snes_common::boxedarray::BoxedByteArray;
use snes_common::num::GetBit;
use snes_common::thread::Thread;
use spc700_emu::{BusInterface, Spc700};

// The APU frequency is 32000 Hz on paper, but hardware tends to run slightly faster than that
pub const OUTPUT_FREQUENCY: u64 = 32040;

// Roughly 24.607 MHz
pub const SMP_FREQUENCY: u64 = OUTPUT_FREQUENCY * 768;

// One SPC cycle is 24 SMP master clocks
const SPC_CYCLE_CLOCKS: u64 = 24;

const AUDIO_RAM_LEN: usize = 64 * 1024;
const DSP_REGISTERS_LEN: usize = 128;

type AudioRam = BoxedByteArray<AUDIO_RAM_LEN>;

#[derive(Debug, Clone, Encode, Decode)]
struct SmpRegisters {
    // Written by the main CPU, read by the SMP at $F4-$F7
    main_cpu_communication: [u8; 4],
    // Written by the SMP, read by the main CPU at $2140-$2143
    smp_communication: [u8; 4],
    timer_0: SlowTimer,
    timer_1: SlowTimer,
    timer_2: FastTimer,
    boot_rom_mapped: bool,
    dsp_address: u8,
    dsp_registers: [u8; DSP_REGISTERS_LEN],
    auxio4: u8,
    auxio5: u8,
}

impl SmpRegisters {
    fn new() -> Self {
        Self {
            main_cpu_communication: [0; 4],
            smp_communication: [0; 4],
            timer_0: SlowTimer::new(),
            timer_1: SlowTimer::new(),
            timer_2: FastTimer::new(),
            boot_rom_mapped: true,
            dsp_address: 0,
            dsp_registers: [0; DSP_REGISTERS_LEN],
            auxio4: 0,
            auxio5: 0,
        }
    }

    fn tick_timers(&mut self) {
        self.timer_0.tick();
        self.timer_1.tick();
        self.timer_2.tick();
    }

    /// SMP-side read of the I/O registers at $F0-$FF.
    fn read(&mut self, register: u8) -> u8 {
        match register & 0x0F {
            0x01 => {
                u8::from(self.timer_0.enabled())
                    | (u8::from(self.timer_1.enabled()) << 1)
                    | (u8::from(self.timer_2.enabled()) << 2)
                    | (u8::from(self.boot_rom_mapped) << 7)
            }
            0x02 => self.dsp_address,
            // $80-$FF mirror $00-$7F on reads
            0x03 => self.dsp_registers[(self.dsp_address & 0x7F) as usize],
            port @ 0x04..=0x07 => self.main_cpu_communication[(port - 4) as usize],
            0x08 => self.auxio4,
            0x09 => self.auxio5,
            0x0A => self.timer_0.divider(),
            0x0B => self.timer_1.divider(),
            0x0C => self.timer_2.divider(),
            0x0D => self.timer_0.read_output(),
            0x0E => self.timer_1.read_output(),
            0x0F => self.timer_2.read_output(),
            _ => 0x00,
        }
    }

    /// SMP-side write of the I/O registers at $F0-$FF.
    fn write(&mut self, register: u8, value: u8) {
        log::trace!("SMP register write: {register:X} {value:02X}");

        match register & 0x0F {
            0x01 => {
                self.timer_0.set_enabled(value.bit(0));
                self.timer_1.set_enabled(value.bit(1));
                self.timer_2.set_enabled(value.bit(2));

                if value.bit(4) {
                    self.main_cpu_communication[0] = 0;
                    self.main_cpu_communication[1] = 0;
                }

                if value.bit(5) {
                    self.main_cpu_communication[2] = 0;
                    self.main_cpu_communication[3] = 0;
                }

                self.boot_rom_mapped = value.bit(7);
            }
            0x02 => self.dsp_address = value,
            0x03 => {
                // $80-$FF are read-only
                if !self.dsp_address.bit(7) {
                    self.dsp_registers[self.dsp_address as usize] = value;
                }
            }
            port @ 0x04..=0x07 => self.smp_communication[(port - 4) as usize] = value,
            0x08 => self.auxio4 = value,
            0x09 => self.auxio5 = value,
            0x0A => self.timer_0.set_divider(value),
            0x0B => self.timer_1.set_divider(value),
            0x0C => self.timer_2.set_divider(value),
            _ => {}
        }
    }
}

/// The SPC700's view of the audio unit. Every bus cycle also advances the timers and the SMP
/// thread by one SPC cycle.
struct SmpBus<'a> {
    registers: &'a mut SmpRegisters,
    audio_ram: &'a mut AudioRam,
    thread: &'a mut Thread,
    cycles: &'a mut u64,
    cpu_frequency: u64,
}

impl SmpBus<'_> {
    fn cycle(&mut self) {
        self.registers.tick_timers();
        *self.cycles += 1;
        self.thread.step(SPC_CYCLE_CLOCKS, self.cpu_frequency);
    }
}

impl BusInterface for SmpBus<'_> {
    fn read(&mut self, address: u16) -> u8 {
        let value = match address {
            0x00F0..=0x00FF => self.registers.read(address as u8),
            0xFFC0..=0xFFFF if self.registers.boot_rom_mapped => {
                IPL_ROM[(address & 0x003F) as usize]
            }
            _ => self.audio_ram[address as usize],
        };
        self.cycle();
        value
    }

    // Writes always land in audio RAM, including under the registers and the boot ROM
    fn write(&mut self, address: u16, value: u8) {
        self.audio_ram[address as usize] = value;
        if (0x00F0..=0x00FF).contains(&address) {
            self.registers.write(address as u8, value);
        }
        self.cycle();
    }

    fn idle(&mut self) {
        self.cycle();
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Smp {
    spc700: Spc700,
    thread: Thread,
    registers: SmpRegisters,
    audio_ram: AudioRam,
    cycles: u64,
}

impl Smp {
    pub fn new() -> Self {
        let mut smp = Self {
            spc700: Spc700::new(),
            thread: Thread::new(SMP_FREQUENCY),
            registers: SmpRegisters::new(),
            audio_ram: AudioRam::new(),
            cycles: 0,
        };
        smp.reset();
        smp
    }

    pub fn power(&mut self) {
        *self = Self::new();
    }

    /// Remap the boot ROM and restart the SPC700 at the IPL entry point. Audio RAM survives.
    pub fn reset(&mut self) {
        self.registers.boot_rom_mapped = true;

        let (spc700, mut bus) = self.split(0);
        spc700.reset(&mut bus);

        self.thread.reset();
    }

    fn split(&mut self, cpu_frequency: u64) -> (&mut Spc700, SmpBus<'_>) {
        let bus = SmpBus {
            registers: &mut self.registers,
            audio_ram: &mut self.audio_ram,
            thread: &mut self.thread,
            cycles: &mut self.cycles,
            cpu_frequency,
        };
        (&mut self.spc700, bus)
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn thread_mut(&mut self) -> &mut Thread {
        &mut self.thread
    }

    /// Execute one SPC700 instruction.
    pub fn main(&mut self, cpu_frequency: u64) {
        let (spc700, mut bus) = self.split(cpu_frequency);
        spc700.execute_instruction(&mut bus);
    }

    /// SPC cycles executed since power-on.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn spc700(&self) -> &Spc700 {
        &self.spc700
    }

    /// Main CPU read from $2140-$217F. The four ports mirror every 4 bytes.
    pub fn read_port(&self, address: u32) -> u8 {
        self.registers.smp_communication[(address & 3) as usize]
    }

    /// Main CPU write to $2140-$217F.
    pub fn write_port(&mut self, address: u32, value: u8) {
        log::trace!("APU port write: {} {value:02X}", address & 3);
        self.registers.main_cpu_communication[(address & 3) as usize] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const CPU_FREQUENCY: u64 = 21_477_272;

    // MOV $F7,#$5A ; BRA self
    const UPLOADED_PROGRAM: [u8; 5] = [0x8F, 0x5A, 0xF7, 0x2F, 0xFE];

    fn run_until(smp: &mut Smp, condition: impl Fn(&Smp) -> bool) {
        for _ in 0..100_000 {
            if condition(smp) {
                return;
            }
            smp.main(CPU_FREQUENCY);
        }
        panic!("SMP never reached the expected state; PC = {:04X}", smp.spc700().registers().pc);
    }

    #[test]
    fn ports_mirror_every_four_bytes() {
        let mut smp = Smp::new();
        assert_eq!(smp.read_port(0x2140), 0x00);

        smp.write_port(0x2156, 0x12);
        assert_eq!(smp.registers.read(0xF6), 0x12);

        smp.registers.write(0xF5, 0x34);
        assert_eq!(smp.read_port(0x2141), 0x34);
        assert_eq!(smp.read_port(0x217D), 0x34);

        // Control bit 4 clears the first two inbound ports
        smp.write_port(0x2140, 0x56);
        smp.registers.write(0xF1, 0x90);
        assert_eq!(smp.registers.read(0xF4), 0x00);
        assert_eq!(smp.registers.read(0xF6), 0x12);
    }

    #[test]
    fn dsp_register_file_is_addressed_through_f2() {
        let mut smp = Smp::new();
        smp.registers.write(0xF2, 0x4C);
        smp.registers.write(0xF3, 0x21);
        assert_eq!(smp.registers.read(0xF3), 0x21);

        // Writes through the upper mirror are dropped, reads see the lower register
        smp.registers.write(0xF2, 0xCC);
        smp.registers.write(0xF3, 0x99);
        assert_eq!(smp.registers.read(0xF3), 0x21);
    }

    #[test]
    fn ipl_posts_ready_signature() {
        let mut smp = Smp::new();
        assert_eq!(smp.spc700().registers().pc, 0xFFC0);

        run_until(&mut smp, |smp| smp.read_port(0x2140) == 0xAA);
        assert_eq!(smp.read_port(0x2141), 0xBB);
        assert_eq!(smp.spc700().registers().sp, 0xEF);
    }

    #[test]
    fn ipl_uploads_and_runs_program() {
        let mut smp = Smp::new();
        run_until(&mut smp, |smp| smp.read_port(0x2140) == 0xAA && smp.read_port(0x2141) == 0xBB);

        // Destination $0200, then the $CC kick
        smp.write_port(0x2142, 0x00);
        smp.write_port(0x2143, 0x02);
        smp.write_port(0x2141, 0x01);
        smp.write_port(0x2140, 0xCC);
        run_until(&mut smp, |smp| smp.read_port(0x2140) == 0xCC);

        for (index, &byte) in UPLOADED_PROGRAM.iter().enumerate() {
            smp.write_port(0x2141, byte);
            smp.write_port(0x2140, index as u8);
            run_until(&mut smp, |smp| smp.read_port(0x2140) == index as u8);
        }

        // Entry point $0200 with a zero length byte ends the transfer
        let last = UPLOADED_PROGRAM.len() as u8 + 1;
        smp.write_port(0x2142, 0x00);
        smp.write_port(0x2143, 0x02);
        smp.write_port(0x2141, 0x00);
        smp.write_port(0x2140, last);
        run_until(&mut smp, |smp| smp.read_port(0x2143) == 0x5A);

        assert_eq!(smp.read_port(0x2140), last);
        assert_eq!(smp.audio_ram[0x0200..0x0205], UPLOADED_PROGRAM);
        assert!((0x0203..=0x0205).contains(&smp.spc700().registers().pc));
    }

    #[test]
    fn boot_rom_unmaps_to_audio_ram() {
        let mut smp = Smp::new();
        smp.audio_ram[0xFFC0] = 0x12;

        let (_, mut bus) = smp.split(CPU_FREQUENCY);
        assert_eq!(bus.read(0xFFC0), IPL_ROM[0]);

        bus.write(0x00F1, 0x00);
        assert_eq!(bus.read(0xFFC0), 0x12);
        assert_eq!(bus.audio_ram[0x00F1], 0x00);
    }

    #[test]
    fn timer_advances_with_cpu_time() {
        let mut smp = Smp::new();
        smp.registers.write(0xFC, 5);
        // Keep the boot ROM mapped while enabling timer 2
        smp.registers.write(0xF1, 0x84);

        // One millisecond of CPU time is about 1025 SPC cycles, 64 fast timer ticks
        smp.thread_mut().lag(CPU_FREQUENCY / 1000);
        while !smp.thread().synchronize_cpu() {
            smp.main(CPU_FREQUENCY);
        }

        let cycles = smp.cycles();
        assert!((1025..1040).contains(&cycles), "cycles {cycles}");
        assert_eq!(u64::from(smp.registers.read(0xFF)), (cycles / 16 / 5) & 0x0F);
    }
}
