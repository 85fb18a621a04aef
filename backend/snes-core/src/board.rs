//! Everything on the system board other than the main CPU: work RAM, the PPU, the SMP, the
//! cartridge, the controller ports, the bus map, and the scheduler that keeps the clocked units in
//! step with the CPU.

use crate::apu::Smp;
use crate::bus::{Bus, BusError};
use crate::cartridge::Cartridge;
use crate::input::Joypad;
use crate::memory::WritableMemory;
use crate::ppu::{Ppu, PpuTickEffect};
use crate::scheduler::{Scheduler, SchedulerEvent, ThreadId};
use bincode::{Decode, Encode};
use snes_common::frontend::TimingMode;
use snes_common::thread::Thread;
use snes_config::SnesConfig;
use snes_coprocessors::Coprocessor;
use snes_coprocessors::common::{NTSC_MASTER_CLOCK_FREQUENCY, PAL_MASTER_CLOCK_FREQUENCY};

const WRAM_LEN: usize = 128 * 1024;

/// Handler a bus mapping dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Port {
    Wram,
    WramIo,
    Ppu,
    Apu,
    Cpu,
    Dma,
    Rom,
    Sram,
    Coprocessor,
}

fn map_system(bus: &mut Bus<Port>) -> Result<(), BusError> {
    bus.map(Port::Wram, "00-3f,80-bf:0000-1fff", 0, 0x2000, 0)?;
    bus.map(Port::Ppu, "00-3f,80-bf:2100-213f", 0, 0, 0)?;
    bus.map(Port::Apu, "00-3f,80-bf:2140-217f", 0, 0, 0)?;
    bus.map(Port::WramIo, "00-3f,80-bf:2180-2183", 0, 0, 0)?;
    bus.map(Port::Cpu, "00-3f,80-bf:4000-42ff", 0, 0, 0)?;
    bus.map(Port::Dma, "00-3f,80-bf:4300-43ff", 0, 0, 0)?;
    bus.map(Port::Wram, "7e-7f:0000-ffff", 0, WRAM_LEN as u32, 0)?;
    Ok(())
}

pub fn cpu_frequency(timing_mode: TimingMode) -> u64 {
    match timing_mode {
        TimingMode::Ntsc => NTSC_MASTER_CLOCK_FREQUENCY,
        TimingMode::Pal => PAL_MASTER_CLOCK_FREQUENCY,
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Board {
    pub scheduler: Scheduler,
    pub bus: Bus<Port>,
    pub wram: WritableMemory,
    pub ppu: Ppu,
    pub smp: Smp,
    pub cartridge: Cartridge,
    pub joypads: [Joypad; 2],
    cpu_frequency: u64,
}

impl Board {
    pub fn new(cartridge: Cartridge, config: &SnesConfig) -> Result<Self, BusError> {
        let timing_mode = cartridge.timing_mode();
        let cpu_frequency = cpu_frequency(timing_mode);

        let mut bus = Bus::new();
        map_system(&mut bus)?;
        cartridge.map(&mut bus)?;
        log::debug!("Bus has {} live mappings", bus.mapping_count());

        Ok(Self {
            scheduler: Scheduler::new(),
            bus,
            wram: WritableMemory::random(WRAM_LEN),
            ppu: Ppu::new(timing_mode, cpu_frequency, config),
            smp: Smp::new(),
            cartridge,
            joypads: [Joypad::default(), Joypad::default()],
            cpu_frequency,
        })
    }

    pub fn power(&mut self) {
        self.scheduler.power();
        self.wram = WritableMemory::random(WRAM_LEN);
        self.ppu.power();
        self.smp.power();
        self.cartridge.power();
        if let Some(thread) = self.coprocessor_thread_mut() {
            thread.reset();
        }
    }

    pub fn reset(&mut self) {
        self.scheduler.power();
        self.ppu.reset();
        self.smp.reset();
        self.cartridge.power();
        if let Some(thread) = self.coprocessor_thread_mut() {
            thread.reset();
        }
    }

    #[inline]
    pub fn cpu_frequency(&self) -> u64 {
        self.cpu_frequency
    }

    /// Bus read from a board-owned handler. CPU-internal handlers return `mdr`.
    pub fn read(&mut self, port: Port, address: u32, target: u32, mdr: u8) -> u8 {
        match port {
            Port::Wram => self.wram.read(target),
            Port::Ppu => {
                self.sync_ppu();
                self.ppu.read_port(address).unwrap_or(mdr)
            }
            Port::Apu => {
                self.sync_smp();
                self.smp.read_port(address)
            }
            Port::Rom => self.cartridge.read_rom(target),
            Port::Sram => self.cartridge.read_sram(target),
            Port::Coprocessor => {
                self.sync_coprocessor();
                match self.cartridge.coprocessor_mut() {
                    Some(coprocessor) => coprocessor.read(address, mdr),
                    None => mdr,
                }
            }
            Port::WramIo | Port::Cpu | Port::Dma => mdr,
        }
    }

    pub fn write(&mut self, port: Port, address: u32, target: u32, value: u8) {
        match port {
            Port::Wram => self.wram.write(target, value),
            Port::Ppu => {
                self.sync_ppu();
                self.ppu.write_port(address, value);
            }
            Port::Apu => {
                self.sync_smp();
                self.smp.write_port(address, value);
            }
            Port::Sram => self.cartridge.write_sram(target, value),
            Port::Coprocessor => {
                self.sync_coprocessor();
                if let Some(coprocessor) = self.cartridge.coprocessor_mut() {
                    coprocessor.write(address, value);
                }
            }
            Port::Rom | Port::WramIo | Port::Cpu | Port::Dma => {}
        }
    }

    /// The CPU advanced by `clocks` master clocks.
    pub fn lag(&mut self, clocks: u64) {
        self.ppu.thread_mut().lag(clocks);
        self.smp.thread_mut().lag(clocks);
        if let Some(thread) = self.coprocessor_thread_mut() {
            thread.lag(clocks);
        }
    }

    /// Whether `thread` is no longer behind the CPU.
    pub fn caught_up(&self, thread: ThreadId) -> bool {
        match thread {
            ThreadId::Cpu => true,
            ThreadId::Ppu => self.ppu.thread().synchronize_cpu(),
            ThreadId::Smp => self.smp.thread().synchronize_cpu(),
            ThreadId::Coprocessor(_) => {
                self.cartridge.coprocessor().is_none_or(Coprocessor::synchronize_cpu)
            }
        }
    }

    /// Run one unit of work of a peripheral.
    pub fn run(&mut self, thread: ThreadId) {
        match thread {
            ThreadId::Cpu => {}
            ThreadId::Ppu => self.run_ppu(),
            ThreadId::Smp => self.smp.main(self.cpu_frequency),
            ThreadId::Coprocessor(_) => {
                let cpu_frequency = self.cpu_frequency;
                if let Some(coprocessor) = self.cartridge.coprocessor_mut() {
                    coprocessor.main(cpu_frequency);
                }
            }
        }
    }

    fn run_ppu(&mut self) {
        if self.ppu.main(self.cpu_frequency) == PpuTickEffect::FrameComplete {
            self.scheduler.leave(SchedulerEvent::Frame);
        }
    }

    fn catch_up(&mut self, thread: ThreadId) {
        if self.caught_up(thread) {
            return;
        }

        self.scheduler.resume(thread);
        while !self.caught_up(thread) {
            self.run(thread);
        }
        self.scheduler.restore(ThreadId::Cpu);
    }

    pub fn sync_ppu(&mut self) {
        self.catch_up(ThreadId::Ppu);
    }

    pub fn sync_smp(&mut self) {
        self.catch_up(ThreadId::Smp);
    }

    pub fn sync_coprocessor(&mut self) {
        self.catch_up(ThreadId::Coprocessor(0));
    }

    fn coprocessor_thread_mut(&mut self) -> Option<&mut Thread> {
        self.cartridge.coprocessor_mut().and_then(Coprocessor::thread_mut)
    }

    /// Reattach configuration that save states exclude.
    pub fn take_rom_and_bus_from(&mut self, other: &mut Self) {
        self.cartridge.take_rom_from(&mut other.cartridge);
        std::mem::swap(&mut self.bus, &mut other.bus);
    }
}
