//! 5A22 CPU: everything around the 65816 core. Bus cycle timing, the DMA/HDMA controller, the
//! NMI/IRQ pipeline, auto-joypad polling, the hardware multiplier/divider, and the WRAM port.
//!
//! The 65816 core drives a [`CpuBus`], which charges every bus cycle to the master clock, lets the
//! DMA controller take the bus at cycle boundaries, and lags the other board threads by the time
//! spent.

mod dma;
mod io;
mod irq;
mod timing;

#[cfg(test)]
mod tests;

use crate::board::Board;
use crate::counter::Counter;
use crate::cpu::dma::Channel;
use crate::cpu::io::{Alu, IoRegisters};
use bincode::{Decode, Encode};
use snes_common::frontend::TimingMode;
use snes_common::num::Signal;
use snes_config::{CpuVersion, SnesConfig};
use std::mem;
use wdc65816_emu::{BusInterface, Wdc65816};

const CHANNELS: usize = 8;

// 6-clock idle cycles between the reset signal and the reset vector fetch
const RESET_IDLE_CYCLES: u32 = 22;

const NMI_VECTOR_NATIVE: u16 = 0xFFEA;
const NMI_VECTOR_EMULATION: u16 = 0xFFFA;
const IRQ_VECTOR_NATIVE: u16 = 0xFFEE;
const IRQ_VECTOR_EMULATION: u16 = 0xFFFE;

// Horizontal position of the HDMA run trigger on visible lines
const HDMA_POSITION: u16 = 1104;

// Auto-joypad counter value while no polling sequence is in progress
const AUTO_JOYPAD_INACTIVE: u8 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
enum HdmaMode {
    #[default]
    Setup,
    Run,
}

fn hdma_setup_position(version: CpuVersion, dma_counter: u64) -> u16 {
    match version {
        CpuVersion::One => 12 + 8 - dma_counter as u16,
        CpuVersion::Two => 12 + dma_counter as u16,
    }
}

fn dram_refresh_position(version: CpuVersion, dma_counter: u64) -> u16 {
    match version {
        CpuVersion::One => 530,
        CpuVersion::Two => 530 + 8 - dma_counter as u16,
    }
}

#[derive(Debug, Clone, Encode, Decode)]
struct Status {
    // Length of the bus cycle in progress
    clock_count: u64,
    // Blocks interrupt recognition at the next instruction boundary
    irq_lock: bool,

    dram_refresh_position: u16,
    dram_refreshed: bool,
    hdma_setup_position: u16,
    hdma_setup_triggered: bool,
    hdma_position: u16,
    hdma_triggered: bool,

    nmi_valid: Signal,
    nmi_line: bool,
    nmi_transition: bool,
    nmi_pending: bool,
    nmi_hold: Signal,

    irq_valid: Signal,
    irq_line: bool,
    irq_transition: bool,
    irq_pending: bool,
    irq_hold: bool,

    reset_pending: bool,
    interrupt_pending: bool,
    wai_released: bool,

    dma_active: bool,
    dma_clocks: u64,
    dma_pending: bool,
    hdma_pending: bool,
    hdma_mode: HdmaMode,

    auto_joypad_counter: u8,
}

impl Status {
    fn new(version: CpuVersion) -> Self {
        Self {
            clock_count: 6,
            irq_lock: false,
            dram_refresh_position: dram_refresh_position(version, 0),
            dram_refreshed: false,
            hdma_setup_position: hdma_setup_position(version, 0),
            hdma_setup_triggered: false,
            hdma_position: HDMA_POSITION,
            hdma_triggered: false,
            nmi_valid: Signal::default(),
            nmi_line: false,
            nmi_transition: false,
            nmi_pending: false,
            nmi_hold: Signal::default(),
            irq_valid: Signal::default(),
            irq_line: false,
            irq_transition: false,
            irq_pending: false,
            irq_hold: false,
            reset_pending: true,
            interrupt_pending: true,
            wai_released: false,
            dma_active: false,
            dma_clocks: 0,
            dma_pending: false,
            hdma_pending: false,
            hdma_mode: HdmaMode::default(),
            auto_joypad_counter: AUTO_JOYPAD_INACTIVE,
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Cpu {
    version: CpuVersion,
    counter: Counter,
    // Master clocks since power-on
    clocks: u64,
    mdr: u8,
    mar: u32,
    status: Status,
    io: IoRegisters,
    alu: Alu,
    channels: [Channel; CHANNELS],
}

impl Cpu {
    pub fn new(timing_mode: TimingMode, config: &SnesConfig) -> Self {
        let version = config.cpu_version;
        Self {
            version,
            counter: Counter::new(timing_mode),
            clocks: 0,
            mdr: 0,
            mar: 0,
            status: Status::new(version),
            io: IoRegisters::new(),
            alu: Alu::default(),
            channels: std::array::from_fn(|_| Channel::new()),
        }
    }

    pub fn power(&mut self) {
        log::debug!("Powering on 5A22 (CPU version {})", self.version.number());

        self.channels = std::array::from_fn(|_| Channel::new());
        self.mdr = 0;
        self.reset();
    }

    /// Reset keeps the DMA channel registers and the open bus value.
    pub fn reset(&mut self) {
        self.counter.reset();
        self.clocks = 0;
        self.mar = 0;
        self.status = Status::new(self.version);
        self.io = IoRegisters::new();
        self.alu = Alu::default();
        for channel in &mut self.channels {
            channel.dma_enable = false;
            channel.hdma_enable = false;
        }
    }

    /// Run one instruction, one interrupt sequence, or one cycle of WAI/STP.
    pub fn main(&mut self, core: &mut Wdc65816, board: &mut Board) {
        let mut bus = CpuBus { cpu: self, board };
        bus.main(core);
    }

    /// Master clocks since power-on.
    #[inline]
    pub fn clocks(&self) -> u64 {
        self.clocks
    }

    #[inline]
    pub fn mdr(&self) -> u8 {
        self.mdr
    }
}

/// The 65816 core's view of the system: every access goes through 5A22 timing.
pub struct CpuBus<'a> {
    cpu: &'a mut Cpu,
    board: &'a mut Board,
}

impl CpuBus<'_> {
    fn main(&mut self, core: &mut Wdc65816) {
        if core.is_waiting() {
            if !self.cpu.status.wai_released {
                let irq_disabled = core.registers().p.irq_disabled;
                self.cpu.last_cycle(irq_disabled);
                self.idle();
            }
            if mem::take(&mut self.cpu.status.wai_released) {
                core.wake();
            }
            return;
        }

        if core.is_stopped() {
            self.idle();
            return;
        }

        if !self.cpu.status.interrupt_pending {
            self.cpu.status.wai_released = false;
            core.execute_instruction(self);
            return;
        }

        let emulation_mode = core.registers().emulation_mode;

        if mem::take(&mut self.cpu.status.nmi_pending) {
            let vector = if emulation_mode { NMI_VECTOR_EMULATION } else { NMI_VECTOR_NATIVE };
            log::trace!("Taking NMI at V={}", self.cpu.counter.vcounter());
            core.interrupt(self, vector);
            return;
        }

        if mem::take(&mut self.cpu.status.irq_pending) {
            let vector = if emulation_mode { IRQ_VECTOR_EMULATION } else { IRQ_VECTOR_NATIVE };
            log::trace!(
                "Taking IRQ at V={} H={}",
                self.cpu.counter.vcounter(),
                self.cpu.counter.hcounter()
            );
            core.interrupt(self, vector);
            return;
        }

        if mem::take(&mut self.cpu.status.reset_pending) {
            for _ in 0..RESET_IDLE_CYCLES {
                self.step(6);
            }
            core.reset(self);
            log::debug!("Reset vector fetched, PC={:04X}", core.registers().pc);
            return;
        }

        self.cpu.status.interrupt_pending = false;
    }
}
