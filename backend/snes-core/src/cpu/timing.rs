//! Bus cycle timing and the per-clock work that runs while the CPU owns the bus.

use crate::board::Port;
use crate::cpu::{AUTO_JOYPAD_INACTIVE, CpuBus, HDMA_POSITION, HdmaMode};
use crate::cpu::{dram_refresh_position, hdma_setup_position};
use wdc65816_emu::BusInterface;

const FAST_CYCLE_CLOCKS: u64 = 6;
const SLOW_CYCLE_CLOCKS: u64 = 8;
const XSLOW_CYCLE_CLOCKS: u64 = 12;

const DRAM_REFRESH_CLOCKS: u64 = 40;

impl CpuBus<'_> {
    /// Length of a bus cycle that accesses `address`, in master clocks.
    fn wait(&self, address: u32) -> u64 {
        if address & 0x408000 != 0 {
            // Banks $80-$FF use the MEMSEL speed; banks $00-$7F are always slow
            return if address & 0x800000 != 0 { self.cpu.io.rom_speed } else { SLOW_CYCLE_CLOCKS };
        }

        if address.wrapping_add(0x6000) & 0x4000 != 0 {
            // $0000-$1FFF and $6000-$7FFF
            return SLOW_CYCLE_CLOCKS;
        }

        if address.wrapping_sub(0x4000) & 0x7E00 != 0 {
            // $2000-$3FFF and $4200-$5FFF
            return FAST_CYCLE_CLOCKS;
        }

        // $4000-$41FF, the serial controller ports
        XSLOW_CYCLE_CLOCKS
    }

    /// Position within the 8-clock DMA alignment grid.
    pub(super) fn dma_counter(&self) -> u64 {
        (self.cpu.clocks + u64::from(self.cpu.counter.hcounter())) & 7
    }

    /// Advance the CPU by `clocks` master clocks.
    pub(super) fn step(&mut self, clocks: u64) {
        // Other threads fall behind by the whole step before any scanline sync inside it runs
        self.board.lag(clocks);

        for _ in 0..clocks >> 1 {
            self.cpu.clocks += 2;

            let interlace = self.board.ppu.interlace();
            if self.cpu.counter.tick(2, interlace) {
                self.scanline();
            }

            if self.cpu.counter.hcounter() & 2 != 0 {
                self.poll_interrupts();
            }

            if self.cpu.clocks & 0xFF == 0 {
                self.joypad_edge();
            }
        }

        let hcounter = self.cpu.counter.hcounter();

        if !self.cpu.status.dram_refreshed && hcounter >= self.cpu.status.dram_refresh_position {
            self.cpu.status.dram_refreshed = true;
            self.step(DRAM_REFRESH_CLOCKS);
        }

        if !self.cpu.status.hdma_setup_triggered
            && hcounter >= self.cpu.status.hdma_setup_position
        {
            self.cpu.status.hdma_setup_triggered = true;
            self.hdma_reset();
            if self.hdma_enabled() {
                self.cpu.status.hdma_pending = true;
                self.cpu.status.hdma_mode = HdmaMode::Setup;
            }
        }

        if !self.cpu.status.hdma_triggered && hcounter >= self.cpu.status.hdma_position {
            self.cpu.status.hdma_triggered = true;
            if self.hdma_active() {
                self.cpu.status.hdma_pending = true;
                self.cpu.status.hdma_mode = HdmaMode::Run;
            }
        }
    }

    fn scanline(&mut self) {
        // Bring every other thread up to the CPU once per line even if nothing talks to them
        self.board.sync_smp();
        self.board.sync_ppu();
        self.board.sync_coprocessor();

        let version = self.cpu.version;
        let dma_counter = self.dma_counter();
        let vcounter = self.cpu.counter.vcounter();
        let vdisp = self.board.ppu.vdisp();
        let status = &mut self.cpu.status;

        if vcounter == 0 {
            status.hdma_setup_position = hdma_setup_position(version, dma_counter);
            status.hdma_setup_triggered = false;
            status.auto_joypad_counter = AUTO_JOYPAD_INACTIVE;
        }

        status.dram_refresh_position = dram_refresh_position(version, dma_counter);
        status.dram_refreshed = false;

        if vcounter < vdisp {
            status.hdma_position = HDMA_POSITION;
            status.hdma_triggered = false;
        }
    }

    /// Advance the hardware multiplier/divider by one bit.
    fn alu_edge(&mut self) {
        let alu = &mut self.cpu.alu;
        let io = &mut self.cpu.io;

        if alu.mpyctr != 0 {
            alu.mpyctr -= 1;
            if io.rddiv & 1 != 0 {
                io.rdmpy = io.rdmpy.wrapping_add(alu.shift as u16);
            }
            io.rddiv >>= 1;
            alu.shift <<= 1;
        }

        if alu.divctr != 0 {
            alu.divctr -= 1;
            io.rddiv <<= 1;
            alu.shift >>= 1;
            if u32::from(io.rdmpy) >= alu.shift {
                io.rdmpy = io.rdmpy.wrapping_sub(alu.shift as u16);
                io.rddiv |= 1;
            }
        }
    }

    /// Untimed read through the bus map.
    pub(super) fn bus_read(&mut self, address: u32) -> u8 {
        let mdr = self.cpu.mdr;
        match self.board.bus.lookup(address) {
            Some((Port::Cpu, _)) => self.read_io(address),
            Some((Port::Dma, _)) => self.cpu.read_dma(address),
            Some((Port::WramIo, _)) => self.read_wram_port(address),
            Some((port, target)) => self.board.read(port, address, target, mdr),
            None => mdr,
        }
    }

    /// Untimed write through the bus map.
    pub(super) fn bus_write(&mut self, address: u32, value: u8) {
        match self.board.bus.lookup(address) {
            Some((Port::Cpu, _)) => self.write_io(address, value),
            Some((Port::Dma, _)) => self.cpu.write_dma(address, value),
            Some((Port::WramIo, _)) => self.write_wram_port(address, value),
            Some((port, target)) => self.board.write(port, address, target, value),
            None => {}
        }
    }
}

impl BusInterface for CpuBus<'_> {
    fn read(&mut self, address: u32) -> u8 {
        self.cpu.status.irq_lock = false;
        self.cpu.status.clock_count = self.wait(address);
        self.dma_edge();
        self.cpu.mar = address;
        self.step(self.cpu.status.clock_count - 4);
        let value = self.bus_read(address);
        self.step(4);
        self.alu_edge();

        // Internal register reads at $4000-$43FF do not drive the external data bus
        if address & 0x40FC00 != 0x4000 {
            self.cpu.mdr = value;
        }

        value
    }

    fn write(&mut self, address: u32, value: u8) {
        self.cpu.status.irq_lock = false;
        self.alu_edge();
        self.cpu.status.clock_count = self.wait(address);
        self.dma_edge();
        self.cpu.mar = address;
        self.step(self.cpu.status.clock_count);
        self.cpu.mdr = value;
        self.bus_write(address, value);
    }

    fn idle(&mut self) {
        self.cpu.status.irq_lock = false;
        self.cpu.status.clock_count = FAST_CYCLE_CLOCKS;
        self.dma_edge();
        self.step(FAST_CYCLE_CLOCKS);
        self.alu_edge();
    }

    fn last_cycle(&mut self, irq_disabled: bool) {
        self.cpu.last_cycle(irq_disabled);
    }

    fn interrupt_pending(&self) -> bool {
        self.cpu.status.interrupt_pending
    }
}
