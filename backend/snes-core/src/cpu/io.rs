//! CPU I/O registers at $4016-$421F, the hardware multiplier/divider, auto-joypad polling, and the
//! WRAM data port at $2180-$2183.

use crate::cpu::{AUTO_JOYPAD_INACTIVE, CpuBus};
use bincode::{Decode, Encode};
use snes_common::num::{GetBit, Natural, Signal, U9, U16Ext};

#[derive(Debug, Clone, Encode, Decode)]
pub struct IoRegisters {
    // WMADDL/WMADDM/WMADDH
    pub wram_address: Natural<17>,
    // NMITIMEN
    pub auto_joypad_poll: bool,
    pub hirq_enable: bool,
    pub virq_enable: bool,
    pub irq_enable: bool,
    pub nmi_enable: Signal,
    // WRIO
    pub pio: u8,
    // WRMPYA/WRMPYB/WRDIVL/WRDIVH/WRDIVB
    pub wrmpya: u8,
    pub wrmpyb: u8,
    pub wrdiva: u16,
    pub wrdivb: u8,
    // HTIMEL/HTIMEH/VTIMEL/VTIMEH
    pub htime: U9,
    pub vtime: U9,
    // MEMSEL: 6 or 8 clocks for banks $80-$FF
    pub rom_speed: u64,
    // RDDIVL/RDDIVH/RDMPYL/RDMPYH
    pub rddiv: u16,
    pub rdmpy: u16,
    // JOY1L-JOY4H
    pub joy1: u16,
    pub joy2: u16,
    pub joy3: u16,
    pub joy4: u16,
}

impl IoRegisters {
    pub fn new() -> Self {
        Self {
            wram_address: Natural::ZERO,
            auto_joypad_poll: false,
            hirq_enable: false,
            virq_enable: false,
            irq_enable: false,
            nmi_enable: Signal::default(),
            pio: 0xFF,
            wrmpya: 0xFF,
            wrmpyb: 0xFF,
            wrdiva: 0xFFFF,
            wrdivb: 0xFF,
            htime: U9::MAX,
            vtime: U9::MAX,
            rom_speed: 8,
            rddiv: 0,
            rdmpy: 0,
            joy1: 0,
            joy2: 0,
            joy3: 0,
            joy4: 0,
        }
    }
}

/// Shift-and-add multiplier/divider state. Each CPU cycle advances it by one bit.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Alu {
    pub mpyctr: u8,
    pub divctr: u8,
    pub shift: u32,
}

impl CpuBus<'_> {
    pub(super) fn read_io(&mut self, address: u32) -> u8 {
        let mdr = self.cpu.mdr;

        match address & 0xFFFF {
            0x4016 => {
                // JOYSER0: Controller port 1 serial data
                (mdr & 0xFC) | u8::from(self.board.joypads[0].data())
            }
            0x4017 => {
                // JOYSER1: Controller port 2 serial data; bits 2-4 are tied high
                (mdr & 0xE0) | 0x1C | u8::from(self.board.joypads[1].data())
            }
            0x4210 => {
                // RDNMI: NMI flag and CPU version
                (mdr & 0x70) | (u8::from(self.cpu.rdnmi()) << 7) | self.cpu.version.number()
            }
            0x4211 => {
                // TIMEUP: IRQ flag
                (mdr & 0x7F) | (u8::from(self.cpu.timeup()) << 7)
            }
            0x4212 => {
                // HVBJOY: Blanking and auto-joypad status
                let hcounter = self.cpu.counter.hcounter();
                let vcounter = self.cpu.counter.vcounter();
                let hblank = hcounter <= 2 || hcounter >= 1096;
                let vblank = vcounter >= self.board.ppu.vdisp();
                let auto_joypad_busy = self.cpu.status.auto_joypad_counter < AUTO_JOYPAD_INACTIVE;

                (mdr & 0x3E)
                    | u8::from(auto_joypad_busy)
                    | (u8::from(hblank) << 6)
                    | (u8::from(vblank) << 7)
            }
            0x4213 => self.cpu.io.pio,
            0x4214 => self.cpu.io.rddiv.lsb(),
            0x4215 => self.cpu.io.rddiv.msb(),
            0x4216 => self.cpu.io.rdmpy.lsb(),
            0x4217 => self.cpu.io.rdmpy.msb(),
            0x4218 => self.cpu.io.joy1.lsb(),
            0x4219 => self.cpu.io.joy1.msb(),
            0x421A => self.cpu.io.joy2.lsb(),
            0x421B => self.cpu.io.joy2.msb(),
            0x421C => self.cpu.io.joy3.lsb(),
            0x421D => self.cpu.io.joy3.msb(),
            0x421E => self.cpu.io.joy4.lsb(),
            0x421F => self.cpu.io.joy4.msb(),
            _ => mdr,
        }
    }

    pub(super) fn write_io(&mut self, address: u32, value: u8) {
        log::trace!("CPU internal register write: {address:06X} {value:02X}");

        match address & 0xFFFF {
            0x4016 => {
                // JOYOUT: Controller latch
                for joypad in &mut self.board.joypads {
                    joypad.latch(value.bit(0));
                }
            }
            0x4200 => self.cpu.write_nmitimen(value),
            0x4201 => {
                // WRIO: Programmable I/O port; a falling bit 7 latches the PPU counters
                self.board.sync_ppu();
                self.board.ppu.update_wrio(value);
                self.cpu.io.pio = value;
            }
            0x4202 => self.cpu.io.wrmpya = value,
            0x4203 => {
                // WRMPYB: Start multiplication
                let (io, alu) = (&mut self.cpu.io, &mut self.cpu.alu);
                io.rdmpy = 0;
                if alu.mpyctr != 0 || alu.divctr != 0 {
                    return;
                }

                io.wrmpyb = value;
                io.rddiv = u16::from_le_bytes([io.wrmpya, io.wrmpyb]);
                alu.mpyctr = 8;
                alu.shift = u32::from(io.wrmpyb);
            }
            0x4204 => self.cpu.io.wrdiva.set_lsb(value),
            0x4205 => self.cpu.io.wrdiva.set_msb(value),
            0x4206 => {
                // WRDIVB: Start division
                let (io, alu) = (&mut self.cpu.io, &mut self.cpu.alu);
                io.rdmpy = io.wrdiva;
                if alu.mpyctr != 0 || alu.divctr != 0 {
                    return;
                }

                io.wrdivb = value;
                alu.divctr = 16;
                alu.shift = u32::from(io.wrdivb) << 16;
            }
            0x4207 => {
                let htime = self.cpu.io.htime.get();
                self.cpu.io.htime.set((htime & 0x100) | u32::from(value));
            }
            0x4208 => {
                let htime = self.cpu.io.htime.get();
                self.cpu.io.htime.set((htime & 0x0FF) | (u32::from(value & 1) << 8));
            }
            0x4209 => {
                let vtime = self.cpu.io.vtime.get();
                self.cpu.io.vtime.set((vtime & 0x100) | u32::from(value));
            }
            0x420A => {
                let vtime = self.cpu.io.vtime.get();
                self.cpu.io.vtime.set((vtime & 0x0FF) | (u32::from(value & 1) << 8));
            }
            0x420B => {
                // MDMAEN: Start general-purpose DMA
                for (i, channel) in self.cpu.channels.iter_mut().enumerate() {
                    channel.dma_enable = value.bit(i as u8);
                }
                if value != 0 {
                    self.cpu.status.dma_pending = true;
                }
            }
            0x420C => {
                // HDMAEN: HDMA channel enable
                for (i, channel) in self.cpu.channels.iter_mut().enumerate() {
                    channel.hdma_enable = value.bit(i as u8);
                }
            }
            0x420D => {
                // MEMSEL: FastROM enable
                self.cpu.io.rom_speed = if value.bit(0) { 6 } else { 8 };
                log::trace!("  ROM access speed: {} clocks", self.cpu.io.rom_speed);
            }
            _ => {}
        }
    }

    pub(super) fn read_wram_port(&mut self, address: u32) -> u8 {
        match address & 0xFFFF {
            0x2180 => {
                // WMDATA: WRAM data port
                let value = self.board.wram.read(self.cpu.io.wram_address.get());
                self.cpu.io.wram_address.increment();
                value
            }
            _ => self.cpu.mdr,
        }
    }

    pub(super) fn write_wram_port(&mut self, address: u32, value: u8) {
        let wram_address = &mut self.cpu.io.wram_address;
        match address & 0xFFFF {
            0x2180 => {
                self.board.wram.write(wram_address.get(), value);
                wram_address.increment();
            }
            0x2181 => wram_address.set((wram_address.get() & 0x1FF00) | u32::from(value)),
            0x2182 => wram_address.set((wram_address.get() & 0x100FF) | (u32::from(value) << 8)),
            0x2183 => {
                wram_address.set((wram_address.get() & 0x0FFFF) | (u32::from(value & 1) << 16));
            }
            _ => {}
        }
    }

    /// Auto-joypad polling, called every 256 master clocks. Each sequence shifts 16 bits from each
    /// port over 32 calls.
    pub(super) fn joypad_edge(&mut self) {
        if !self.cpu.io.auto_joypad_poll {
            return;
        }

        // A sequence starts on the first edge at or after H=130 of the first vblank line
        if self.cpu.counter.vcounter() == self.board.ppu.vdisp()
            && self.cpu.counter.hcounter() >= 130
            && self.cpu.status.auto_joypad_counter == AUTO_JOYPAD_INACTIVE
        {
            self.cpu.status.auto_joypad_counter = 0;
        }

        let counter = self.cpu.status.auto_joypad_counter;
        if counter >= AUTO_JOYPAD_INACTIVE {
            return;
        }

        let [port1, port2] = &mut self.board.joypads;
        let io = &mut self.cpu.io;
        match counter {
            0 => {
                port1.latch(true);
                port2.latch(true);
            }
            1 => {
                port1.latch(false);
                port2.latch(false);
                io.joy1 = 0;
                io.joy2 = 0;
                io.joy3 = 0;
                io.joy4 = 0;
            }
            _ if !counter.bit(0) => {
                // Standard controllers only drive data line 1; data line 2 feeds JOY3/JOY4
                io.joy1 = (io.joy1 << 1) | u16::from(port1.data());
                io.joy2 = (io.joy2 << 1) | u16::from(port2.data());
                io.joy3 <<= 1;
                io.joy4 <<= 1;
            }
            _ => {}
        }

        self.cpu.status.auto_joypad_counter += 1;
    }
}
