//! General-purpose DMA and HBlank DMA.
//!
//! The DMA controller only takes the bus at CPU cycle boundaries ([`CpuBus::dma_edge`]). Entering
//! DMA first aligns to the 8-clock DMA grid, and leaving it realigns to the length of the
//! interrupted CPU cycle.

use crate::cpu::{CHANNELS, CpuBus, HdmaMode};
use bincode::{Decode, Encode};
use snes_common::num::{GetBit, U2, U16Ext, U24Ext};
use std::mem;

// Bus B (8-bit) is mapped to $2100-$21FF in Bus A (24-bit)
const BUS_B_BASE_ADDRESS: u32 = 0x002100;

// Bytes per HDMA line for each transfer mode
const HDMA_TRANSFER_LENGTHS: [u8; 8] = [1, 2, 2, 4, 4, 4, 2, 4];

const WRAM_PORT_B_ADDRESS: u8 = 0x80;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Channel {
    pub dma_enable: bool,
    pub hdma_enable: bool,
    // DMAPx
    direction: bool,
    indirect: bool,
    unused: bool,
    reverse: bool,
    fixed: bool,
    transfer_mode: u8,
    // BBADx
    target_address: u8,
    // A1TxL/A1TxH/A1Bx
    source_address: u16,
    source_bank: u8,
    // DASxL/DASxH, also the HDMA indirect address
    transfer_size: u16,
    // DASBx
    indirect_bank: u8,
    // A2AxL/A2AxH
    hdma_address: u16,
    // NTRLx
    line_counter: u8,
    unknown: u8,
    hdma_completed: bool,
    hdma_do_transfer: bool,
}

impl Channel {
    /// Channel registers power on with every bit set.
    pub fn new() -> Self {
        Self {
            dma_enable: false,
            hdma_enable: false,
            direction: true,
            indirect: true,
            unused: true,
            reverse: true,
            fixed: true,
            transfer_mode: 7,
            target_address: 0xFF,
            source_address: 0xFFFF,
            source_bank: 0xFF,
            transfer_size: 0xFFFF,
            indirect_bank: 0xFF,
            hdma_address: 0xFFFF,
            line_counter: 0xFF,
            unknown: 0xFF,
            hdma_completed: false,
            hdma_do_transfer: false,
        }
    }

    fn hdma_active(&self) -> bool {
        self.hdma_enable && !self.hdma_completed
    }

    fn read_register(&self, address: u32) -> Option<u8> {
        let value = match address & 0xFF8F {
            0x4300 => {
                // DMAPx: DMA parameters
                (u8::from(self.direction) << 7)
                    | (u8::from(self.indirect) << 6)
                    | (u8::from(self.unused) << 5)
                    | (u8::from(self.reverse) << 4)
                    | (u8::from(self.fixed) << 3)
                    | self.transfer_mode
            }
            0x4301 => self.target_address,
            0x4302 => self.source_address.lsb(),
            0x4303 => self.source_address.msb(),
            0x4304 => self.source_bank,
            0x4305 => self.transfer_size.lsb(),
            0x4306 => self.transfer_size.msb(),
            0x4307 => self.indirect_bank,
            0x4308 => self.hdma_address.lsb(),
            0x4309 => self.hdma_address.msb(),
            0x430A => self.line_counter,
            0x430B | 0x430F => self.unknown,
            _ => return None,
        };
        Some(value)
    }

    fn write_register(&mut self, address: u32, value: u8) {
        match address & 0xFF8F {
            0x4300 => {
                // DMAPx: DMA parameters
                self.direction = value.bit(7);
                self.indirect = value.bit(6);
                self.unused = value.bit(5);
                self.reverse = value.bit(4);
                self.fixed = value.bit(3);
                self.transfer_mode = value & 0x07;

                log::trace!("  DMA transfer mode: {}", self.transfer_mode);
                log::trace!("  DMA direction B->A: {}", self.direction);
                log::trace!("  HDMA indirect: {}", self.indirect);
            }
            0x4301 => self.target_address = value,
            0x4302 => self.source_address.set_lsb(value),
            0x4303 => self.source_address.set_msb(value),
            0x4304 => self.source_bank = value,
            0x4305 => self.transfer_size.set_lsb(value),
            0x4306 => self.transfer_size.set_msb(value),
            0x4307 => self.indirect_bank = value,
            0x4308 => self.hdma_address.set_lsb(value),
            0x4309 => self.hdma_address.set_msb(value),
            0x430A => self.line_counter = value,
            0x430B | 0x430F => self.unknown = value,
            _ => {}
        }
    }
}

impl super::Cpu {
    pub(super) fn read_dma(&self, address: u32) -> u8 {
        let channel = ((address >> 4) & 0x7) as usize;
        self.channels[channel].read_register(address).unwrap_or(self.mdr)
    }

    pub(super) fn write_dma(&mut self, address: u32, value: u8) {
        let channel = ((address >> 4) & 0x7) as usize;
        log::trace!("DMA register write: {address:06X} {value:02X} (channel {channel})");
        self.channels[channel].write_register(address, value);
    }
}

/// Bus A addresses the DMA controller cannot reach: the bus B window and the CPU's own registers.
fn valid_a(address: u32) -> bool {
    address & 0x40FF00 != 0x2100
        && address & 0x40FE00 != 0x4000
        && address & 0x40FFE0 != 0x4200
        && address & 0x40FF80 != 0x4300
}

fn u24(bank: u8, offset: u16) -> u32 {
    let mut address = u32::from(offset);
    address.set_high_byte(bank);
    address
}

impl CpuBus<'_> {
    fn dma_enabled(&self) -> bool {
        self.cpu.channels.iter().any(|channel| channel.dma_enable)
    }

    pub(super) fn hdma_enabled(&self) -> bool {
        self.cpu.channels.iter().any(|channel| channel.hdma_enable)
    }

    pub(super) fn hdma_active(&self) -> bool {
        self.cpu.channels.iter().any(Channel::hdma_active)
    }

    /// Whether no channel after `channel` still has HDMA work this frame.
    fn hdma_finished(&self, channel: usize) -> bool {
        !self.cpu.channels[channel + 1..].iter().any(Channel::hdma_active)
    }

    /// Called at the start of every CPU bus cycle. Runs pending HDMA and DMA, with the clock
    /// alignment required on entry and exit.
    pub(super) fn dma_edge(&mut self) {
        if self.cpu.status.dma_active {
            if mem::take(&mut self.cpu.status.hdma_pending) && self.hdma_enabled() {
                // Only align when HDMA is not interrupting a DMA that is already aligned
                if !self.dma_enabled() {
                    self.dma_align();
                }

                match self.cpu.status.hdma_mode {
                    HdmaMode::Setup => self.hdma_setup(),
                    HdmaMode::Run => self.hdma_run(),
                }

                if !self.dma_enabled() {
                    self.cpu_align();
                    self.cpu.status.dma_active = false;
                }
            }

            if mem::take(&mut self.cpu.status.dma_pending) && self.dma_enabled() {
                self.dma_align();
                self.dma_run();
                self.cpu_align();
                self.cpu.status.dma_active = false;
            }
        }

        if !self.cpu.status.dma_active
            && (self.cpu.status.dma_pending || self.cpu.status.hdma_pending)
        {
            self.cpu.status.dma_active = true;
        }
    }

    fn dma_align(&mut self) {
        let clocks = 8 - self.dma_counter();
        self.cpu.status.dma_clocks = clocks;
        self.step(clocks);
    }

    fn cpu_align(&mut self) {
        let clock_count = self.cpu.status.clock_count;
        self.step(clock_count - self.cpu.status.dma_clocks % clock_count);
    }

    fn dma_step(&mut self, clocks: u64) {
        self.cpu.status.dma_clocks += clocks;
        self.step(clocks);
    }

    fn dma_run(&mut self) {
        self.dma_step(8);
        self.dma_edge();
        for channel in 0..CHANNELS {
            self.channel_dma_run(channel);
        }
        self.cpu.status.irq_lock = true;
    }

    pub(super) fn hdma_reset(&mut self) {
        for channel in &mut self.cpu.channels {
            channel.hdma_completed = false;
            channel.hdma_do_transfer = false;
        }
    }

    pub(super) fn hdma_setup(&mut self) {
        self.dma_step(8);
        for channel in 0..CHANNELS {
            self.channel_hdma_setup(channel);
        }
        self.cpu.status.irq_lock = true;
    }

    pub(super) fn hdma_run(&mut self) {
        self.dma_step(8);
        for channel in 0..CHANNELS {
            self.channel_hdma_transfer(channel);
        }
        for channel in 0..CHANNELS {
            self.channel_hdma_advance(channel);
        }
        self.cpu.status.irq_lock = true;
    }

    fn channel_dma_run(&mut self, n: usize) {
        if !self.cpu.channels[n].dma_enable {
            return;
        }

        log::trace!(
            "DMA channel {n}: mode {} from {:06X} to {:02X}, {} bytes",
            self.cpu.channels[n].transfer_mode,
            u24(self.cpu.channels[n].source_bank, self.cpu.channels[n].source_address),
            self.cpu.channels[n].target_address,
            self.cpu.channels[n].transfer_size
        );

        self.dma_step(8);
        self.dma_edge();

        let mut index = U2::ZERO;
        loop {
            let channel = &self.cpu.channels[n];
            let address = u24(channel.source_bank, channel.source_address);
            self.transfer(n, address, index);
            index.increment();

            let channel = &mut self.cpu.channels[n];
            if !channel.fixed {
                channel.source_address = if channel.reverse {
                    channel.source_address.wrapping_sub(1)
                } else {
                    channel.source_address.wrapping_add(1)
                };
            }

            self.dma_edge();

            // HDMA may have cancelled the transfer; the byte count is left as it was if so
            let channel = &mut self.cpu.channels[n];
            if !channel.dma_enable {
                break;
            }
            channel.transfer_size = channel.transfer_size.wrapping_sub(1);
            if channel.transfer_size == 0 {
                break;
            }
        }

        self.cpu.channels[n].dma_enable = false;
    }

    fn channel_hdma_setup(&mut self, n: usize) {
        let channel = &mut self.cpu.channels[n];
        channel.hdma_do_transfer = true;
        if !channel.hdma_enable {
            return;
        }

        // HDMA stops an active DMA on the same channel mid-transfer
        channel.dma_enable = false;
        channel.hdma_address = channel.source_address;
        channel.line_counter = 0;
        self.channel_hdma_reload(n);
    }

    fn next_table_address(&mut self, n: usize) -> u32 {
        let channel = &mut self.cpu.channels[n];
        let address = u24(channel.source_bank, channel.hdma_address);
        channel.hdma_address = channel.hdma_address.wrapping_add(1);
        self.cpu.mar = address;
        address
    }

    fn channel_hdma_reload(&mut self, n: usize) {
        // The table byte is fetched on every line, whether or not it is used
        let channel = &self.cpu.channels[n];
        let address = u24(channel.source_bank, channel.hdma_address);
        self.cpu.mar = address;
        let data = self.dma_read_a(address);

        let channel = &mut self.cpu.channels[n];
        if channel.line_counter & 0x7F != 0 {
            return;
        }

        channel.line_counter = data;
        channel.hdma_address = channel.hdma_address.wrapping_add(1);
        channel.hdma_completed = channel.line_counter == 0;
        channel.hdma_do_transfer = !channel.hdma_completed;

        if !channel.indirect {
            return;
        }

        let address = self.next_table_address(n);
        let data = self.dma_read_a(address);
        self.cpu.channels[n].transfer_size = u16::from(data) << 8;

        // The last active channel skips the second pointer byte on its terminating entry
        if self.cpu.channels[n].hdma_completed && self.hdma_finished(n) {
            return;
        }

        let address = self.next_table_address(n);
        let data = self.dma_read_a(address);
        let channel = &mut self.cpu.channels[n];
        channel.transfer_size = (u16::from(data) << 8) | (channel.transfer_size >> 8);
    }

    fn channel_hdma_transfer(&mut self, n: usize) {
        let channel = &mut self.cpu.channels[n];
        if !channel.hdma_active() {
            return;
        }

        channel.dma_enable = false;
        if !channel.hdma_do_transfer {
            return;
        }

        let length = HDMA_TRANSFER_LENGTHS[usize::from(channel.transfer_mode & 0x07)];
        let mut index = U2::ZERO;
        for _ in 0..length {
            let channel = &mut self.cpu.channels[n];
            let address = if channel.indirect {
                let address = u24(channel.indirect_bank, channel.transfer_size);
                channel.transfer_size = channel.transfer_size.wrapping_add(1);
                address
            } else {
                let address = u24(channel.source_bank, channel.hdma_address);
                channel.hdma_address = channel.hdma_address.wrapping_add(1);
                address
            };

            self.transfer(n, address, index);
            index.increment();
        }
    }

    fn channel_hdma_advance(&mut self, n: usize) {
        let channel = &mut self.cpu.channels[n];
        if !channel.hdma_active() {
            return;
        }

        channel.line_counter = channel.line_counter.wrapping_sub(1);
        channel.hdma_do_transfer = channel.line_counter.bit(7);
        self.channel_hdma_reload(n);
    }

    /// Move one byte between bus A `address_a` and the channel's bus B register.
    fn transfer(&mut self, n: usize, address_a: u32, index: U2) {
        let channel = &self.cpu.channels[n];
        let index = index.get() as u8;
        let offset = match channel.transfer_mode {
            1 | 5 => index & 1,
            3 | 7 => (index >> 1) & 1,
            4 => index,
            _ => 0,
        };
        let address_b = channel.target_address.wrapping_add(offset);
        let direction = channel.direction;

        // WRAM cannot be both source and destination of the same transfer
        let valid = address_b != WRAM_PORT_B_ADDRESS
            || (address_a & 0xFE0000 != 0x7E0000 && address_a & 0x40E000 != 0x0000);

        self.cpu.mar = address_a;
        if !direction {
            let value = self.dma_read_a(address_a);
            self.dma_write_b(address_b, value, valid);
        } else {
            let value = self.dma_read_b(address_b, valid);
            self.dma_write_a(address_a, value);
        }
    }

    fn dma_read_a(&mut self, address: u32) -> u8 {
        self.dma_step(4);
        let value = if valid_a(address) { self.bus_read(address) } else { 0x00 };
        self.cpu.mdr = value;
        self.dma_step(4);
        value
    }

    fn dma_read_b(&mut self, address: u8, valid: bool) -> u8 {
        self.dma_step(4);
        let value =
            if valid { self.bus_read(BUS_B_BASE_ADDRESS | u32::from(address)) } else { 0x00 };
        self.cpu.mdr = value;
        self.dma_step(4);
        value
    }

    fn dma_write_a(&mut self, address: u32, value: u8) {
        if valid_a(address) {
            self.bus_write(address, value);
        }
    }

    fn dma_write_b(&mut self, address: u8, value: u8, valid: bool) {
        if valid {
            self.bus_write(BUS_B_BASE_ADDRESS | u32::from(address), value);
        }
    }
}
