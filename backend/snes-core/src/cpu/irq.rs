//! NMI and IRQ generation.
//!
//! Both lines are sampled every 4 master clocks against counter values from a few clocks in the
//! past. A rising line sets a transition, and transitions are only turned into pending interrupts
//! at the last cycle of an instruction.

use crate::cpu::{AUTO_JOYPAD_INACTIVE, Cpu, CpuBus};
use snes_common::num::GetBit;
use std::mem;

impl Cpu {
    fn poll_nmi(&mut self, vdisp: u16) {
        let status = &mut self.status;

        if status.nmi_hold.lower() && self.io.nmi_enable.get() {
            status.nmi_transition = true;
        }

        let in_vblank = self.counter.vcounter_past(2) >= vdisp;
        if status.nmi_valid.flip(in_vblank) {
            status.nmi_line = status.nmi_valid.get();
            if status.nmi_line {
                // /NMI stays asserted for four clocks
                status.nmi_hold.set(true);
            }
        }
    }

    fn poll_irq(&mut self) {
        let status = &mut self.status;
        let io = &self.io;

        status.irq_hold = false;
        if status.irq_line && io.irq_enable {
            status.irq_transition = true;
        }

        let htime = ((io.htime.get() + 1) << 2) as u16;
        let v_match = !io.virq_enable || self.counter.vcounter_past(10) == io.vtime.get() as u16;
        let h_match = !io.hirq_enable || self.counter.hcounter_past(10) == htime;
        // No IRQ on the very first dot of the field
        let not_first_dot = self.counter.vcounter_past(6) != 0 || self.counter.hcounter_past(6) != 0;

        if status.irq_valid.raise(io.irq_enable && v_match && h_match && not_first_dot) {
            status.irq_line = true;
            status.irq_hold = true;
        }
    }

    /// Turn latched transitions into pending interrupts. Runs just before the final bus cycle of
    /// every instruction.
    pub(super) fn last_cycle(&mut self, irq_disabled: bool) {
        let status = &mut self.status;
        if status.irq_lock {
            return;
        }

        if mem::take(&mut status.nmi_transition) {
            status.wai_released = true;
            status.nmi_pending = true;
            status.interrupt_pending = true;
        }

        if mem::take(&mut status.irq_transition) {
            // IRQs release WAI even while masked
            status.wai_released = true;
            if !irq_disabled {
                status.irq_pending = true;
                status.interrupt_pending = true;
            }
        }
    }

    /// NMITIMEN ($4200).
    pub(super) fn write_nmitimen(&mut self, value: u8) {
        let io = &mut self.io;
        let status = &mut self.status;

        io.auto_joypad_poll = value.bit(0);
        if !io.auto_joypad_poll {
            status.auto_joypad_counter = AUTO_JOYPAD_INACTIVE;
        }

        io.hirq_enable = value.bit(4);
        io.virq_enable = value.bit(5);
        io.irq_enable = io.hirq_enable || io.virq_enable;

        // Enabling NMIs while the NMI line is still asserted triggers one immediately
        if io.nmi_enable.raise(value.bit(7)) && status.nmi_line {
            status.nmi_transition = true;
        }

        // Disabling IRQs acknowledges any IRQ in flight
        if !io.irq_enable {
            status.irq_line = false;
            status.irq_transition = false;
        }

        status.irq_lock = true;

        log::trace!("  Auto joypad read enabled: {}", io.auto_joypad_poll);
        log::trace!("  H/V IRQ enabled: {}/{}", io.hirq_enable, io.virq_enable);
        log::trace!("  NMI enabled: {}", io.nmi_enable.get());
    }

    /// RDNMI bit 7. Reading acknowledges the NMI unless it is still being held.
    pub(super) fn rdnmi(&mut self) -> bool {
        let line = self.status.nmi_line;
        if !self.status.nmi_hold.get() {
            self.status.nmi_line = false;
        }
        line
    }

    /// TIMEUP bit 7. Reading acknowledges the IRQ unless it is still being held.
    pub(super) fn timeup(&mut self) -> bool {
        let line = self.status.irq_line;
        if !self.status.irq_hold {
            self.status.irq_line = false;
            self.status.irq_transition = false;
        }
        line
    }
}

impl CpuBus<'_> {
    pub(super) fn poll_interrupts(&mut self) {
        let vdisp = self.board.ppu.vdisp();
        self.cpu.poll_nmi(vdisp);
        self.cpu.poll_irq();
    }
}
