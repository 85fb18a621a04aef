//! Standard controller state and the serial shift register the CPU reads it through.

use bincode::{Decode, Encode};
use snes_common::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnesJoypadState {
    pub up: bool,
    pub left: bool,
    pub right: bool,
    pub down: bool,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub l: bool,
    pub r: bool,
    pub start: bool,
    pub select: bool,
}

impl SnesJoypadState {
    /// Buttons in shift-out order, B first. The low 4 bits are the controller signature (0 for a
    /// standard controller).
    pub(crate) fn to_register_word(self) -> u16 {
        (u16::from(self.b) << 15)
            | (u16::from(self.y) << 14)
            | (u16::from(self.select) << 13)
            | (u16::from(self.start) << 12)
            | (u16::from(self.up) << 11)
            | (u16::from(self.down) << 10)
            | (u16::from(self.left) << 9)
            | (u16::from(self.right) << 8)
            | (u16::from(self.a) << 7)
            | (u16::from(self.x) << 6)
            | (u16::from(self.l) << 5)
            | (u16::from(self.r) << 4)
    }
}

/// Controller port device. While the latch line is high the shift register continuously reloads
/// from the live button state; once it falls, each data clock shifts one bit out and a 1 in.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Joypad {
    state: SnesJoypadState,
    latched: bool,
    shift_register: u16,
}

impl Joypad {
    pub fn set_state(&mut self, state: SnesJoypadState) {
        self.state = state;
    }

    pub fn state(&self) -> SnesJoypadState {
        self.state
    }

    pub fn latch(&mut self, latched: bool) {
        self.latched = latched;
        if latched {
            self.shift_register = self.state.to_register_word();
        }
    }

    pub fn data(&mut self) -> bool {
        if self.latched {
            return self.state.b;
        }

        let bit = self.shift_register.bit(15);
        self.shift_register = (self.shift_register << 1) | 0x0001;
        bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn shifts_out_buttons_then_ones() {
        let mut joypad = Joypad::default();
        joypad.set_state(SnesJoypadState { b: true, start: true, r: true, ..Default::default() });

        joypad.latch(true);
        joypad.latch(false);

        let bits: Vec<bool> = (0..17).map(|_| joypad.data()).collect();
        let expected = [
            true, false, false, true, false, false, false, false, false, false, false, true,
            false, false, false, false, true,
        ];
        assert_eq!(bits, expected);
    }

    #[test]
    fn latched_reads_report_b() {
        let mut joypad = Joypad::default();
        joypad.set_state(SnesJoypadState { b: true, ..Default::default() });
        joypad.latch(true);
        assert!(joypad.data());
        assert!(joypad.data());
    }
}
