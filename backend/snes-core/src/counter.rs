//! H/V beam counter shared by the CPU and the PPU.
//!
//! The horizontal counter is in master clocks (1364 per line, 1360 on the short line of
//! non-interlaced NTSC odd fields). The CPU keeps a history of recent counter values because its
//! interrupt logic samples the counter as it was a few clocks ago.

use bincode::{Decode, Encode};
use snes_common::boxedarray::BoxedWordArray;
use snes_common::frontend::TimingMode;

const HISTORY_LEN: usize = 2048;

pub const LINE_CLOCKS: u16 = 1364;
const SHORT_LINE_CLOCKS: u16 = 1360;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Counter {
    timing_mode: TimingMode,
    hcounter: u16,
    vcounter: u16,
    field: bool,
    history_index: usize,
    hcounter_history: BoxedWordArray<HISTORY_LEN>,
    vcounter_history: BoxedWordArray<HISTORY_LEN>,
}

impl Counter {
    pub fn new(timing_mode: TimingMode) -> Self {
        Self {
            timing_mode,
            hcounter: 0,
            vcounter: 0,
            field: false,
            history_index: 0,
            hcounter_history: BoxedWordArray::new(),
            vcounter_history: BoxedWordArray::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.timing_mode);
    }

    /// Advance by `clocks` master clocks. Returns whether a new line started.
    pub fn tick(&mut self, clocks: u16, interlace: bool) -> bool {
        self.hcounter += clocks;

        let line_clocks = self.line_clocks(interlace);
        let new_line = self.hcounter >= line_clocks;
        if new_line {
            self.hcounter -= line_clocks;
            self.vcounter += 1;
            if self.vcounter == self.lines_per_field(interlace) {
                self.vcounter = 0;
                self.field = !self.field;
            }
        }

        self.history_index = (self.history_index + 1) & (HISTORY_LEN - 1);
        self.hcounter_history[self.history_index] = self.hcounter;
        self.vcounter_history[self.history_index] = self.vcounter;

        new_line
    }

    #[inline]
    pub fn hcounter(&self) -> u16 {
        self.hcounter
    }

    #[inline]
    pub fn vcounter(&self) -> u16 {
        self.vcounter
    }

    #[inline]
    pub fn field(&self) -> bool {
        self.field
    }

    /// Horizontal counter as it was `offset` clocks ago. History is kept per 2-clock tick.
    #[inline]
    pub fn hcounter_past(&self, offset: usize) -> u16 {
        self.hcounter_history[self.history_index.wrapping_sub(offset >> 1) & (HISTORY_LEN - 1)]
    }

    #[inline]
    pub fn vcounter_past(&self, offset: usize) -> u16 {
        self.vcounter_history[self.history_index.wrapping_sub(offset >> 1) & (HISTORY_LEN - 1)]
    }

    pub fn line_clocks(&self, interlace: bool) -> u16 {
        if self.timing_mode == TimingMode::Ntsc && !interlace && self.vcounter == 240 && self.field
        {
            SHORT_LINE_CLOCKS
        } else {
            LINE_CLOCKS
        }
    }

    fn lines_per_field(&self, interlace: bool) -> u16 {
        let lines = match self.timing_mode {
            TimingMode::Ntsc => 262,
            TimingMode::Pal => 312,
        };

        // Interlaced even fields have one extra line
        lines + u16::from(interlace && !self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn run_frame(counter: &mut Counter, interlace: bool) -> u64 {
        let start_field = counter.field();
        let mut clocks = 0;
        while counter.field() == start_field {
            counter.tick(2, interlace);
            clocks += 2;
        }
        clocks
    }

    #[test]
    fn ntsc_field_lengths() {
        let mut counter = Counter::new(TimingMode::Ntsc);

        // Even field: 262 full lines; odd field drops 4 clocks on line 240
        assert_eq!(run_frame(&mut counter, false), 262 * 1364);
        assert_eq!(run_frame(&mut counter, false), 262 * 1364 - 4);

        // Interlaced: 263 lines on even fields, no short line
        assert_eq!(run_frame(&mut counter, true), 263 * 1364);
        assert_eq!(run_frame(&mut counter, true), 262 * 1364);
    }

    #[test]
    fn pal_field_length() {
        let mut counter = Counter::new(TimingMode::Pal);
        assert_eq!(run_frame(&mut counter, false), 312 * 1364);
        assert_eq!(run_frame(&mut counter, false), 312 * 1364);
    }

    #[test]
    fn history_reports_past_values() {
        let mut counter = Counter::new(TimingMode::Ntsc);
        for _ in 0..(1364 / 2) + 3 {
            counter.tick(2, false);
        }

        assert_eq!((counter.vcounter(), counter.hcounter()), (1, 6));
        assert_eq!(counter.hcounter_past(0), 6);
        assert_eq!(counter.hcounter_past(6), 0);
        assert_eq!(counter.vcounter_past(6), 1);
        assert_eq!(counter.hcounter_past(10), 1360);
        assert_eq!(counter.vcounter_past(10), 0);
    }
}
