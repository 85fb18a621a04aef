//! Logical clock shared by every independently clocked unit.

use bincode::{Decode, Encode};

/// A clocked unit's position relative to the main CPU.
///
/// The clock is kept in units of `master cycles * frequency`, which makes clocks of units with
/// different oscillators directly comparable. A negative clock means the unit is behind the CPU
/// and must run before the CPU observes its state; zero or above means it has caught up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Thread {
    frequency: u64,
    clock: i64,
}

impl Thread {
    #[must_use]
    pub fn new(frequency: u64) -> Self {
        Self { frequency, clock: 0 }
    }

    #[inline]
    #[must_use]
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    #[inline]
    #[must_use]
    pub fn clock(&self) -> i64 {
        self.clock
    }

    /// Advance this unit by `clocks` of its own cycles.
    #[inline]
    pub fn step(&mut self, clocks: u64, cpu_frequency: u64) {
        self.clock += (clocks * cpu_frequency) as i64;
    }

    /// Account for the CPU having advanced by `clocks` master cycles.
    #[inline]
    pub fn lag(&mut self, clocks: u64) {
        self.clock -= (clocks * self.frequency) as i64;
    }

    /// The unit has caught up with the CPU and control should return to it.
    #[inline]
    #[must_use]
    pub fn synchronize_cpu(&self) -> bool {
        self.clock >= 0
    }

    pub fn reset(&mut self) {
        self.clock = 0;
    }
}
