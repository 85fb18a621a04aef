use bincode::{Decode, Encode};

/// SMP timer. The prescaler divides SPC cycles down to the timer's base rate (8 kHz for timers 0
/// and 1, 64 kHz for timer 2); each base tick advances an 8-bit stage counter, and when the stage
/// counter reaches the divider the 4-bit output counter increments. A divider of 0 means 256.
#[derive(Debug, Clone, Encode, Decode)]
pub struct Timer<const PERIOD: u8> {
    enabled: bool,
    prescaler: u8,
    divider: u8,
    stage: u8,
    output: u8,
}

pub type SlowTimer = Timer<128>;
pub type FastTimer = Timer<16>;

impl<const PERIOD: u8> Timer<PERIOD> {
    pub fn new() -> Self {
        Self { enabled: false, prescaler: 0, divider: 0, stage: 0, output: 0 }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if !self.enabled && enabled {
            self.stage = 0;
            self.output = 0;
        }
        self.enabled = enabled;
    }

    pub fn divider(&self) -> u8 {
        self.divider
    }

    pub fn set_divider(&mut self, divider: u8) {
        self.divider = divider;
    }

    /// Reading the output counter clears it.
    pub fn read_output(&mut self) -> u8 {
        std::mem::take(&mut self.output)
    }

    /// Advance by one SPC cycle.
    pub fn tick(&mut self) {
        self.prescaler += 1;
        if self.prescaler < PERIOD {
            return;
        }
        self.prescaler = 0;

        if !self.enabled {
            return;
        }

        self.stage = self.stage.wrapping_add(1);
        if self.stage == self.divider {
            self.stage = 0;
            self.output = (self.output + 1) & 0x0F;
        }
    }
}
