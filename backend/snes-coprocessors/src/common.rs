use crate::obc1::Obc1;
use crate::srtc::SRtc;
use bincode::{Decode, Encode};
use snes_common::thread::Thread;

// Main SNES master clock frequencies
pub const NTSC_MASTER_CLOCK_FREQUENCY: u64 = 21_477_272;
pub const PAL_MASTER_CLOCK_FREQUENCY: u64 = 21_281_370;

/// A chip on the cartridge that sits on the CPU bus next to ROM and SRAM.
///
/// Clocked coprocessors own a [`Thread`] that the CPU lags on every step; the CPU resumes them
/// (runs [`Coprocessor::main`] until their clock is no longer negative) before it touches their
/// mappings and once per scanline. Unclocked coprocessors return `None` from `thread()` and are
/// only driven by bus accesses.
pub trait Coprocessor {
    fn name(&self) -> &'static str;

    fn thread(&self) -> Option<&Thread>;

    fn thread_mut(&mut self) -> Option<&mut Thread>;

    /// Perform one bounded unit of work, advancing the thread clock by the clocks it consumed.
    fn main(&mut self, cpu_frequency: u64);

    /// Bus read from one of the coprocessor's mappings. `open_bus` is the CPU's MDR.
    fn read(&mut self, address: u32, open_bus: u8) -> u8;

    fn write(&mut self, address: u32, value: u8);

    /// Return to power-on state. Battery-backed contents survive.
    fn power(&mut self);

    /// Battery-backed memory owned by the coprocessor, if any.
    fn persistent_memory(&self) -> Option<&[u8]> {
        None
    }

    /// The coprocessor has caught up with the CPU. Unclocked coprocessors are always caught up.
    fn synchronize_cpu(&self) -> bool {
        self.thread().is_none_or(Thread::synchronize_cpu)
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub enum CoprocessorChip {
    SRtc(SRtc),
    Obc1(Obc1),
}

macro_rules! dispatch {
    ($self:expr, $chip:ident => $body:expr) => {
        match $self {
            Self::SRtc($chip) => $body,
            Self::Obc1($chip) => $body,
        }
    };
}

impl Coprocessor for CoprocessorChip {
    fn name(&self) -> &'static str {
        dispatch!(self, chip => chip.name())
    }

    fn thread(&self) -> Option<&Thread> {
        dispatch!(self, chip => chip.thread())
    }

    fn thread_mut(&mut self) -> Option<&mut Thread> {
        dispatch!(self, chip => chip.thread_mut())
    }

    fn main(&mut self, cpu_frequency: u64) {
        dispatch!(self, chip => chip.main(cpu_frequency));
    }

    fn read(&mut self, address: u32, open_bus: u8) -> u8 {
        dispatch!(self, chip => chip.read(address, open_bus))
    }

    fn write(&mut self, address: u32, value: u8) {
        dispatch!(self, chip => chip.write(address, value));
    }

    fn power(&mut self) {
        dispatch!(self, chip => chip.power());
    }

    fn persistent_memory(&self) -> Option<&[u8]> {
        dispatch!(self, chip => chip.persistent_memory())
    }
}
