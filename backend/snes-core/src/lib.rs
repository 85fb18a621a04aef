//! Cycle-level SNES emulation core.
//!
//! The machine is a set of independently clocked units (the 5A22 CPU, the PPU, the SMP and any
//! clocked cartridge coprocessor) kept in lockstep by a cooperative [`scheduler`]. The CPU is the
//! reference clock: every other unit is resumed on demand whenever the CPU is about to observe
//! its state.

pub mod api;
mod apu;
mod board;
pub mod bus;
mod cartridge;
mod counter;
mod cpu;
pub mod input;
pub mod memory;
mod ppu;
pub mod scheduler;

pub use api::{JoypadPort, Snes, SnesError, SnesLoadError, SnesLoadResult, SnesResult};
pub use scheduler::{SchedulerEvent, SchedulerMode, ThreadId};
