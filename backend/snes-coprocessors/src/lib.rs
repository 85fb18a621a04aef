//! Cartridge coprocessors and the contract the SNES core uses to schedule them.

pub mod common;
pub mod obc1;
pub mod srtc;

pub use common::{Coprocessor, CoprocessorChip};
