//! WDC 65C816 interpreter.
//!
//! Instructions execute atomically from the interpreter's point of view, but every bus cycle is
//! issued to the [`BusInterface`] in hardware order, so the bus implementation observes exact
//! per-cycle timing.

pub mod core;
pub mod traits;

pub use crate::core::{Registers, StatusRegister, Wdc65816};
pub use traits::BusInterface;
