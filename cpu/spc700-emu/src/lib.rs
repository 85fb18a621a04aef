//! Sony SPC700 interpreter.
//!
//! Like the main CPU core, each call executes a whole instruction while issuing every bus cycle
//! (reads, writes, and internal cycles) to the [`BusInterface`] in hardware order.

pub mod core;
pub mod traits;

pub use crate::core::{Registers, Spc700, StatusRegister};
pub use traits::BusInterface;
