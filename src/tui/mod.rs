//! TUI debugger for the AVR emulator.
//!
//! The whole run is recorded up front (see [`crate::cpu::trace`]) and the
//! debugger browses that history:
//! - Instruction list with the selected step highlighted
//! - Register file and SREG after the selected step
//! - Digital pin levels derived from the port registers
//! - Serial (UART) output

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
