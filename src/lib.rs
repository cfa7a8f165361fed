//! # AVR Emulator
//!
//! A single-step execution core for an 8-bit AVR microcontroller
//! (ATmega328-class): register file, status flags, program counter and
//! memory-mapped I/O.
//!
//! Only a small slice of the instruction set is implemented. Every opcode
//! is one row in [`cpu::decode::PATTERNS`]; adding another means adding a
//! row, an [`Instruction`] variant and its execute arm.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, Instruction, Registers, Snapshot, Sreg, StopReason, decode, encode};
pub use asm::{assemble, disassemble, encode_text, load_hex, parse_hex, AssemblerError, LoadError};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
