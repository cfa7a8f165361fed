//! CPU emulation for an 8-bit AVR-style core.
//!
//! This module implements a deliberately partial ATmega instruction set:
//! - 32 eight-bit registers, SREG and a word-addressed PC
//! - separate program (flash) and data (SRAM) address spaces
//! - a 64-register I/O space with a UART transmit side effect
//! - LDI, ADD, ADC, ADIW, AND, ANDI, ASR, OUT and NOP

pub mod flags;
pub mod registers;
pub mod memory;
pub mod io;
pub mod decode;
pub mod execute;
pub mod trace;

pub use flags::{Sreg, FlagUpdate};
pub use registers::Registers;
pub use memory::{ProgramStore, DataMemory};
pub use io::{IoSpace, PinState};
pub use decode::{Instruction, EncodeError, decode, encode};
pub use execute::{Cpu, CpuState, RunSummary, Snapshot, StopReason};
pub use trace::TraceEntry;
