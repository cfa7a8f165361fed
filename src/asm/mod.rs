//! Program tooling around the core.
//!
//! This module provides:
//! - An Intel HEX loader and writer (the usual AVR program image)
//! - A line assembler for the supported instruction subset
//! - A text-to-UART program generator
//! - A disassembler (words -> readable text)

pub mod assembler;
pub mod disasm;
pub mod hex;
pub mod text;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_program};
pub use hex::{LoadError, load_hex, parse_hex, save_hex, to_hex};
pub use text::encode_text;
