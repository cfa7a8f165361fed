//! AVR register file.
//!
//! - R0..R31: 32 general purpose 8-bit registers
//! - SREG: status register (see [`Sreg`])
//! - PC: word address into the program store
//!
//! R24..R31 double as the 16-bit pairs used by ADIW (R25:R24, R27:R26,
//! R29:R28, R31:R30), low byte in the even register.

use crate::cpu::flags::Sreg;
use serde::{Serialize, Deserialize};

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 32;

/// The register file, status register and program counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0..R31
    pub r: [u8; REGISTER_COUNT],

    /// Status register
    pub sreg: Sreg,

    /// Program counter (word address)
    pub pc: u16,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self {
            r: [0; REGISTER_COUNT],
            sreg: Sreg::empty(),
            pc: 0,
        }
    }

    /// Read a general purpose register.
    #[inline]
    pub fn get(&self, index: u8) -> u8 {
        self.r[usize::from(index)]
    }

    /// Write a general purpose register.
    #[inline]
    pub fn set(&mut self, index: u8, value: u8) {
        self.r[usize::from(index)] = value;
    }

    /// Read the 16-bit pair whose low byte lives in `low`.
    pub fn pair(&self, low: u8) -> u16 {
        u16::from_le_bytes([self.get(low), self.get(low + 1)])
    }

    /// Write the 16-bit pair whose low byte lives in `low`.
    pub fn set_pair(&mut self, low: u8, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.set(low, lo);
        self.set(low + 1, hi);
    }

    /// Increment the program counter by one word.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
