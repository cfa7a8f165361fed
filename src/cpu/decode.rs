//! Instruction decoder.
//!
//! Every supported opcode is one row of [`PATTERNS`]: a mask, the fixed bits
//! expected under it, and an operand extractor. A word matches a row when
//! `word & mask == pattern`; rows are tried in order and the first hit wins,
//! so fixed-function opcodes come before the broader classes. Words that
//! match nothing decode to [`Instruction::Unknown`].
//!
//! The disassembler goes through [`decode`] too, so the two cannot disagree
//! on what a word is.
//!
//! ```text
//! LDI   1110 KKKK dddd KKKK
//! ADD   0000 11rd dddd rrrr
//! ADC   0001 11rd dddd rrrr
//! ADIW  1001 0110 KKdd KKKK
//! AND   0010 00rd dddd rrrr
//! ANDI  0111 KKKK dddd ----    (K low nibble read from bits 7:4)
//! ASR   1001 010d dddd 0101
//! OUT   1011 1--r rrrr AAAA    (port read from bits 5:0)
//! NOP   0000 0000 0000 0000
//! ```

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A decoded instruction.
///
/// Register operands are absolute indices (0..=31); immediates are already
/// reassembled from their split fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Transfer ====================

    /// Load immediate: Rd := K (d in 16..=31)
    Ldi { d: u8, k: u8 },

    /// Store register to I/O space: I/O[a] := Rr
    Out { a: u8, r: u8 },

    // ==================== Arithmetic ====================

    /// Add: Rd := Rd + Rr
    Add { d: u8, r: u8 },

    /// Add with carry: Rd := Rd + Rr + C
    Adc { d: u8, r: u8 },

    /// Add immediate to word: Rd+1:Rd := Rd+1:Rd + K (d in {24, 26, 28, 30}, K in 0..=63)
    Adiw { d: u8, k: u8 },

    /// Arithmetic shift right: Rd := Rd >> 1, bit 7 kept
    Asr { d: u8 },

    // ==================== Logic ====================

    /// Logical AND: Rd := Rd & Rr
    And { d: u8, r: u8 },

    /// Logical AND with immediate: Rd := Rd & K (d in 16..=31)
    Andi { d: u8, k: u8 },

    // ==================== Special ====================

    /// No operation
    Nop,

    /// A word matching no pattern. Executing it halts the machine.
    Unknown(u16),
}

impl Instruction {
    /// Upper-case mnemonic, `???` for unknown words.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Ldi { .. } => "LDI",
            Instruction::Out { .. } => "OUT",
            Instruction::Add { .. } => "ADD",
            Instruction::Adc { .. } => "ADC",
            Instruction::Adiw { .. } => "ADIW",
            Instruction::Asr { .. } => "ASR",
            Instruction::And { .. } => "AND",
            Instruction::Andi { .. } => "ANDI",
            Instruction::Nop => "NOP",
            Instruction::Unknown(_) => "???",
        }
    }
}

/// One row of the opcode table.
#[derive(Clone, Copy)]
pub struct OpPattern {
    pub mnemonic: &'static str,
    pub mask: u16,
    pub pattern: u16,
    extract: fn(u16) -> Instruction,
}

impl OpPattern {
    /// Whether `word` belongs to this opcode class.
    #[inline]
    pub fn matches(&self, word: u16) -> bool {
        word & self.mask == self.pattern
    }
}

impl std::fmt::Debug for OpPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#06X}/{:#06X})", self.mnemonic, self.pattern, self.mask)
    }
}

// Operand fields shared by several classes.

/// `---- --rd dddd rrrr`: five-bit destination and source.
fn two_regs(w: u16) -> (u8, u8) {
    let d = ((w >> 4) & 0x1F) as u8;
    let r = ((w & 0x0F) | ((w >> 5) & 0x10)) as u8;
    (d, r)
}

/// `---- ---- dddd ----` in the upper half of the register file.
fn upper_reg(w: u16) -> u8 {
    16 + ((w >> 4) & 0x0F) as u8
}

/// `---- KKKK ---- ----` as the high nibble of an immediate.
fn k_high(w: u16) -> u8 {
    (((w >> 8) & 0x0F) << 4) as u8
}

/// The opcode table, in match priority order.
pub const PATTERNS: &[OpPattern] = &[
    OpPattern {
        mnemonic: "NOP",
        mask: 0xFFFF,
        pattern: 0x0000,
        extract: |_| Instruction::Nop,
    },
    OpPattern {
        mnemonic: "LDI",
        mask: 0xF000,
        pattern: 0xE000,
        extract: |w| Instruction::Ldi { d: upper_reg(w), k: k_high(w) | (w & 0x0F) as u8 },
    },
    OpPattern {
        mnemonic: "ADD",
        mask: 0xFC00,
        pattern: 0x0C00,
        extract: |w| {
            let (d, r) = two_regs(w);
            Instruction::Add { d, r }
        },
    },
    OpPattern {
        mnemonic: "ADC",
        mask: 0xFC00,
        pattern: 0x1C00,
        extract: |w| {
            let (d, r) = two_regs(w);
            Instruction::Adc { d, r }
        },
    },
    OpPattern {
        mnemonic: "ADIW",
        mask: 0xFF00,
        pattern: 0x9600,
        extract: |w| Instruction::Adiw {
            d: 24 + 2 * ((w >> 4) & 0x03) as u8,
            k: ((((w >> 6) & 0x03) << 4) | (w & 0x0F)) as u8,
        },
    },
    OpPattern {
        mnemonic: "AND",
        mask: 0xFC00,
        pattern: 0x2000,
        extract: |w| {
            let (d, r) = two_regs(w);
            Instruction::And { d, r }
        },
    },
    OpPattern {
        mnemonic: "ANDI",
        mask: 0xF000,
        pattern: 0x7000,
        extract: |w| Instruction::Andi { d: upper_reg(w), k: k_high(w) | ((w >> 4) & 0x0F) as u8 },
    },
    OpPattern {
        mnemonic: "ASR",
        mask: 0xFE0F,
        pattern: 0x9405,
        extract: |w| Instruction::Asr { d: ((w >> 4) & 0x1F) as u8 },
    },
    OpPattern {
        mnemonic: "OUT",
        mask: 0xF800,
        pattern: 0xB800,
        extract: |w| Instruction::Out { a: (w & 0x3F) as u8, r: ((w >> 4) & 0x1F) as u8 },
    },
];

/// Find the table row a word belongs to.
pub fn lookup(word: u16) -> Option<&'static OpPattern> {
    PATTERNS.iter().find(|p| p.matches(word))
}

/// Decode a 16-bit instruction word.
pub fn decode(word: u16) -> Instruction {
    match lookup(word) {
        Some(p) => (p.extract)(word),
        None => Instruction::Unknown(word),
    }
}

/// Encode an instruction back to its 16-bit word.
///
/// Fails for operands the instruction cannot carry. ANDI and OUT share bit
/// positions between their register and immediate/port fields, so only
/// operand combinations that agree on those bits are encodable.
pub fn encode(instr: &Instruction) -> Result<u16, EncodeError> {
    let mnemonic = instr.mnemonic();

    let reg = |index: u8, range: std::ops::RangeInclusive<u8>| -> Result<u16, EncodeError> {
        if range.contains(&index) {
            Ok(u16::from(index))
        } else {
            Err(EncodeError::RegisterOutOfRange { mnemonic, index })
        }
    };

    let two = |base: u16, d: u8, r: u8| -> Result<u16, EncodeError> {
        let d = reg(d, 0..=31)?;
        let r = reg(r, 0..=31)?;
        Ok(base | ((r & 0x10) << 5) | (d << 4) | (r & 0x0F))
    };

    let word = match *instr {
        Instruction::Ldi { d, k } => {
            let d = reg(d, 16..=31)? - 16;
            let k = u16::from(k);
            0xE000 | ((k & 0xF0) << 4) | (d << 4) | (k & 0x0F)
        }

        Instruction::Out { a, r } => {
            if usize::from(a) >= crate::cpu::io::IO_SIZE {
                return Err(EncodeError::ImmediateOutOfRange { mnemonic, value: a });
            }
            let r = reg(r, 0..=31)?;
            if u16::from(a >> 4) != (r & 0x03) {
                return Err(EncodeError::FieldConflict {
                    mnemonic,
                    detail: format!("port {:#04X} bits 5:4 must equal low bits of R{}", a, r),
                });
            }
            0xB800 | (r << 4) | u16::from(a & 0x0F)
        }

        Instruction::Add { d, r } => two(0x0C00, d, r)?,
        Instruction::Adc { d, r } => two(0x1C00, d, r)?,
        Instruction::And { d, r } => two(0x2000, d, r)?,

        Instruction::Adiw { d, k } => {
            if !matches!(d, 24 | 26 | 28 | 30) {
                return Err(EncodeError::RegisterOutOfRange { mnemonic, index: d });
            }
            if k > 63 {
                return Err(EncodeError::ImmediateOutOfRange { mnemonic, value: k });
            }
            let pair = u16::from((d - 24) / 2);
            let k = u16::from(k);
            0x9600 | ((k & 0x30) << 2) | (pair << 4) | (k & 0x0F)
        }

        Instruction::Andi { d, k } => {
            let d = reg(d, 16..=31)? - 16;
            if u16::from(k & 0x0F) != d {
                return Err(EncodeError::FieldConflict {
                    mnemonic,
                    detail: format!("immediate low nibble {:#X} must equal R{} - 16", k & 0x0F, d + 16),
                });
            }
            0x7000 | (u16::from(k >> 4) << 8) | (d << 4)
        }

        Instruction::Asr { d } => 0x9405 | (reg(d, 0..=31)? << 4),

        Instruction::Nop => 0x0000,

        Instruction::Unknown(word) => word,
    };

    Ok(word)
}

/// Errors that can occur during instruction encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{mnemonic}: register R{index} not allowed")]
    RegisterOutOfRange { mnemonic: &'static str, index: u8 },

    #[error("{mnemonic}: operand {value} out of range")]
    ImmediateOutOfRange { mnemonic: &'static str, value: u8 },

    #[error("{mnemonic}: operands do not fit the encoding ({detail})")]
    FieldConflict { mnemonic: &'static str, detail: String },
}
