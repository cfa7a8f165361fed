//! Disassembler for AVR programs.
//!
//! Converts instruction words back to readable assembly. Classification
//! always goes through [`decode`], so a word disassembles as exactly the
//! instruction the CPU would execute.

use std::fmt;
use crate::cpu::decode::{decode, Instruction};

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.mnemonic();
        match *self {
            Instruction::Ldi { d, k } | Instruction::Andi { d, k } => write!(f, "{} R{}, 0x{:02X}", m, d, k),
            Instruction::Out { a, r } => write!(f, "{} 0x{:02X}, R{}", m, a, r),
            Instruction::Add { d, r } | Instruction::Adc { d, r } | Instruction::And { d, r } => {
                write!(f, "{} R{}, R{}", m, d, r)
            }
            Instruction::Adiw { d, k } => write!(f, "{} R{}:R{}, {}", m, d + 1, d, k),
            Instruction::Asr { d } => write!(f, "{} R{}", m, d),
            Instruction::Nop => f.write_str(m),
            Instruction::Unknown(word) => write!(f, "{} 0x{:04X}", m, word),
        }
    }
}

/// Disassemble a single instruction word to text.
pub fn disassemble(word: u16) -> String {
    decode(word).to_string()
}

/// Disassemble a whole program as an address-annotated listing.
pub fn disassemble_program(words: &[u16]) -> String {
    let mut output = String::new();
    output.push_str("; AVR Disassembly\n");
    output.push_str("; ---------------\n\n");

    for (addr, &word) in words.iter().enumerate() {
        let instr = decode(word);
        let mut line = format!("{:04X}:  {:<20} ; {:04X}", addr, instr.to_string(), word);

        // Show printable immediates as characters
        if let Instruction::Ldi { k, .. } = instr {
            if k.is_ascii_graphic() || k == b' ' {
                line.push_str(&format!(" '{}'", char::from(k)));
            }
        }

        output.push_str(&line);
        output.push('\n');
    }

    output
}
