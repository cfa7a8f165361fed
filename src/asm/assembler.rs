//! Simple assembler for AVR programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! .equ LED = 0x20         ; Define a constant
//!     LDI  R16, LED       ; Load immediate
//!     OUT  DDRB, R16      ; I/O register names are predefined
//!     ADIW R25:R24, 1     ; Pairs as Rh:Rl, a bare even register, or X/Y/Z
//!     PRINT R20, "Hi\n"   ; Expands to LDI/OUT pairs on the UART
//!     .word 0x0000, 0xFFFF ; Raw words
//! ```
//!
//! Numbers may be decimal, `0x`/`$` hex, `0b` binary, or `'c'` characters.

use crate::asm::text::encode_text;
use crate::cpu::decode::{encode, EncodeError, Instruction};
use crate::cpu::io::IO_NAMES;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a list of instruction words.
pub fn assemble(source: &str) -> Result<Vec<u16>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// The assembler state.
struct Assembler {
    /// Symbol table (name -> value).
    symbols: HashMap<String, i64>,
    /// Output words.
    output: Vec<u16>,
}

impl Assembler {
    fn new() -> Self {
        let symbols = IO_NAMES
            .iter()
            .map(|&(name, port)| (name.to_string(), i64::from(port)))
            .collect();

        Self {
            symbols,
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u16>, AssemblerError> {
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Ok(());
        }

        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m.to_uppercase(), rest.trim()),
            None => (line.to_uppercase(), ""),
        };

        match mnemonic.as_str() {
            // Directives
            ".EQU" | ".SET" => {
                let (name, value) = rest
                    .split_once('=')
                    .ok_or_else(|| syntax(line_num, ".equ expects NAME = value"))?;
                let name = name.trim().to_uppercase();
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(syntax(line_num, format!("invalid symbol name '{}'", name)));
                }
                let value = self.parse_value(value, line_num)?;
                self.symbols.insert(name, value);
            }

            ".WORD" | ".DW" => {
                for operand in split_operands(rest) {
                    let value = self.parse_value(operand, line_num)?;
                    let word = u16::try_from(value)
                        .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value })?;
                    self.output.push(word);
                }
            }

            // Pseudo-instructions
            "PRINT" => {
                let (reg, text) = rest
                    .split_once(',')
                    .ok_or_else(|| syntax(line_num, "PRINT expects Rd, \"text\""))?;
                let reg = parse_register(reg, line_num)?;
                let text = parse_string(text.trim(), line_num)?;
                let words = encode_text(&text, reg)
                    .map_err(|source| AssemblerError::Encode { line: line_num, source })?;
                self.output.extend(words);
            }

            // Instructions
            _ => {
                let operands = split_operands(rest);
                let instr = self.parse_instruction(&mnemonic, &operands, line_num)?;
                let word = encode(&instr)
                    .map_err(|source| AssemblerError::Encode { line: line_num, source })?;
                self.output.push(word);
            }
        }

        Ok(())
    }

    fn parse_instruction(&self, mnemonic: &str, operands: &[&str], line_num: usize)
        -> Result<Instruction, AssemblerError>
    {
        let expect = |count: usize| -> Result<(), AssemblerError> {
            if operands.len() == count {
                Ok(())
            } else {
                Err(syntax(
                    line_num,
                    format!("{} takes {} operand(s), found {}", mnemonic, count, operands.len()),
                ))
            }
        };

        let instr = match mnemonic {
            "LDI" => {
                expect(2)?;
                Instruction::Ldi {
                    d: parse_register(operands[0], line_num)?,
                    k: self.parse_byte(operands[1], line_num)?,
                }
            }
            "ANDI" => {
                expect(2)?;
                Instruction::Andi {
                    d: parse_register(operands[0], line_num)?,
                    k: self.parse_byte(operands[1], line_num)?,
                }
            }
            "ADD" | "ADC" | "AND" => {
                expect(2)?;
                let d = parse_register(operands[0], line_num)?;
                let r = parse_register(operands[1], line_num)?;
                match mnemonic {
                    "ADD" => Instruction::Add { d, r },
                    "ADC" => Instruction::Adc { d, r },
                    _ => Instruction::And { d, r },
                }
            }
            "ADIW" => {
                expect(2)?;
                let d = parse_pair(operands[0], line_num)?;
                let k = self.parse_value(operands[1], line_num)?;
                let k = u8::try_from(k)
                    .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value: k })?;
                Instruction::Adiw { d, k }
            }
            "ASR" => {
                expect(1)?;
                Instruction::Asr { d: parse_register(operands[0], line_num)? }
            }
            "OUT" => {
                expect(2)?;
                let a = self.parse_value(operands[0], line_num)?;
                let a = u8::try_from(a)
                    .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value: a })?;
                Instruction::Out { a, r: parse_register(operands[1], line_num)? }
            }
            "NOP" => {
                expect(0)?;
                Instruction::Nop
            }
            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: mnemonic.to_string(),
                })
            }
        };

        Ok(instr)
    }

    /// An 8-bit immediate; -128..=-1 wrap to their two's complement byte.
    fn parse_byte(&self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        let value = self.parse_value(operand, line_num)?;
        match value {
            0..=255 => Ok(value as u8),
            -128..=-1 => Ok(value as i8 as u8),
            _ => Err(AssemblerError::ValueOutOfRange { line: line_num, value }),
        }
    }

    fn parse_value(&self, operand: &str, line_num: usize) -> Result<i64, AssemblerError> {
        let operand = operand.trim();

        if let Some(rest) = operand.strip_prefix('-') {
            return self.parse_value(rest, line_num).map(|v| -v);
        }

        // Character literal
        if operand.len() >= 3 && operand.starts_with('\'') && operand.ends_with('\'') {
            let inner = parse_escaped(&operand[1..operand.len() - 1], line_num)?;
            let mut bytes = inner.bytes();
            return match (bytes.next(), bytes.next()) {
                (Some(b), None) => Ok(i64::from(b)),
                _ => Err(syntax(line_num, format!("invalid character literal {}", operand))),
            };
        }

        let radix = |digits: &str, radix: u32, what: &str| {
            i64::from_str_radix(digits, radix)
                .map_err(|_| syntax(line_num, format!("invalid {} literal {}", what, operand)))
        };

        if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
            return radix(hex, 16, "hex");
        }
        if let Some(hex) = operand.strip_prefix('$') {
            return radix(hex, 16, "hex");
        }
        if let Some(bin) = operand.strip_prefix("0b").or_else(|| operand.strip_prefix("0B")) {
            return radix(bin, 2, "binary");
        }
        if operand.starts_with(|c: char| c.is_ascii_digit()) {
            return radix(operand, 10, "decimal");
        }

        self.symbols
            .get(&operand.to_uppercase())
            .copied()
            .ok_or_else(|| AssemblerError::UndefinedSymbol {
                line: line_num,
                name: operand.to_string(),
            })
    }
}

fn syntax(line: usize, message: impl Into<String>) -> AssemblerError {
    AssemblerError::SyntaxError { line, message: message.into() }
}

/// Drop a trailing `;` comment, ignoring semicolons inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                ';' => return &line[..i],
                _ => {}
            },
        }
    }

    line
}

fn split_operands(rest: &str) -> Vec<&str> {
    if rest.is_empty() {
        return Vec::new();
    }
    rest.split(',').map(str::trim).collect()
}

fn parse_register(operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
    let operand = operand.trim();
    operand
        .strip_prefix(['R', 'r'])
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|&n| n < 32)
        .ok_or_else(|| syntax(line_num, format!("expected register R0..R31, found '{}'", operand)))
}

/// Low register of a pair: `R25:R24`, `R24`, or `X`/`Y`/`Z`.
fn parse_pair(operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
    let operand = operand.trim();
    match operand.to_uppercase().as_str() {
        "X" => return Ok(26),
        "Y" => return Ok(28),
        "Z" => return Ok(30),
        _ => {}
    }

    match operand.split_once(':') {
        Some((high, low)) => {
            let high = parse_register(high, line_num)?;
            let low = parse_register(low, line_num)?;
            if high != low + 1 {
                return Err(syntax(line_num, format!("'{}' is not a register pair", operand)));
            }
            Ok(low)
        }
        None => parse_register(operand, line_num),
    }
}

fn parse_string(operand: &str, line_num: usize) -> Result<String, AssemblerError> {
    let inner = operand
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| syntax(line_num, "expected a double-quoted string"))?;
    parse_escaped(inner, line_num)
}

fn parse_escaped(text: &str, line_num: usize) -> Result<String, AssemblerError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            other => {
                return Err(syntax(line_num, format!("invalid escape sequence \\{}", other.unwrap_or(' '))));
            }
        };
        out.push(escaped);
    }

    Ok(out)
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined symbol on line {line}: {name}")]
    UndefinedSymbol { line: usize, name: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("cannot encode line {line}: {source}")]
    Encode { line: usize, source: EncodeError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::decode;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            LDI R16, 0x10
            LDI R17, 34
            ADD R16, R17
            NOP
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0xE100, 0xE212, 0x0F01, 0x0000]);
    }

    #[test]
    fn test_assemble_every_mnemonic() {
        let source = r#"
            ldi r17, 0x10
            add r16, r17
            adc r16, r17
            adiw r27:r26, 1
            and r16, r17
            andi r20, 0xF4
            asr r18
            out UDR, r20
            nop
        "#;

        let words = assemble(source).unwrap();
        assert_eq!(
            words,
            vec![0xE110, 0x0F01, 0x1F01, 0x9611, 0x2301, 0x7F40, 0x9525, 0xB94C, 0x0000]
        );
    }

    #[test]
    fn test_assemble_pairs() {
        let words = assemble("ADIW X, 2\nADIW Y, 2\nADIW Z, 2\nADIW R24, 63").unwrap();
        let decoded: Vec<_> = words.into_iter().map(decode).collect();
        assert_eq!(
            decoded,
            vec![
                Instruction::Adiw { d: 26, k: 2 },
                Instruction::Adiw { d: 28, k: 2 },
                Instruction::Adiw { d: 30, k: 2 },
                Instruction::Adiw { d: 24, k: 63 },
            ]
        );
        assert!(assemble("ADIW R26:R24, 1").is_err());
    }

    #[test]
    fn test_assemble_equ_and_literals() {
        let source = r#"
            .equ CHAR = 'A'
            .equ MASK = 0b11110000
            LDI R16, CHAR
            LDI R17, $7F
            ANDI R16, MASK
            LDI R18, -1
        "#;

        let words = assemble(source).unwrap();
        assert_eq!(decode(words[0]), Instruction::Ldi { d: 16, k: b'A' });
        assert_eq!(decode(words[1]), Instruction::Ldi { d: 17, k: 0x7F });
        assert_eq!(decode(words[2]), Instruction::Andi { d: 16, k: 0xF0 });
        assert_eq!(decode(words[3]), Instruction::Ldi { d: 18, k: 0xFF });
    }

    #[test]
    fn test_assemble_print_and_word() {
        let source = r#"
            PRINT R20, "A;B"   ; semicolon inside the string
            .word 0xFFFF
        "#;

        let words = assemble(source).unwrap();
        assert_eq!(words.len(), 7);
        assert_eq!(decode(words[0]), Instruction::Ldi { d: 20, k: b'A' });
        assert_eq!(decode(words[2]), Instruction::Ldi { d: 20, k: b';' });
        assert_eq!(words[6], 0xFFFF);
    }

    #[test]
    fn test_assemble_errors() {
        assert!(matches!(assemble("JMP 0"), Err(AssemblerError::UnknownMnemonic { line: 1, .. })));
        assert!(matches!(assemble("\nLDI R16, FOO"), Err(AssemblerError::UndefinedSymbol { line: 2, .. })));
        assert!(matches!(assemble("LDI R16, 256"), Err(AssemblerError::ValueOutOfRange { value: 256, .. })));
        assert!(matches!(assemble("LDI R3, 1"), Err(AssemblerError::Encode { .. })));
        assert!(matches!(assemble("ADD R16"), Err(AssemblerError::SyntaxError { .. })));
        assert!(matches!(assemble("ASR R32"), Err(AssemblerError::SyntaxError { .. })));
    }
}
