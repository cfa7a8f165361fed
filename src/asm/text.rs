//! Text to UART program generator.
//!
//! Produces an `LDI Rd, c` / `OUT UDR, Rd` pair for every byte of a string,
//! so running the result transmits the string through the serial port.

use crate::cpu::decode::{encode, EncodeError, Instruction};
use crate::cpu::io::UDR;

/// Encode `text` as LDI/OUT pairs using register `reg`.
///
/// `reg` must be usable by LDI (R16..R31) and also encodable as the OUT
/// source together with the UART port, which leaves R16, R20, R24 and R28.
pub fn encode_text(text: &str, reg: u8) -> Result<Vec<u16>, EncodeError> {
    let out = encode(&Instruction::Out { a: UDR, r: reg })?;

    let mut program = Vec::with_capacity(text.len() * 2);
    for byte in text.bytes() {
        program.push(encode(&Instruction::Ldi { d: reg, k: byte })?);
        program.push(out);
    }

    Ok(program)
}
