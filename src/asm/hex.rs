//! Intel HEX program images.
//!
//! The usual output format of AVR toolchains. Each line is a record:
//!
//! ```text
//! :LLAAAATT<data>CC
//! ```
//!
//! - `LL` byte count, `AAAA` 16-bit offset, `TT` record type
//! - `CC` two's complement checksum of every preceding byte
//!
//! Data bytes are laid out at their byte address and paired into
//! little-endian instruction words. Gaps read as erased flash (0xFF).

use crate::cpu::memory::MAX_PROGRAM_WORDS;
use std::path::Path;
use thiserror::Error;

/// Largest image accepted, in bytes: every word the program counter can reach.
pub const MAX_IMAGE_BYTES: usize = MAX_PROGRAM_WORDS * 2;

/// Data bytes per record written by [`to_hex`].
const RECORD_DATA_LEN: usize = 16;

const DATA: u8 = 0x00;
const END_OF_FILE: u8 = 0x01;
const EXTENDED_SEGMENT_ADDRESS: u8 = 0x02;
const START_SEGMENT_ADDRESS: u8 = 0x03;
const EXTENDED_LINEAR_ADDRESS: u8 = 0x04;
const START_LINEAR_ADDRESS: u8 = 0x05;

/// A single parsed record.
#[derive(Debug)]
struct Record {
    offset: u16,
    kind: u8,
    data: Vec<u8>,
}

impl Record {
    fn parse(line: &str, line_num: usize) -> Result<Self, LoadError> {
        let malformed = |reason: &str| LoadError::MalformedRecord {
            line: line_num,
            reason: reason.to_string(),
        };

        let body = line.strip_prefix(':').ok_or_else(|| malformed("missing ':' start code"))?;
        if !body.is_ascii() {
            return Err(malformed("non-ASCII characters"));
        }
        if body.len() % 2 != 0 {
            return Err(malformed("odd number of hex digits"));
        }

        let bytes = (0..body.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&body[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| malformed("invalid hex digit"))?;

        if bytes.len() < 5 {
            return Err(malformed("record too short"));
        }

        let len = usize::from(bytes[0]);
        if bytes.len() != len + 5 {
            return Err(malformed("byte count does not match record length"));
        }

        let (payload, checksum) = bytes.split_at(bytes.len() - 1);
        let expected = checksum_of(payload);
        if expected != checksum[0] {
            return Err(LoadError::ChecksumMismatch {
                line: line_num,
                expected,
                found: checksum[0],
            });
        }

        Ok(Self {
            offset: u16::from_be_bytes([bytes[1], bytes[2]]),
            kind: bytes[3],
            data: bytes[4..4 + len].to_vec(),
        })
    }

    /// The 16-bit value carried by an address record.
    fn address_value(&self, line_num: usize) -> Result<u32, LoadError> {
        match self.data[..] {
            [hi, lo] => Ok(u32::from(u16::from_be_bytes([hi, lo]))),
            _ => Err(LoadError::MalformedRecord {
                line: line_num,
                reason: "address record must carry 2 bytes".into(),
            }),
        }
    }
}

fn checksum_of(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)).wrapping_neg()
}

/// Parse Intel HEX text into instruction words.
pub fn parse_hex(text: &str) -> Result<Vec<u16>, LoadError> {
    let mut image: Vec<u8> = Vec::new();
    let mut base: u32 = 0;

    for (idx, raw) in text.lines().enumerate() {
        let line_num = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let record = Record::parse(line, line_num)?;

        match record.kind {
            DATA => {
                let start = (base + u32::from(record.offset)) as usize;
                let end = start + record.data.len();
                if end > MAX_IMAGE_BYTES {
                    return Err(LoadError::MalformedRecord {
                        line: line_num,
                        reason: format!("address {:#X} beyond flash", end - 1),
                    });
                }
                if image.len() < end {
                    image.resize(end, 0xFF);
                }
                image[start..end].copy_from_slice(&record.data);
            }
            END_OF_FILE => break,
            EXTENDED_SEGMENT_ADDRESS => base = record.address_value(line_num)? << 4,
            EXTENDED_LINEAR_ADDRESS => base = record.address_value(line_num)? << 16,
            START_SEGMENT_ADDRESS | START_LINEAR_ADDRESS => {}
            kind => {
                return Err(LoadError::UnsupportedRecordType { line: line_num, kind });
            }
        }
    }

    if image.len() % 2 != 0 {
        image.push(0xFF);
    }

    Ok(image
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Render instruction words as Intel HEX text.
pub fn to_hex(words: &[u16]) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    let mut output = String::new();
    let mut segment: u32 = 0;

    for (i, chunk) in bytes.chunks(RECORD_DATA_LEN).enumerate() {
        let addr = (i * RECORD_DATA_LEN) as u32;
        if addr >> 16 != segment {
            segment = addr >> 16;
            push_record(&mut output, 0, EXTENDED_LINEAR_ADDRESS, &(segment as u16).to_be_bytes());
        }
        push_record(&mut output, addr as u16, DATA, chunk);
    }

    push_record(&mut output, 0, END_OF_FILE, &[]);
    output
}

fn push_record(output: &mut String, offset: u16, kind: u8, data: &[u8]) {
    let mut bytes = vec![data.len() as u8];
    bytes.extend_from_slice(&offset.to_be_bytes());
    bytes.push(kind);
    bytes.extend_from_slice(data);
    bytes.push(checksum_of(&bytes));

    output.push(':');
    for b in bytes {
        output.push_str(&format!("{:02X}", b));
    }
    output.push('\n');
}

/// Load an Intel HEX file from disk.
pub fn load_hex<P: AsRef<Path>>(path: P) -> Result<Vec<u16>, LoadError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| LoadError::IoError(e.to_string()))?;
    let words = parse_hex(&text)?;
    log::info!("loaded {} words from {}", words.len(), path.as_ref().display());
    Ok(words)
}

/// Save instruction words as an Intel HEX file.
pub fn save_hex<P: AsRef<Path>>(path: P, words: &[u16]) -> Result<(), LoadError> {
    std::fs::write(path.as_ref(), to_hex(words))
        .map_err(|e| LoadError::IoError(e.to_string()))
}

/// Errors that can occur while loading a program image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("checksum mismatch on line {line}: expected {expected:#04X}, found {found:#04X}")]
    ChecksumMismatch { line: usize, expected: u8, found: u8 },

    #[error("unsupported record type {kind:#04X} on line {line}")]
    UnsupportedRecordType { line: usize, kind: u8 },
}
