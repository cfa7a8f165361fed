//! Program and data memory.
//!
//! The two address spaces are separate (Harvard layout): instructions are
//! fetched from [`ProgramStore`] by word address, data lives in
//! [`DataMemory`] by byte address.

use serde::{Serialize, Deserialize};

/// Size of the data memory in bytes.
pub const SRAM_SIZE: usize = 2048;

/// Largest program the 16-bit program counter can run off the end of.
pub const MAX_PROGRAM_WORDS: usize = u16::MAX as usize;

/// Flash: an immutable sequence of 16-bit instruction words.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStore {
    words: Vec<u16>,
}

impl ProgramStore {
    /// Wrap an already decoded word sequence.
    ///
    /// # Panics
    /// Panics if the program is longer than [`MAX_PROGRAM_WORDS`].
    pub fn new(words: Vec<u16>) -> Self {
        assert!(
            words.len() <= MAX_PROGRAM_WORDS,
            "program of {} words exceeds flash ({} words)",
            words.len(),
            MAX_PROGRAM_WORDS
        );
        Self { words }
    }

    /// Fetch the word at `addr`.
    ///
    /// # Panics
    /// Panics if `addr` is past the end of the program. Callers are
    /// expected to check [`ProgramStore::len`] before stepping.
    #[inline]
    pub fn fetch(&self, addr: u16) -> u16 {
        let index = usize::from(addr);
        assert!(
            index < self.words.len(),
            "program counter {:#06X} past end of flash ({} words)",
            addr,
            self.words.len()
        );
        self.words[index]
    }

    /// Number of words in the program.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The full program.
    pub fn words(&self) -> &[u16] {
        &self.words
    }
}

impl std::fmt::Debug for ProgramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramStore")
            .field("words", &self.words.len())
            .finish()
    }
}

/// SRAM: a zero-initialised byte array.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMemory {
    bytes: Vec<u8>,
}

impl DataMemory {
    /// Create a new memory with all bytes zeroed.
    pub fn new() -> Self {
        Self {
            bytes: vec![0; SRAM_SIZE],
        }
    }

    /// Read a byte.
    ///
    /// # Panics
    /// Panics if address is out of range.
    #[inline]
    pub fn read(&self, addr: usize) -> u8 {
        assert!(addr < SRAM_SIZE, "SRAM address {} out of range (0-{})", addr, SRAM_SIZE - 1);
        self.bytes[addr]
    }

    /// Write a byte.
    ///
    /// # Panics
    /// Panics if address is out of range.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) {
        assert!(addr < SRAM_SIZE, "SRAM address {} out of range (0-{})", addr, SRAM_SIZE - 1);
        self.bytes[addr] = value;
    }

    /// The whole address space.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for DataMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.bytes.iter().filter(|&&b| b != 0).count();

        f.debug_struct("DataMemory")
            .field("non_zero_bytes", &non_zero)
            .field("total_bytes", &SRAM_SIZE)
            .finish()
    }
}
