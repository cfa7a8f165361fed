//! Execution history.
//!
//! A debugger that lets the user scroll back and forth through a run keeps
//! one immutable [`Snapshot`] per step instead of re-executing. Every entry
//! is a deep copy, so entries never alias each other.

use crate::asm::disasm::disassemble;
use crate::cpu::{Cpu, Snapshot};
use serde::{Serialize, Deserialize};

/// One executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Address the word was fetched from.
    pub addr: u16,
    /// The raw instruction word.
    pub word: u16,
    /// Disassembly of `word`.
    pub text: String,
    /// Machine state after the step.
    pub after: Snapshot,
}

/// Run `program` from reset and record every step.
///
/// Stops when the CPU halts, runs off the end of the program, or after
/// `max_steps` steps.
pub fn record(program: &[u16], max_steps: usize) -> Vec<TraceEntry> {
    let mut cpu = Cpu::new(program.to_vec());
    let mut entries = Vec::new();

    while !cpu.is_halted() && !cpu.at_end() && entries.len() < max_steps {
        let addr = cpu.pc();
        let word = program[usize::from(addr)];

        cpu.step();

        entries.push(TraceEntry {
            addr,
            word,
            text: disassemble(word),
            after: cpu.snapshot(),
        });
    }

    log::debug!("recorded {} steps", entries.len());
    entries
}
