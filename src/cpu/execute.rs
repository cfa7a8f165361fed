//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{DataMemory, IoSpace, ProgramStore, Registers};
use crate::cpu::decode::{self, Instruction};
use crate::cpu::flags::{self, Sreg};
use serde::{Serialize, Deserialize};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU fetched a word it could not decode. Terminal.
    Halted,
}

/// Why [`Cpu::run_limited`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Halted,
    EndOfProgram,
    StepLimit,
}

/// Result of a bounded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Steps taken during this run, including a halting one.
    pub steps: u64,
    pub stop: StopReason,
}

/// A detached copy of the observable machine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub registers: [u8; 32],
    pub sreg: u8,
    pub pc: u16,
    pub io: Vec<u8>,
    pub serial: Vec<u8>,
    pub state: CpuState,
    pub cycles: u64,
}

/// The microcontroller core.
///
/// Owns every piece of machine state. Cloning gives a fully independent
/// machine.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    regs: Registers,
    sram: DataMemory,
    io: IoSpace,
    flash: ProgramStore,
    state: CpuState,
    /// Instructions executed (the halting fetch is not counted).
    cycles: u64,
    /// The word that halted the machine.
    halt_word: Option<u16>,
}

impl Cpu {
    /// Create a CPU with zeroed state around a loaded program.
    pub fn new(program: Vec<u16>) -> Self {
        Self::with_registers(program, Registers::new())
    }

    /// Create a CPU whose register file, SREG and PC start from `regs`.
    pub fn with_registers(program: Vec<u16>, regs: Registers) -> Self {
        Self {
            regs,
            sram: DataMemory::new(),
            io: IoSpace::new(),
            flash: ProgramStore::new(program),
            state: CpuState::Running,
            cycles: 0,
            halt_word: None,
        }
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was fetched, or `None` if the CPU was
    /// already halted (in which case nothing changes).
    ///
    /// # Panics
    /// Panics if the program counter is past the end of the program; check
    /// [`Cpu::at_end`] first.
    pub fn step(&mut self) -> Option<Instruction> {
        if self.state == CpuState::Halted {
            return None;
        }

        // Fetch
        let pc = self.regs.advance_pc();
        let word = self.flash.fetch(pc);

        // Decode
        let instr = decode::decode(word);
        log::trace!("{:04X}: {:04X}  {}", pc, word, instr);

        // Execute
        self.execute(instr);

        Some(instr)
    }

    /// Step until halted, out of program, or `max_steps` taken.
    pub fn run_limited(&mut self, max_steps: u64) -> RunSummary {
        let mut steps = 0;

        let stop = loop {
            if self.is_halted() {
                break StopReason::Halted;
            }
            if self.at_end() {
                break StopReason::EndOfProgram;
            }
            if steps >= max_steps {
                break StopReason::StepLimit;
            }
            self.step();
            steps += 1;
        };

        RunSummary { steps, stop }
    }

    /// Apply a decoded instruction to the machine state.
    fn execute(&mut self, instr: Instruction) {
        match instr {
            // ==================== Transfer ====================

            Instruction::Ldi { d, k } => {
                self.regs.set(d, k);
            }

            Instruction::Out { a, r } => {
                let value = self.regs.get(r);
                self.io.write(a, value);
            }

            // ==================== Arithmetic ====================

            Instruction::Add { d, r } => {
                let (result, update) = flags::add(self.regs.get(d), self.regs.get(r), false);
                self.regs.set(d, result);
                self.regs.sreg.apply(update);
            }

            Instruction::Adc { d, r } => {
                let carry = self.regs.sreg.contains(Sreg::C);
                let (result, update) = flags::add(self.regs.get(d), self.regs.get(r), carry);
                self.regs.set(d, result);
                self.regs.sreg.apply(update);
            }

            Instruction::Adiw { d, k } => {
                let before = self.regs.pair(d);
                let after = before.wrapping_add(u16::from(k));
                self.regs.set_pair(d, after);
                self.regs.sreg.apply(flags::adiw(before, after));
            }

            Instruction::Asr { d } => {
                let (result, update) = flags::asr(self.regs.get(d));
                self.regs.set(d, result);
                self.regs.sreg.apply(update);
            }

            // ==================== Logic ====================

            Instruction::And { d, r } => {
                let result = self.regs.get(d) & self.regs.get(r);
                self.regs.set(d, result);
                self.regs.sreg.apply(flags::logic(result));
            }

            Instruction::Andi { d, k } => {
                let result = self.regs.get(d) & k;
                self.regs.set(d, result);
                self.regs.sreg.apply(flags::logic(result));
            }

            // ==================== Special ====================

            Instruction::Nop => {}

            Instruction::Unknown(word) => {
                log::warn!(
                    "unknown instruction {:#06X} at {:#06X}, halting",
                    word,
                    self.regs.pc.wrapping_sub(1)
                );
                self.state = CpuState::Halted;
                self.halt_word = Some(word);
                return;
            }
        }

        self.cycles += 1;
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the program counter has run off the end of the program.
    pub fn at_end(&self) -> bool {
        usize::from(self.regs.pc) >= self.flash.len()
    }

    /// Current execution state.
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// The undecodable word that halted the CPU, if any.
    pub fn halt_word(&self) -> Option<u16> {
        self.halt_word
    }

    /// Instructions executed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    // ==================== Inspection ====================

    /// R0..R31.
    pub fn registers(&self) -> &[u8; 32] {
        &self.regs.r
    }

    /// Status register.
    pub fn sreg(&self) -> Sreg {
        self.regs.sreg
    }

    /// Program counter.
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    /// I/O register bank.
    pub fn io(&self) -> &IoSpace {
        &self.io
    }

    /// Bytes written to the UART data register so far.
    pub fn serial_output(&self) -> &[u8] {
        self.io.serial_output()
    }

    /// Data memory.
    pub fn sram(&self) -> &DataMemory {
        &self.sram
    }

    /// Program store.
    pub fn flash(&self) -> &ProgramStore {
        &self.flash
    }

    /// Copy out the observable state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            registers: self.regs.r,
            sreg: self.regs.sreg.bits(),
            pc: self.regs.pc,
            io: self.io.as_slice().to_vec(),
            serial: self.io.serial_output().to_vec(),
            state: self.state,
            cycles: self.cycles,
        }
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}
