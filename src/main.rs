//! AVR Emulator - CLI Entry Point
//!
//! Commands:
//! - `avr-emu run <program>` - Run an Intel HEX or ASM file
//! - `avr-emu debug <program>` - Interactive step history browser
//! - `avr-emu asm <source>` - Assemble to Intel HEX
//! - `avr-emu disasm <program>` - Disassemble a program
//! - `avr-emu text <text>` - Build a program that prints text over the UART

use avr::cpu::memory::MAX_PROGRAM_WORDS;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "avr-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A single-step emulator for a small slice of the 8-bit AVR instruction set")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts or runs out of instructions
    Run {
        /// Path to the HEX or ASM file to execute
        program: String,
        /// Maximum number of steps to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_steps: u64,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Browse a recorded run step by step
    #[cfg(feature = "tui")]
    Debug {
        /// Path to the HEX or ASM file to debug
        program: String,
        /// Maximum number of steps to record (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_steps: usize,
    },
    /// Assemble source to Intel HEX
    Asm {
        /// Path to the source file
        source: String,
        /// Output HEX file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a program to readable text
    Disasm {
        /// Path to the HEX or ASM file
        program: String,
    },
    /// Generate a program that writes TEXT to the UART
    Text {
        /// Text to transmit
        text: String,
        /// Register used for each character (R16, R20, R24 or R28)
        #[arg(short, long, default_value = "20")]
        reg: u8,
        /// Output HEX file (prints a listing when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, max_steps, trace, json }) => {
            run_program(&program, max_steps, trace, json);
        }
        #[cfg(feature = "tui")]
        Some(Commands::Debug { program, max_steps }) => {
            debug_program(&program, max_steps);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        Some(Commands::Text { text, reg, output }) => {
            text_program(&text, reg, output);
        }
        None => {
            println!("AVR Emulator v0.1.0");
            println!("LDI, ADD, ADC, ADIW, AND, ANDI, ASR, OUT and NOP on an ATmega-style core");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Load a program, assembling `.asm` sources and reading anything else as Intel HEX.
fn load_program(path: &str) -> Vec<u16> {
    use avr::{assemble, load_hex};

    let words = if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(words) => {
                println!("📝 Assembled {} words", words.len());
                words
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_hex(path) {
            Ok(words) => {
                println!("📂 Loaded {} words", words.len());
                words
            }
            Err(e) => {
                eprintln!("❌ Failed to load HEX: {}", e);
                std::process::exit(1);
            }
        }
    };

    if words.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    if words.len() > MAX_PROGRAM_WORDS {
        eprintln!("❌ Program of {} words does not fit in flash ({} words)", words.len(), MAX_PROGRAM_WORDS);
        std::process::exit(1);
    }

    words
}

fn run_program(path: &str, max_steps: u64, trace: bool, json: bool) {
    use avr::{Cpu, StopReason};

    println!("🔧 Running: {}", path);
    let program = load_program(path);
    let mut cpu = Cpu::new(program);

    println!();
    println!("━━━ Execution ━━━");

    let stop = if trace {
        let mut steps = 0u64;
        loop {
            if cpu.is_halted() {
                break StopReason::Halted;
            }
            if cpu.at_end() {
                break StopReason::EndOfProgram;
            }
            if steps >= max_steps {
                break StopReason::StepLimit;
            }

            let pc = cpu.pc();
            if let Some(instr) = cpu.step() {
                println!("{:04X}: {:<20} SREG={:08b}", pc, instr.to_string(), cpu.sreg().bits());
            }
            steps += 1;
        }
    } else {
        cpu.run_limited(max_steps).stop
    };

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Steps: {}", cpu.cycles());
    println!("Stop: {:?}", stop);
    println!("PC:   0x{:04X}", cpu.pc());
    println!("SREG: {:08b} ({:?})", cpu.sreg().bits(), cpu.sreg());
    for (row, regs) in cpu.registers().chunks(8).enumerate() {
        let cells: Vec<String> = regs
            .iter()
            .enumerate()
            .map(|(i, v)| format!("R{:<2}={:02X}", row * 8 + i, v))
            .collect();
        println!("{}", cells.join(" "));
    }

    if !cpu.serial_output().is_empty() {
        println!();
        println!("━━━ Serial ━━━");
        println!("{}", cpu.io().serial_text());
    }

    if let Some(word) = cpu.halt_word() {
        println!();
        println!("⛔ Halted on unknown instruction 0x{:04X}", word);
    }

    if stop == StopReason::StepLimit {
        println!();
        println!("⚠️  Reached max steps limit ({}). Use --max-steps to increase.", max_steps);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, max_steps: usize) {
    use avr::run_debugger;

    println!("🔍 Loading: {}", path);
    let program = load_program(path);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(program, max_steps) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use avr::assemble;
    use avr::asm::save_hex;

    let out_path = match hex_output_path(Path::new(source_path), output.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    println!("📝 Assembling: {} → {}", source_path, out_path.display());

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let words = match assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} words", words.len());

    if let Err(e) = save_hex(&out_path, &words) {
        eprintln!("❌ Failed to save HEX: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path.display());
}

/// Where `asm` writes its HEX output: `output` if given, else the source
/// path with a `.hex` extension. Never the source file itself.
fn hex_output_path(source: &Path, output: Option<&str>) -> Result<PathBuf, String> {
    let out = match output {
        Some(path) => PathBuf::from(path),
        None => source.with_extension("hex"),
    };

    let same = out.as_path() == source
        || matches!(
            (std::fs::canonicalize(source), std::fs::canonicalize(&out)),
            (Ok(a), Ok(b)) if a == b
        );
    if same {
        return Err(format!("Output {} would overwrite the source file", out.display()));
    }

    Ok(out)
}

fn disassemble_file(path: &str) {
    use avr::asm::disassemble_program;

    println!("📖 Disassembling: {}", path);
    println!();

    let words = load_program(path);
    println!("{}", disassemble_program(&words));
}

fn text_program(text: &str, reg: u8, output: Option<String>) {
    use avr::asm::{disassemble_program, save_hex};
    use avr::encode_text;

    let words = match encode_text(text, reg) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("❌ Cannot encode with R{}: {}", reg, e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = save_hex(&path, &words) {
                eprintln!("❌ Failed to save HEX: {}", e);
                std::process::exit(1);
            }
            println!("✓ Saved {} words to {}", words.len(), path);
        }
        None => println!("{}", disassemble_program(&words)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_output_path_replaces_extension() {
        assert_eq!(hex_output_path(Path::new("p/prog.asm"), None), Ok(PathBuf::from("p/prog.hex")));
        assert_eq!(hex_output_path(Path::new("p/prog.s"), None), Ok(PathBuf::from("p/prog.hex")));
        assert_eq!(hex_output_path(Path::new("prog"), None), Ok(PathBuf::from("prog.hex")));
        assert_eq!(hex_output_path(Path::new("prog.s"), Some("out.hex")), Ok(PathBuf::from("out.hex")));
    }

    #[test]
    fn test_hex_output_path_never_overwrites_source() {
        assert!(hex_output_path(Path::new("p/prog.hex"), None).is_err());
        assert!(hex_output_path(Path::new("prog.s"), Some("prog.s")).is_err());
    }

    #[test]
    fn test_hex_output_path_same_file_other_spelling() {
        let dir = std::env::temp_dir().join(format!("avr-emu-asm-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let source = dir.join("prog.s");
        std::fs::write(&source, "NOP\n").unwrap();

        let other = dir.join(".").join("prog.s");
        let result = hex_output_path(&source, other.to_str());
        std::fs::remove_dir_all(&dir).ok();

        assert!(result.is_err());
    }
}
