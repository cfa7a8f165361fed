//! End-to-end tests: source or HEX in, machine state out.

use avr::cpu::io::{PinState, DDRB, PORTB, UDR};
use avr::cpu::{trace, Registers};
use avr::{assemble, decode, disassemble, encode, parse_hex, Cpu, CpuState, Instruction, Sreg, StopReason};

fn run(program: Vec<u16>) -> Cpu {
    let mut cpu = Cpu::new(program);
    cpu.run_limited(10_000);
    cpu
}

#[test]
fn test_add_concrete() {
    let mut regs = Registers::new();
    regs.r[16] = 0x10;
    regs.r[17] = 0x22;
    let mut cpu = Cpu::with_registers(vec![encode(&Instruction::Add { d: 16, r: 17 }).unwrap()], regs);

    cpu.step();
    assert_eq!(cpu.registers()[16], 0x32);
    assert!(!cpu.sreg().contains(Sreg::Z));
    assert!(!cpu.sreg().contains(Sreg::C));
}

#[test]
fn test_adc_concrete() {
    let mut regs = Registers::new();
    regs.r[16] = 0x10;
    regs.r[17] = 0x11;
    regs.sreg = Sreg::C;
    let mut cpu = Cpu::with_registers(vec![encode(&Instruction::Adc { d: 16, r: 17 }).unwrap()], regs);

    cpu.step();
    assert_eq!(cpu.registers()[16], 0x22);
    assert!(!cpu.sreg().contains(Sreg::Z));
    assert!(!cpu.sreg().contains(Sreg::C));
}

#[test]
fn test_asr_concrete() {
    let mut regs = Registers::new();
    regs.r[30] = 0b1000_0101;
    let mut cpu = Cpu::with_registers(vec![encode(&Instruction::Asr { d: 30 }).unwrap()], regs);

    cpu.step();
    assert_eq!(cpu.registers()[30], 0b1100_0010);
    assert!(cpu.sreg().contains(Sreg::C));
    assert!(cpu.sreg().contains(Sreg::N));
    // V = N ^ C, S = N ^ V
    assert!(!cpu.sreg().contains(Sreg::V));
    assert!(cpu.sreg().contains(Sreg::S));
}

#[test]
fn test_adiw_pair_selection() {
    assert_eq!(decode(0x9600), Instruction::Adiw { d: 24, k: 0 });
    assert_eq!(decode(0x9610), Instruction::Adiw { d: 26, k: 0 });
    assert_eq!(decode(0x9620), Instruction::Adiw { d: 28, k: 0 });
    assert_eq!(decode(0x9630), Instruction::Adiw { d: 30, k: 0 });
    assert_eq!(decode(0x96CF), Instruction::Adiw { d: 24, k: 63 });

    let mut regs = Registers::new();
    regs.r[28] = 0xF0;
    regs.r[29] = 0x12;
    let mut cpu = Cpu::with_registers(vec![0x962F], regs);
    cpu.step();
    assert_eq!(cpu.registers()[28], 0xFF);
    assert_eq!(cpu.registers()[29], 0x12);
}

#[test]
fn test_add_operand_slicing() {
    // Bit 9 is the high bit of the source register
    assert_eq!(decode(0x0E01), Instruction::Add { d: 0, r: 17 });
    // Bit 8 is the high bit of the destination register
    assert_eq!(decode(0x0D10), Instruction::Add { d: 17, r: 0 });
}

#[test]
fn test_assembled_program() {
    let source = r#"
        .equ LED = 0x20
            LDI  R16, LED
            OUT  DDRB, R16
            OUT  PORTB, R16
            PRINT R20, "ok"
            .word 0xFFFF
            NOP
    "#;
    let cpu = run(assemble(source).unwrap());

    assert_eq!(cpu.state(), CpuState::Halted);
    assert_eq!(cpu.halt_word(), Some(0xFFFF));
    assert_eq!(cpu.serial_output(), b"ok");
    assert_eq!(cpu.io().read(DDRB), 0x20);
    assert_eq!(cpu.io().read(PORTB), 0x20);
    assert_eq!(cpu.io().pin_states()[13], PinState::High);
    assert_eq!(cpu.io().pin_states()[12], PinState::Input);
}

#[test]
fn test_hex_program() {
    // LDI R20, 'A' ; OUT UDR, R20
    let words = parse_hex(":0400000041E44CB9D2\n:00000001FF\n").unwrap();
    let mut cpu = Cpu::new(words);

    let summary = cpu.run_limited(100);
    assert_eq!(summary.stop, StopReason::EndOfProgram);
    assert_eq!(summary.steps, 2);
    assert_eq!(cpu.serial_output(), b"A");
    assert_eq!(cpu.io().read(UDR), b'A');
}

#[test]
fn test_hex_file_round_trip() {
    let words = assemble("LDI R16, 1\nADD R16, R16\nNOP").unwrap();
    let path = std::env::temp_dir().join(format!("avr-emu-test-{}.hex", std::process::id()));

    avr::asm::save_hex(&path, &words).unwrap();
    let loaded = avr::load_hex(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, words);
}

#[test]
fn test_missing_hex_file() {
    let err = avr::load_hex("/nonexistent/program.hex").unwrap_err();
    assert!(matches!(err, avr::LoadError::IoError(_)));
}

#[test]
fn test_trace_snapshots_are_independent() {
    let program = assemble("PRINT R16, \"abc\"").unwrap();
    let history = trace::record(&program, 100);

    assert_eq!(history.len(), 6);
    assert_eq!(history[1].after.serial, b"a");
    assert_eq!(history[3].after.serial, b"ab");
    assert_eq!(history[5].after.serial, b"abc");
    assert_eq!(history[0].text, disassemble(program[0]));
}

#[test]
fn test_engines_do_not_interfere() {
    let program = assemble("PRINT R24, \"x\"").unwrap();
    let mut a = Cpu::new(program.clone());
    let b = Cpu::new(program);

    a.run_limited(10);
    assert_eq!(a.serial_output(), b"x");
    assert!(b.serial_output().is_empty());
    assert_eq!(b.pc(), 0);
}

#[test]
fn test_snapshot_json() {
    let cpu = run(assemble("LDI R31, 0x7F\nPRINT R28, \"j\"").unwrap());
    let snapshot = cpu.snapshot();

    let json = serde_json::to_string(&snapshot).unwrap();
    let back: avr::Snapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snapshot);
    assert_eq!(back.registers[31], 0x7F);
    assert_eq!(back.io.len(), 64);
}
