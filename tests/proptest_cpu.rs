//! Property-based tests for CPU invariants.
//!
//! These tests use proptest to check the execution core against its
//! arithmetic and classification rules across whole input ranges.

use avr::cpu::decode::lookup;
use avr::cpu::io::UDR;
use avr::{decode, disassemble, encode, Cpu, Instruction, Registers, Sreg};
use proptest::prelude::*;

/// Build a CPU around `program` with the register file seeded by `setup`.
fn cpu_with(program: &[Instruction], setup: impl FnOnce(&mut Registers)) -> Cpu {
    let mut regs = Registers::new();
    setup(&mut regs);
    let words = program.iter().map(|i| encode(i).unwrap()).collect();
    Cpu::with_registers(words, regs)
}

/// Words that no pattern claims.
fn unknown_word() -> impl Strategy<Value = u16> {
    any::<u16>().prop_filter("decodes to a real instruction", |w| {
        matches!(decode(*w), Instruction::Unknown(_))
    })
}

proptest! {
    #[test]
    fn prop_ldi_loads_and_keeps_sreg(d in 16u8..32, k in any::<u8>(), sreg in any::<u8>()) {
        let mut cpu = cpu_with(&[Instruction::Ldi { d, k }], |r| {
            r.sreg = Sreg::from_bits_retain(sreg);
        });

        cpu.step();
        prop_assert_eq!(cpu.registers()[usize::from(d)], k);
        prop_assert_eq!(cpu.sreg().bits(), sreg);
        prop_assert_eq!(cpu.pc(), 1);
    }

    #[test]
    fn prop_add_result_and_flags(a in any::<u8>(), b in any::<u8>(), sreg in any::<u8>()) {
        let mut cpu = cpu_with(&[Instruction::Add { d: 16, r: 17 }], |r| {
            r.r[16] = a;
            r.r[17] = b;
            r.sreg = Sreg::from_bits_retain(sreg);
        });

        cpu.step();
        let result = cpu.registers()[16];
        let wide = u16::from(a) + u16::from(b);

        prop_assert_eq!(result, (wide % 256) as u8);
        prop_assert_eq!(cpu.sreg().contains(Sreg::Z), result == 0);
        prop_assert_eq!(cpu.sreg().contains(Sreg::C), wide >= 256);
        prop_assert_eq!(cpu.sreg().contains(Sreg::N), result & 0x80 != 0);
        prop_assert_eq!(cpu.sreg().contains(Sreg::H), (a & 0x0F) + (b & 0x0F) > 0x0F);
        let overflow = (a as i8).checked_add(b as i8).is_none();
        prop_assert_eq!(cpu.sreg().contains(Sreg::V), overflow);
        prop_assert_eq!(
            cpu.sreg().contains(Sreg::S),
            cpu.sreg().contains(Sreg::N) ^ cpu.sreg().contains(Sreg::V)
        );
        // T and I are never touched
        prop_assert_eq!(cpu.sreg().bits() & 0xC0, sreg & 0xC0);
    }

    #[test]
    fn prop_adc_adds_carry(a in any::<u8>(), b in any::<u8>(), carry in any::<bool>()) {
        let mut cpu = cpu_with(&[Instruction::Adc { d: 24, r: 9 }], |r| {
            r.r[24] = a;
            r.r[9] = b;
            r.sreg.set(Sreg::C, carry);
        });

        cpu.step();
        let result = cpu.registers()[24];
        let wide = u16::from(a) + u16::from(b) + u16::from(carry);

        prop_assert_eq!(result, (wide % 256) as u8);
        prop_assert_eq!(cpu.sreg().contains(Sreg::C), wide >= 256);
        prop_assert_eq!(cpu.sreg().contains(Sreg::Z), result == 0);
        prop_assert_eq!(
            cpu.sreg().contains(Sreg::H),
            (a & 0x0F) + (b & 0x0F) + u8::from(carry) > 0x0F
        );
        prop_assert_eq!(cpu.registers()[9], b);
    }

    #[test]
    fn prop_asr_keeps_sign(value in any::<u8>(), sreg in any::<u8>()) {
        let mut cpu = cpu_with(&[Instruction::Asr { d: 7 }], |r| {
            r.r[7] = value;
            r.sreg = Sreg::from_bits_retain(sreg);
        });

        cpu.step();
        let result = cpu.registers()[7];
        let n = result & 0x80 != 0;
        let c = value & 0x01 != 0;

        prop_assert_eq!(result & 0x80, value & 0x80);
        prop_assert_eq!(result & 0x7F, value >> 1);
        prop_assert_eq!(cpu.sreg().contains(Sreg::C), c);
        prop_assert_eq!(cpu.sreg().contains(Sreg::N), n);
        prop_assert_eq!(cpu.sreg().contains(Sreg::V), n ^ c);
        prop_assert_eq!(cpu.sreg().contains(Sreg::S), c);
        prop_assert_eq!(cpu.sreg().contains(Sreg::Z), result == 0);
        // H, T, I are left alone
        prop_assert_eq!(cpu.sreg().bits() & 0xE0, sreg & 0xE0);
    }

    #[test]
    fn prop_and_is_bitwise(a in any::<u8>(), b in any::<u8>(), sreg in any::<u8>()) {
        let mut cpu = cpu_with(&[Instruction::And { d: 2, r: 30 }], |r| {
            r.r[2] = a;
            r.r[30] = b;
            r.sreg = Sreg::from_bits_retain(sreg);
        });

        cpu.step();
        prop_assert_eq!(cpu.registers()[2], a & b);
        prop_assert!(!cpu.sreg().contains(Sreg::V));
        prop_assert_eq!(cpu.sreg().contains(Sreg::Z), a & b == 0);
        prop_assert_eq!(cpu.sreg().contains(Sreg::S), a & b & 0x80 != 0);
        // C, H, T, I are left alone
        prop_assert_eq!(cpu.sreg().bits() & 0xE1, sreg & 0xE1);
    }

    #[test]
    fn prop_uart_appends(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
        let program: Vec<Instruction> = bytes
            .iter()
            .flat_map(|&k| [Instruction::Ldi { d: 16, k }, Instruction::Out { a: UDR, r: 16 }])
            .collect();
        let mut cpu = cpu_with(&program, |_| {});

        for (i, &b) in bytes.iter().enumerate() {
            cpu.step();
            let before = cpu.serial_output().to_vec();
            cpu.step();
            prop_assert_eq!(&cpu.serial_output()[..i], &before[..]);
            prop_assert_eq!(cpu.serial_output().len(), i + 1);
            prop_assert_eq!(cpu.serial_output()[i], b);
            prop_assert_eq!(cpu.io().read(UDR), b);
        }
    }

    #[test]
    fn prop_disassembly_agrees_with_decode(word in any::<u16>()) {
        let text = disassemble(word);
        prop_assert_eq!(&text, &disassemble(word));

        match (decode(word), lookup(word)) {
            (Instruction::Unknown(w), None) => {
                prop_assert_eq!(w, word);
                prop_assert!(text.starts_with("???"));
            }
            (instr, Some(pattern)) => {
                prop_assert_eq!(instr.mnemonic(), pattern.mnemonic);
                prop_assert!(text.starts_with(pattern.mnemonic));
            }
            (instr, None) => prop_assert!(false, "{:?} decoded without a pattern", instr),
        }
    }

    #[test]
    fn prop_unknown_word_halts(
        word in unknown_word(),
        regs in prop::array::uniform32(any::<u8>()),
        sreg in any::<u8>(),
    ) {
        let mut r = Registers::new();
        r.r = regs;
        r.sreg = Sreg::from_bits_retain(sreg);
        let mut cpu = Cpu::with_registers(vec![word, 0x0000], r);

        cpu.step();
        prop_assert!(cpu.is_halted());
        prop_assert_eq!(cpu.halt_word(), Some(word));
        prop_assert_eq!(cpu.registers(), &regs);
        prop_assert_eq!(cpu.sreg().bits(), sreg);

        let halted = cpu.snapshot();
        prop_assert_eq!(cpu.step(), None);
        prop_assert_eq!(cpu.snapshot(), halted);
    }
}
