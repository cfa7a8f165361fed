//! Status register and flag derivation.
//!
//! Every function here is pure: it takes operands (and, where needed, the
//! result) and returns a [`FlagUpdate`] naming exactly the SREG bits its
//! instruction class writes. [`Sreg::apply`] merges an update so that bits
//! outside the mask keep their previous value.

use bitflags::bitflags;
use serde::{Serialize, Deserialize};

bitflags! {
    /// The 8-bit status register (SREG).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Sreg: u8 {
        /// Carry out of bit 7.
        const C = 1 << 0;
        /// Result is zero.
        const Z = 1 << 1;
        /// Bit 7 of the result.
        const N = 1 << 2;
        /// Two's complement overflow.
        const V = 1 << 3;
        /// N xor V.
        const S = 1 << 4;
        /// Carry out of bit 3.
        const H = 1 << 5;
        /// Bit copy storage. Not touched by the implemented subset.
        const T = 1 << 6;
        /// Global interrupt enable. Not touched by the implemented subset.
        const I = 1 << 7;
    }
}

impl Sreg {
    /// Bits written by ADD and ADC.
    pub const ARITH: Sreg = Sreg::C
        .union(Sreg::Z)
        .union(Sreg::N)
        .union(Sreg::V)
        .union(Sreg::S)
        .union(Sreg::H);

    /// Bits written by AND and ANDI.
    pub const LOGIC: Sreg = Sreg::Z.union(Sreg::N).union(Sreg::V).union(Sreg::S);

    /// Bits written by ASR and ADIW.
    pub const SHIFT: Sreg = Sreg::C
        .union(Sreg::Z)
        .union(Sreg::N)
        .union(Sreg::V)
        .union(Sreg::S);

    /// Merge an update, leaving bits outside its mask untouched.
    pub fn apply(&mut self, update: FlagUpdate) {
        self.remove(update.mask);
        self.insert(update.value & update.mask);
    }
}

/// A partial SREG write: which bits are affected and their new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagUpdate {
    pub mask: Sreg,
    pub value: Sreg,
}

impl FlagUpdate {
    fn new(mask: Sreg) -> Self {
        Self { mask, value: Sreg::empty() }
    }

    fn with(mut self, flag: Sreg, on: bool) -> Self {
        debug_assert!(self.mask.contains(flag));
        self.value.set(flag, on);
        self
    }

    /// Value this update assigns to `flag`, or `None` if it leaves it alone.
    pub fn get(&self, flag: Sreg) -> Option<bool> {
        self.mask.contains(flag).then(|| self.value.contains(flag))
    }
}

#[inline]
fn bit(value: u8, n: u8) -> bool {
    (value >> n) & 1 != 0
}

/// 8-bit addition with optional carry-in.
///
/// Returns the wrapped result and the C, Z, N, V, S, H update.
pub fn add(a: u8, b: u8, carry_in: bool) -> (u8, FlagUpdate) {
    let r = a.wrapping_add(b).wrapping_add(carry_in as u8);

    let (a3, b3, r3) = (bit(a, 3), bit(b, 3), bit(r, 3));
    let (a7, b7, r7) = (bit(a, 7), bit(b, 7), bit(r, 7));

    let h = (a3 && b3) || (b3 && !r3) || (!r3 && a3);
    let c = (a7 && b7) || (b7 && !r7) || (!r7 && a7);
    let v = (a7 && b7 && !r7) || (!a7 && !b7 && r7);
    let n = r7;

    let update = FlagUpdate::new(Sreg::ARITH)
        .with(Sreg::H, h)
        .with(Sreg::C, c)
        .with(Sreg::V, v)
        .with(Sreg::N, n)
        .with(Sreg::Z, r == 0)
        .with(Sreg::S, n ^ v);

    (r, update)
}

/// Flags for a logical result. V is cleared, H is left alone.
pub fn logic(r: u8) -> FlagUpdate {
    let n = bit(r, 7);
    FlagUpdate::new(Sreg::LOGIC)
        .with(Sreg::V, false)
        .with(Sreg::N, n)
        .with(Sreg::Z, r == 0)
        .with(Sreg::S, n)
}

/// Arithmetic shift right: bit 7 is kept, bit 0 goes to carry.
pub fn asr(old: u8) -> (u8, FlagUpdate) {
    let r = (old >> 1) | (old & 0x80);

    let c = bit(old, 0);
    let n = bit(r, 7);
    let v = n ^ c;

    let update = FlagUpdate::new(Sreg::SHIFT)
        .with(Sreg::C, c)
        .with(Sreg::N, n)
        .with(Sreg::V, v)
        .with(Sreg::Z, r == 0)
        .with(Sreg::S, n ^ v);

    (r, update)
}

/// Flags for a 16-bit register-pair add of an unsigned immediate.
///
/// `before` and `after` are the pair values around the add.
pub fn adiw(before: u16, after: u16) -> FlagUpdate {
    let rdh7 = before & 0x8000 != 0;
    let r15 = after & 0x8000 != 0;

    let v = !rdh7 && r15;
    let c = !r15 && rdh7;

    FlagUpdate::new(Sreg::SHIFT)
        .with(Sreg::C, c)
        .with(Sreg::V, v)
        .with(Sreg::N, r15)
        .with(Sreg::Z, after == 0)
        .with(Sreg::S, r15 ^ v)
}
