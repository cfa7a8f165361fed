//! Memory-mapped I/O space.
//!
//! 64 byte-wide peripheral registers. Writes to [`UDR`] also push the byte
//! onto the serial transmit buffer. Nothing drives the registers from the
//! peripheral side, so a read returns whatever was last written.

use serde::{Serialize, Deserialize};

/// Number of addressable I/O registers.
pub const IO_SIZE: usize = 64;

/// Port B data direction register.
pub const DDRB: u8 = 0x04;
/// Port B data register.
pub const PORTB: u8 = 0x05;
/// Port C data direction register.
pub const DDRC: u8 = 0x07;
/// Port C data register.
pub const PORTC: u8 = 0x08;
/// Port D data direction register.
pub const DDRD: u8 = 0x0A;
/// Port D data register.
pub const PORTD: u8 = 0x0B;
/// UART data register.
pub const UDR: u8 = 0x0C;

/// Named I/O registers, as recognised by the assembler.
pub const IO_NAMES: &[(&str, u8)] = &[
    ("DDRB", DDRB),
    ("PORTB", PORTB),
    ("DDRC", DDRC),
    ("PORTC", PORTC),
    ("DDRD", DDRD),
    ("PORTD", PORTD),
    ("UDR", UDR),
];

/// Number of digital pins exposed on the board header (D0..D13).
pub const DIGITAL_PINS: usize = 14;

/// Level of a digital pin as seen from outside the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinState {
    /// Direction bit clear.
    Input,
    /// Output driven high.
    High,
    /// Output driven low.
    Low,
}

/// The I/O register bank plus the serial transmit buffer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoSpace {
    regs: Vec<u8>,
    serial: Vec<u8>,
}

impl IoSpace {
    /// Create a zeroed I/O space with an empty serial buffer.
    pub fn new() -> Self {
        Self {
            regs: vec![0; IO_SIZE],
            serial: Vec::new(),
        }
    }

    /// Read an I/O register.
    ///
    /// # Panics
    /// Panics if `port` is not a 6-bit address.
    #[inline]
    pub fn read(&self, port: u8) -> u8 {
        assert!(usize::from(port) < IO_SIZE, "I/O port {:#04X} out of range", port);
        self.regs[usize::from(port)]
    }

    /// Write an I/O register, firing any side effect bound to `port`.
    ///
    /// # Panics
    /// Panics if `port` is not a 6-bit address.
    pub fn write(&mut self, port: u8, value: u8) {
        assert!(usize::from(port) < IO_SIZE, "I/O port {:#04X} out of range", port);
        self.regs[usize::from(port)] = value;

        if port == UDR {
            log::debug!("UART tx {:#04X} {:?}", value, char::from(value));
            self.serial.push(value);
        }
    }

    /// All 64 registers.
    pub fn as_slice(&self) -> &[u8] {
        &self.regs
    }

    /// Bytes transmitted through the UART so far.
    pub fn serial_output(&self) -> &[u8] {
        &self.serial
    }

    /// Serial output decoded as text, with invalid UTF-8 replaced.
    pub fn serial_text(&self) -> String {
        String::from_utf8_lossy(&self.serial).into_owned()
    }

    /// Digital pins D0..D7 (port D) followed by D8..D13 (port B0..B5).
    pub fn pin_states(&self) -> [PinState; DIGITAL_PINS] {
        pin_states(&self.regs)
    }
}

/// Decode pin levels from a raw I/O register dump such as [`Snapshot::io`].
///
/// Missing registers read as zero.
///
/// [`Snapshot::io`]: crate::cpu::Snapshot
pub fn pin_states(regs: &[u8]) -> [PinState; DIGITAL_PINS] {
    let reg = |port: u8| regs.get(usize::from(port)).copied().unwrap_or(0);
    let (ddrd, portd) = (reg(DDRD), reg(PORTD));
    let (ddrb, portb) = (reg(DDRB), reg(PORTB));

    let mut pins = [PinState::Input; DIGITAL_PINS];
    for (i, pin) in pins.iter_mut().enumerate() {
        let (ddr, port, bit) = if i < 8 { (ddrd, portd, i) } else { (ddrb, portb, i - 8) };
        *pin = match ((ddr >> bit) & 1, (port >> bit) & 1) {
            (0, _) => PinState::Input,
            (_, 1) => PinState::High,
            _ => PinState::Low,
        };
    }

    pins
}

impl Default for IoSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IoSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoSpace")
            .field("portb", &self.regs[usize::from(PORTB)])
            .field("portd", &self.regs[usize::from(PORTD)])
            .field("serial", &self.serial_text())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_back() {
        let mut io = IoSpace::new();
        io.write(PORTB, 0x20);
        assert_eq!(io.read(PORTB), 0x20);
        assert!(io.serial_output().is_empty());
    }

    #[test]
    fn test_uart_appends() {
        let mut io = IoSpace::new();
        io.write(UDR, b'H');
        io.write(UDR, b'i');
        assert_eq!(io.serial_output(), b"Hi");
        assert_eq!(io.serial_text(), "Hi");
        assert_eq!(io.read(UDR), b'i');
    }

    #[test]
    fn test_pin_states() {
        let mut io = IoSpace::new();
        io.write(DDRD, 0b0000_0011);
        io.write(PORTD, 0b0000_0001);
        io.write(DDRB, 0b0010_0000);
        io.write(PORTB, 0b0010_0000);

        let pins = io.pin_states();
        assert_eq!(pins[0], PinState::High);
        assert_eq!(pins[1], PinState::Low);
        assert_eq!(pins[2], PinState::Input);
        assert_eq!(pins[13], PinState::High);
        assert_eq!(pins[8], PinState::Input);
        assert_eq!(pin_states(io.as_slice()), pins);
    }

    #[test]
    fn test_pin_states_short_dump() {
        assert_eq!(pin_states(&[]), [PinState::Input; DIGITAL_PINS]);
    }

    #[test]
    #[should_panic]
    fn test_port_out_of_range() {
        let mut io = IoSpace::new();
        io.write(64, 0);
    }
}
