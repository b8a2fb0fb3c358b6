//! Mapping of logical bus lines onto MCU GPIO pins
//!
//! Different board revisions route the socket lines to different ports. A
//! [`PinMap`] is chosen once at startup (a preset or a board file) and the
//! GPIO bus driver permutes bits through it, so nothing above the driver
//! knows which revision it runs on.

use core::fmt;
use core::str::FromStr;

/// Number of address lines on the socket (A0-A19)
pub const ADDRESS_LINES: usize = 20;

/// Number of data lines on the socket (D0-D31)
pub const DATA_LINES: usize = 32;

/// Number of GPIO ports on the MCU
pub const PORT_COUNT: usize = 5;

/// GPIO port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum Port {
    /// GPIOA
    A,
    /// GPIOB
    B,
    /// GPIOC
    C,
    /// GPIOD
    D,
    /// GPIOE
    E,
}

impl Port {
    /// All ports in index order
    pub const ALL: [Port; PORT_COUNT] = [Port::A, Port::B, Port::C, Port::D, Port::E];

    /// Index into per-port arrays
    pub const fn index(self) -> usize {
        self as usize
    }

    fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Port::A),
            'B' => Some(Port::B),
            'C' => Some(Port::C),
            'D' => Some(Port::D),
            'E' => Some(Port::E),
            _ => None,
        }
    }

    fn letter(self) -> char {
        (b'A' + self as u8) as char
    }
}

/// A single GPIO pin, written `PC12` in board files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "std::string::String", into = "std::string::String")
)]
pub struct Pin {
    /// Port the pin belongs to
    pub port: Port,
    /// Pin number within the port (0-15)
    pub pin: u8,
}

impl Pin {
    /// Create a pin
    pub const fn new(port: Port, pin: u8) -> Self {
        Self { port, pin }
    }

    /// Bit mask of this pin within its port
    pub const fn mask(self) -> u16 {
        1 << self.pin
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.port.letter(), self.pin)
    }
}

impl FromStr for Pin {
    type Err = PinMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        if !matches!(chars.next(), Some('P' | 'p')) {
            return Err(PinMapError::BadPinName);
        }
        let port = chars
            .next()
            .and_then(Port::from_letter)
            .ok_or(PinMapError::BadPinName)?;
        let pin: u8 = chars
            .as_str()
            .parse()
            .map_err(|_| PinMapError::BadPinName)?;
        if pin > 15 {
            return Err(PinMapError::BadPinName);
        }
        Ok(Pin::new(port, pin))
    }
}

#[cfg(feature = "std")]
impl TryFrom<std::string::String> for Pin {
    type Error = PinMapError;

    fn try_from(s: std::string::String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(feature = "std")]
impl From<Pin> for std::string::String {
    fn from(pin: Pin) -> Self {
        use std::string::ToString;
        pin.to_string()
    }
}

/// Pin map validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMapError {
    /// Pin name is not of the form `P<port><0-15>`
    BadPinName,
    /// The same pin is assigned to two signals
    DuplicatePin(Pin),
}

impl fmt::Display for PinMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPinName => write!(f, "pin names look like PA0..PE15"),
            Self::DuplicatePin(pin) => write!(f, "pin {} is assigned twice", pin),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PinMapError {}

/// Assignment of every socket signal to a GPIO pin
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct PinMap {
    /// A0-A19
    pub address: [Pin; ADDRESS_LINES],
    /// D0-D31
    pub data: [Pin; DATA_LINES],
    /// Flash WE#
    pub write_enable: Pin,
    /// Flash OE#
    pub output_enable: Pin,
    /// OE# as driven by the host system on the ROM socket
    pub socket_output_enable: Pin,
}

fn run<const N: usize>(spans: &[(Port, u8, u8)]) -> [Pin; N] {
    let mut pins = [Pin::new(Port::A, 0); N];
    let mut line = 0;
    for &(port, first, count) in spans {
        for pin in first..first + count {
            pins[line] = Pin::new(port, pin);
            line += 1;
        }
    }
    debug_assert_eq!(line, N, "pin spans do not cover every line");
    pins
}

impl PinMap {
    /// Board revision 1 wiring
    ///
    /// A0-A15 on PE0-15, A16-A19 on PC6-9, D0-D15 on PD0-15, D16-D23 on
    /// PA0-7, D24-D27 on PC0-3, D28 on PC10, D29 on PB5, D30-D31 on PB8-9.
    pub fn board_rev1() -> Self {
        Self {
            address: run(&[(Port::E, 0, 16), (Port::C, 6, 4)]),
            data: run(&[
                (Port::D, 0, 16),
                (Port::A, 0, 8),
                (Port::C, 0, 4),
                (Port::C, 10, 1),
                (Port::B, 5, 1),
                (Port::B, 8, 2),
            ]),
            write_enable: Pin::new(Port::B, 6),
            output_enable: Pin::new(Port::B, 7),
            socket_output_enable: Pin::new(Port::B, 0),
        }
    }

    /// Board revision 2 (and later) wiring
    ///
    /// A0-A12 on PC0-12, A13-A19 on PA1-7, D0-D15 on PD0-15, D16-D31 on
    /// PE0-15.
    pub fn board_rev2() -> Self {
        Self {
            address: run(&[(Port::C, 0, 13), (Port::A, 1, 7)]),
            data: run(&[(Port::D, 0, 16), (Port::E, 0, 16)]),
            write_enable: Pin::new(Port::B, 6),
            output_enable: Pin::new(Port::B, 7),
            socket_output_enable: Pin::new(Port::B, 0),
        }
    }

    /// Preset for a board revision number
    pub fn for_revision(rev: u8) -> Self {
        if rev <= 1 {
            Self::board_rev1()
        } else {
            Self::board_rev2()
        }
    }

    /// Every pin with the signal it carries, in a fixed order
    pub fn signals(&self) -> impl Iterator<Item = (Signal, Pin)> + '_ {
        let address = self
            .address
            .iter()
            .enumerate()
            .map(|(n, &pin)| (Signal::Address(n as u8), pin));
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(n, &pin)| (Signal::Data(n as u8), pin));
        address.chain(data).chain([
            (Signal::WriteEnable, self.write_enable),
            (Signal::OutputEnable, self.output_enable),
            (Signal::SocketOutputEnable, self.socket_output_enable),
        ])
    }

    /// Check that no pin carries two signals
    pub fn validate(&self) -> Result<(), PinMapError> {
        let mut used = [0u16; PORT_COUNT];
        for (_, pin) in self.signals() {
            let slot = &mut used[pin.port.index()];
            if *slot & pin.mask() != 0 {
                return Err(PinMapError::DuplicatePin(pin));
            }
            *slot |= pin.mask();
        }
        Ok(())
    }

    /// Signal carried by a pin, if any
    pub fn signal_at(&self, port: Port, pin: u8) -> Option<Signal> {
        let target = Pin::new(port, pin);
        self.signals()
            .find(|&(_, p)| p == target)
            .map(|(signal, _)| signal)
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self::board_rev2()
    }
}

/// A logical socket signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Address line A<n>
    Address(u8),
    /// Data line D<n>
    Data(u8),
    /// Flash WE#
    WriteEnable,
    /// Flash OE#
    OutputEnable,
    /// Host OE# on the socket
    SocketOutputEnable,
}
