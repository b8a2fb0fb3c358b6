//! Logical word framing onto the physical flash device(s)
//!
//! The socket has 32 data lines. Either two 16-bit devices are stacked to
//! form one 32-bit word, or a single 16-bit device sits on the low or the
//! high half of the bus.

/// Which half (or all) of the 32-bit bus carries the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum BusWidthMode {
    /// Two devices, D0-D15 and D16-D31
    #[cfg_attr(feature = "std", serde(rename = "32"))]
    Mode32,
    /// One device on D0-D15
    #[default]
    #[cfg_attr(feature = "std", serde(rename = "16-low"))]
    Mode16Low,
    /// One device on D16-D31
    #[cfg_attr(feature = "std", serde(rename = "16-high"))]
    Mode16High,
}

impl BusWidthMode {
    /// Mask applied to every command and data word in this mode
    pub const fn mask(self) -> u32 {
        match self {
            Self::Mode32 => 0xffff_ffff,
            Self::Mode16Low => 0x0000_ffff,
            Self::Mode16High => 0xffff_0000,
        }
    }

    /// Number of bytes a host-side word occupies
    pub const fn word_bytes(self) -> usize {
        match self {
            Self::Mode32 => 4,
            Self::Mode16Low | Self::Mode16High => 2,
        }
    }

    /// Range of data lines the device(s) are wired to
    pub const fn data_lines(self) -> core::ops::Range<u8> {
        match self {
            Self::Mode32 => 0..32,
            Self::Mode16Low => 0..16,
            Self::Mode16High => 16..32,
        }
    }

    /// Replicate a 16-bit command into the upper half where the mode needs it
    ///
    /// Commands are usually given as `0x00aa00aa`-style values already; a
    /// bare `0xf0` is widened to `0x00f000f0` in the 32-bit and 16-bit-high
    /// modes so the device on the upper half sees it too.
    pub const fn widen_command(self, cmd: u32) -> u32 {
        match self {
            Self::Mode32 | Self::Mode16High if cmd >> 16 == 0 => cmd | (cmd << 16),
            _ => cmd,
        }
    }

    /// Position a host word on the bus
    pub const fn to_bus(self, word: u32) -> u32 {
        match self {
            Self::Mode32 => word,
            Self::Mode16Low => word & 0xffff,
            Self::Mode16High => (word & 0xffff) << 16,
        }
    }

    /// Extract the host word from a bus sample
    pub const fn from_bus(self, value: u32) -> u32 {
        match self {
            Self::Mode32 => value,
            Self::Mode16Low => value & 0xffff,
            Self::Mode16High => value >> 16,
        }
    }

    /// Parse a mode name as used on the command line and in board files
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "32" => Some(Self::Mode32),
            "16-low" | "16" | "low" => Some(Self::Mode16Low),
            "16-high" | "high" => Some(Self::Mode16High),
            _ => None,
        }
    }
}

impl core::fmt::Display for BusWidthMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Mode32 => "32-bit",
            Self::Mode16Low => "16-bit low",
            Self::Mode16High => "16-bit high",
        };
        f.write_str(name)
    }
}
