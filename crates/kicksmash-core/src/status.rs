//! Sticky device status
//!
//! The outcome of the most recent program or erase poll is kept by the
//! controller until the next successful poll or an explicit clear.

use core::fmt;

/// Outcome of the most recent program/erase operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceStatus {
    /// Last operation completed (or nothing has run yet)
    #[default]
    Normal,
    /// Erase did not complete within its time budget
    EraseTimeout,
    /// Program did not complete within its time budget
    ProgramTimeout,
    /// Device reported an erase failure (DQ5)
    EraseFailure,
    /// Device reported a program failure (DQ5)
    ProgramFailure,
}

impl DeviceStatus {
    /// Wire code reported to the host
    pub const fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::EraseTimeout => 1,
            Self::ProgramTimeout => 2,
            Self::EraseFailure => 3,
            Self::ProgramFailure => 4,
        }
    }

    /// Decode a wire code
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::EraseTimeout),
            2 => Some(Self::ProgramTimeout),
            3 => Some(Self::EraseFailure),
            4 => Some(Self::ProgramFailure),
            _ => None,
        }
    }

    /// Human readable name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::EraseTimeout => "Erase Timeout",
            Self::ProgramTimeout => "Program Timeout",
            Self::EraseFailure => "Erase Failure",
            Self::ProgramFailure => "Program Failure",
        }
    }

    /// Whether this is the idle/success state
    pub const fn is_normal(self) -> bool {
        matches!(self, Self::Normal)
    }
}

/// Render a raw status code, including codes this firmware does not know
pub fn describe_code(code: u8) -> &'static str {
    match DeviceStatus::from_code(code) {
        Some(status) => status.as_str(),
        None => "Unknown",
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
