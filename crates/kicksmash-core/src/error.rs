//! Error types for kicksmash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. Every variant is produced only after the device has
//! been returned to read mode, so callers can always issue a fresh operation.

use core::fmt;

use crate::status::DeviceStatus;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Address range extends beyond the device; nothing was sent to the bus
    BadRange {
        /// First word address of the request
        addr: u32,
        /// Number of words requested
        len: u32,
    },
    /// Device kept reporting a program failure or timeout after all retries
    ProgramFailed {
        /// Word address being programmed
        addr: u32,
        /// Poll outcome of the last attempt
        status: DeviceStatus,
    },
    /// Read-back after programming did not match the intended value
    ProgramMismatch {
        /// Word address being programmed
        addr: u32,
        /// Value that was programmed (masked to the active width)
        expected: u32,
        /// Value read back (masked to the active width)
        found: u32,
    },
    /// Device reported an erase failure
    EraseFailure {
        /// Start address of the erase request
        addr: u32,
    },
    /// Erase did not complete in time
    EraseTimeout {
        /// Start address of the erase request
        addr: u32,
    },
}

impl Error {
    /// Sticky device status corresponding to this error, if any
    pub fn device_status(&self) -> Option<DeviceStatus> {
        match self {
            Self::BadRange { .. } | Self::ProgramMismatch { .. } => None,
            Self::ProgramFailed { status, .. } => Some(*status),
            Self::EraseFailure { .. } => Some(DeviceStatus::EraseFailure),
            Self::EraseTimeout { .. } => Some(DeviceStatus::EraseTimeout),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRange { addr, len } => write!(
                f,
                "range 0x{:05x}+0x{:x} is outside the device",
                addr, len
            ),
            // Byte addresses match what the host tools show
            Self::ProgramFailed { addr, status } => {
                write!(f, "program failed at 0x{:x}: {}", addr << 1, status)
            }
            Self::ProgramMismatch {
                addr,
                expected,
                found,
            } => write!(
                f,
                "program mismatch at 0x{:x}: wrote {:08x}, read {:08x}",
                addr << 1,
                expected,
                found
            ),
            Self::EraseFailure { addr } => write!(f, "erase failure at 0x{:05x}", addr),
            Self::EraseTimeout { addr } => write!(f, "erase timeout at 0x{:05x}", addr),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
