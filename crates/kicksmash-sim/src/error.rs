//! Error types for building a simulated board

use std::path::PathBuf;

use kicksmash_core::bus::PinMapError;
use thiserror::Error;

/// Board setup errors
#[derive(Debug, Error)]
pub enum SimError {
    /// Board file could not be read
    #[error("Failed to read board file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Board file is not valid TOML or has unknown keys
    #[error("Invalid board file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Pin map assigns a pin twice
    #[error("Invalid pin map: {0}")]
    PinMap(#[from] PinMapError),

    /// Fault names a signal that does not exist
    #[error("Unknown signal '{0}' (use A0-A19, D0-D31, WE, OE or SOE)")]
    UnknownSignal(String),

    /// Mode addresses a half of the bus with no chip
    #[error("Bus mode {mode} needs a chip in the {slot} slot")]
    MissingChip { mode: String, slot: &'static str },
}

/// Result type for simulator setup
pub type Result<T> = std::result::Result<T, SimError>;
