//! CLI error types

use std::path::PathBuf;

use kicksmash_sim::SimError;
use thiserror::Error;

/// Errors reported by the command line tool
#[derive(Debug, Error)]
pub enum CliError {
    /// Board could not be set up
    #[error(transparent)]
    Board(#[from] SimError),

    /// Flash operation failed
    #[error("Flash operation failed: {0}")]
    Flash(#[from] kicksmash_core::Error),

    /// File could not be read or written
    #[error("Failed to access '{}': {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File length is not a whole number of words
    #[error("'{}' is {len} bytes, not a multiple of {word_bytes}", .path.display())]
    PartialWord {
        path: PathBuf,
        len: usize,
        word_bytes: usize,
    },

    /// Console output failed
    #[error("Failed to write output")]
    Output(#[from] std::fmt::Error),

    /// Connectivity check found faults
    #[error("Self-test found {0} fault(s)")]
    SelfTest(usize),
}

/// Result type for CLI commands
pub type Result<T> = std::result::Result<T, CliError>;

impl CliError {
    /// Wrap an I/O error with the path it concerns
    pub fn file(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::File {
            path: path.to_path_buf(),
            source,
        }
    }
}
