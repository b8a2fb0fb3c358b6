//! CLI command implementations
//!
//! Every command works on a [`FlashController`](kicksmash_core::FlashController)
//! of any bus, clock and mask; `main` hands them the simulated board's.

mod chips;
mod erase;
mod id;
mod read;
mod sectors;
mod selftest;
mod snoop;
mod status;
mod write;

pub use chips::list_chips;
pub use erase::run_erase;
pub use id::run_id;
pub use read::run_read;
pub use sectors::run_sectors;
pub use selftest::run_selftest;
pub use snoop::run_snoop;
pub use status::run_status;
pub use write::run_write;

use indicatif::{ProgressBar, ProgressStyle};
use kicksmash_core::{Error, DEVICE_WORDS};
use std::time::Duration;

/// Reject a range before any chunk of it reaches the bus
fn check_range(addr: u32, len: u32) -> Result<(), Error> {
    match addr.checked_add(len) {
        Some(end) if end <= DEVICE_WORDS => Ok(()),
        _ => Err(Error::BadRange { addr, len }),
    }
}

/// Progress bar counting words
fn word_bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} words ({{eta}}) {}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Spinner for operations without intermediate progress
fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
