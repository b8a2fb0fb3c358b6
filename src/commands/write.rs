//! Write command implementation

use kicksmash_core::bus::BusDriver;
use kicksmash_core::hal::{AccessMask, Clock};
use kicksmash_core::{EraseMode, FlashController};
use std::path::Path;

use super::{check_range, spinner, word_bar};
use crate::board::read_words;
use crate::error::Result;

/// Words per write call
const WRITE_CHUNK_WORDS: usize = 0x400;

/// Run the write command
pub fn run_write<B: BusDriver, C: Clock, M: AccessMask>(
    flash: &mut FlashController<B, C, M>,
    addr: u32,
    input: &Path,
    erase_first: bool,
) -> Result<()> {
    let words = read_words(flash.mode(), input)?;
    let len = u32::try_from(words.len()).unwrap_or(u32::MAX);
    check_range(addr, len)?;

    if erase_first && !words.is_empty() {
        let pb = spinner(format!("Erasing sectors for {} words...", words.len()));
        let result = flash.erase(EraseMode::Sector, addr, len);
        pb.finish_and_clear();
        result?;
    }

    let pb = word_bar(words.len() as u64, "Writing");
    let mut start = addr;
    for chunk in words.chunks(WRITE_CHUNK_WORDS) {
        if let Err(e) = flash.write(start, chunk) {
            pb.abandon();
            return Err(e.into());
        }
        start += chunk.len() as u32;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    println!("Programmed {} words at 0x{:05x}", words.len(), addr);
    Ok(())
}
