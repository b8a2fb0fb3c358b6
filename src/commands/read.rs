//! Read command implementation

use kicksmash_core::bus::BusDriver;
use kicksmash_core::hal::{AccessMask, Clock};
use kicksmash_core::FlashController;
use std::fs;
use std::path::Path;

use super::{check_range, word_bar};
use crate::board::bytes_from_words;
use crate::error::{CliError, Result};

/// Words per read call
const READ_CHUNK_WORDS: u32 = 0x1000;

/// Words per hex dump line
const DUMP_WORDS_PER_LINE: usize = 8;

/// Run the read command
pub fn run_read<B: BusDriver, C: Clock, M: AccessMask>(
    flash: &mut FlashController<B, C, M>,
    addr: u32,
    len: u32,
    output: Option<&Path>,
) -> Result<()> {
    check_range(addr, len)?;
    let mut words = vec![0u32; len as usize];

    let pb = word_bar(u64::from(len), "Reading");
    for (index, chunk) in words.chunks_mut(READ_CHUNK_WORDS as usize).enumerate() {
        let start = addr.saturating_add(index as u32 * READ_CHUNK_WORDS);
        flash.read(start, chunk)?;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    match output {
        Some(path) => {
            let bytes = bytes_from_words(flash.mode(), &words);
            fs::write(path, &bytes).map_err(CliError::file(path))?;
            println!("Wrote {} words to {}", words.len(), path.display());
        }
        None => {
            let digits = flash.mode().word_bytes() * 2;
            for (line, chunk) in words.chunks(DUMP_WORDS_PER_LINE).enumerate() {
                print!("{:05x}:", addr as usize + line * DUMP_WORDS_PER_LINE);
                for word in chunk {
                    print!(" {:0width$x}", word, width = digits);
                }
                println!();
            }
        }
    }
    Ok(())
}
