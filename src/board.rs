//! Opening the simulated board and moving ROM images in and out of it

use std::fs;
use std::path::Path;

use kicksmash_core::{BusWidthMode, DEVICE_WORDS};
use kicksmash_sim::{BoardConfig, ChipSlot, SimBoard};

use crate::cli::Cli;
use crate::error::{CliError, Result};

/// Build the board from the command line options
pub fn open_board(cli: &Cli) -> Result<SimBoard> {
    let mut config = match &cli.board {
        Some(path) => BoardConfig::load(path)?,
        None => BoardConfig::default(),
    };
    if let Some(mode) = cli.mode {
        if mode != config.mode && cli.board.is_none() {
            config = BoardConfig::for_mode(mode);
        }
        config.mode = mode;
    }
    let board = SimBoard::new(&config)?;
    log::info!(
        "Simulated board: {} mode, chips low={} high={}",
        config.mode,
        describe_slot(config.chips.low),
        describe_slot(config.chips.high)
    );
    Ok(board)
}

fn describe_slot(id: Option<u32>) -> String {
    match id {
        Some(id) => format!("{:08x}", id),
        None => "empty".to_string(),
    }
}

/// Split a big-endian byte image into host words
pub fn words_from_bytes(mode: BusWidthMode, bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(mode.word_bytes())
        .map(|chunk| chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
        .collect()
}

/// Join host words into a big-endian byte image
pub fn bytes_from_words(mode: BusWidthMode, words: &[u32]) -> Vec<u8> {
    let width = mode.word_bytes();
    words
        .iter()
        .flat_map(|word| word.to_be_bytes()[4 - width..].to_vec())
        .collect()
}

/// Read a file of whole words
pub fn read_words(mode: BusWidthMode, path: &Path) -> Result<Vec<u32>> {
    let bytes = fs::read(path).map_err(CliError::file(path))?;
    if bytes.len() % mode.word_bytes() != 0 {
        return Err(CliError::PartialWord {
            path: path.to_path_buf(),
            len: bytes.len(),
            word_bytes: mode.word_bytes(),
        });
    }
    Ok(words_from_bytes(mode, &bytes))
}

/// Load an image straight into the chip arrays
///
/// Goes around the bus, so it is instant; use `write` to exercise the
/// program path.
pub fn preload(board: &mut SimBoard, path: &Path) -> Result<()> {
    let mode = board.flash_ref().mode();
    let words = read_words(mode, path)?;
    let count = words.len().min(DEVICE_WORDS as usize);
    for slot in ChipSlot::ALL {
        let shift = match (mode, slot) {
            (BusWidthMode::Mode32, ChipSlot::High) => 16,
            (BusWidthMode::Mode32 | BusWidthMode::Mode16Low, ChipSlot::Low)
            | (BusWidthMode::Mode16High, ChipSlot::High) => 0,
            _ => continue,
        };
        if let Some(chip) = board.chip_mut(slot) {
            for (cell, word) in chip.data_mut().iter_mut().zip(&words[..count]) {
                *cell = (word >> shift) as u16;
            }
        }
    }
    log::info!("Loaded {} words from {}", count, path.display());
    Ok(())
}

/// Save the chip arrays as an image
pub fn save(board: &SimBoard, path: &Path) -> Result<()> {
    let mode = board.flash_ref().mode();
    let low = board.chip(ChipSlot::Low).map(|chip| chip.data());
    let high = board.chip(ChipSlot::High).map(|chip| chip.data());
    let words: Vec<u32> = (0..DEVICE_WORDS as usize)
        .map(|i| {
            let low = low.map_or(0, |d| u32::from(d[i]));
            let high = high.map_or(0, |d| u32::from(d[i]));
            match mode {
                BusWidthMode::Mode32 => (high << 16) | low,
                BusWidthMode::Mode16Low => low,
                BusWidthMode::Mode16High => high,
            }
        })
        .collect();
    fs::write(path, bytes_from_words(mode, &words)).map_err(CliError::file(path))?;
    log::info!("Saved {} words to {}", words.len(), path.display());
    Ok(())
}
