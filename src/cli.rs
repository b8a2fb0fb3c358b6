//! CLI argument parsing

use clap::{Parser, Subcommand};
use kicksmash_core::BusWidthMode;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a bus width mode name
fn parse_mode(s: &str) -> Result<BusWidthMode, String> {
    BusWidthMode::from_name(s).ok_or_else(|| format!("Unknown mode '{}' (use 32, 16-low or 16-high)", s))
}

#[derive(Parser)]
#[command(name = "kicksmash")]
#[command(author, version, about = "Kicksmash NOR flash controller (simulated board)", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Board description (TOML); defaults to a revision 2 board with one M29F160FB
    #[arg(short, long, global = true)]
    pub board: Option<PathBuf>,

    /// Bus width mode [32, 16-low, 16-high], overrides the board file
    #[arg(short, long, global = true, value_parser = parse_mode)]
    pub mode: Option<BusWidthMode>,

    /// Preload the flash contents from a ROM image before the command
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    /// Save the flash contents to a ROM image after the command
    #[arg(long, global = true)]
    pub save: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the flash chip(s)
    Id,

    /// Read flash contents
    Read {
        /// Start word address (hex, e.g., 0x10000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,

        /// Number of words to read
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0x100")]
        len: u32,

        /// Output file; hex dump to stdout if not given
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Program a file into erased flash
    Write {
        /// Start word address (hex, e.g., 0x10000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,

        /// Input file (big-endian words)
        #[arg(short, long)]
        input: PathBuf,

        /// Erase the covered sectors first
        #[arg(long)]
        erase: bool,
    },

    /// Erase the chip or the sectors covering a range
    Erase {
        /// Erase the whole chip
        #[arg(long, conflicts_with_all = ["addr", "len"])]
        chip: bool,

        /// Start word address (hex, e.g., 0x10000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,

        /// Number of words; 0 erases the one sector at the address
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        len: u32,
    },

    /// Show the status of the last program/erase
    Status {
        /// Clear the status and reset the chip to read mode
        #[arg(long)]
        clear: bool,
    },

    /// Check every socket line with the pull resistors
    Selftest {
        /// Stop after pulling up this many lines
        #[arg(long)]
        lines: Option<u32>,
    },

    /// Show the erase sectors of the identified chip
    Sectors {
        /// Use this chip id instead of identifying the chip (hex)
        #[arg(long, value_parser = parse_hex_u32)]
        chip_id: Option<u32>,
    },

    /// Print the addresses the host system fetches
    Snoop {
        /// Number of stop checks (idle flushes or long fetch runs) to run for
        #[arg(long, default_value = "4")]
        checks: u32,
    },

    /// List known chips
    Chips,
}
