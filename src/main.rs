//! kicksmash - Kicksmash NOR flash controller
//!
//! Drives the parallel NOR flash bus controller from `kicksmash-core`
//! against a simulated Kicksmash board. The board (wiring, fitted chips,
//! injected faults, host system) comes from a TOML board file; the flash
//! contents can be preloaded from and saved to ROM images around each
//! command, so the tool doubles as an offline image editor:
//!
//! ```text
//! kicksmash --image kick.rom --save kick.rom write --erase -a 0x40000 -i ext.bin
//! ```

mod board;
mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use kicksmash_core::EraseMode;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Commands::Chips = cli.command {
        commands::list_chips();
        return Ok(());
    }

    let mut board = board::open_board(&cli)?;
    if let Some(path) = &cli.image {
        board::preload(&mut board, path)?;
    }

    let flash = board.flash();
    let result = match &cli.command {
        Commands::Id => {
            commands::run_id(flash);
            Ok(())
        }
        Commands::Read { addr, len, output } => {
            commands::run_read(flash, *addr, *len, output.as_deref())
        }
        Commands::Write { addr, input, erase } => commands::run_write(flash, *addr, input, *erase),
        Commands::Erase { chip, addr, len } => {
            let mode = if *chip {
                EraseMode::Chip
            } else {
                EraseMode::Sector
            };
            commands::run_erase(flash, mode, *addr, *len)
        }
        Commands::Status { clear } => {
            commands::run_status(flash, *clear);
            Ok(())
        }
        Commands::Selftest { lines } => {
            commands::run_selftest(flash, cli.verbose > 0, *lines)
        }
        Commands::Sectors { chip_id } => {
            commands::run_sectors(flash, *chip_id);
            Ok(())
        }
        Commands::Snoop { checks } => commands::run_snoop(flash, *checks),
        Commands::Chips => Ok(()),
    };
    flash.disable();

    // Save even after a failed command so the damage can be inspected
    if let Some(path) = &cli.save {
        board::save(&board, path)?;
    }

    if let Err(e) = result {
        let status = board.flash_ref().status();
        if !status.is_normal() {
            log::warn!("Device status: {}", status);
        }
        return Err(e.into());
    }
    Ok(())
}
