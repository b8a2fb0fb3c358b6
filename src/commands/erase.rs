//! Erase command implementation

use kicksmash_core::bus::BusDriver;
use kicksmash_core::hal::{AccessMask, Clock};
use kicksmash_core::{EraseMode, FlashController};

use super::spinner;
use crate::error::Result;

/// Run the erase command
pub fn run_erase<B: BusDriver, C: Clock, M: AccessMask>(
    flash: &mut FlashController<B, C, M>,
    mode: EraseMode,
    addr: u32,
    len: u32,
) -> Result<()> {
    let message = match mode {
        EraseMode::Chip => "Erasing chip...".to_string(),
        EraseMode::Sector if len == 0 => format!("Erasing sector at 0x{:05x}...", addr),
        EraseMode::Sector => format!("Erasing sectors 0x{:05x}+0x{:x}...", addr, len),
    };
    let pb = spinner(message);
    let result = flash.erase(mode, addr, len);
    pb.finish_and_clear();
    result?;

    println!("Erase complete");
    Ok(())
}
