//! Identify command implementation

use kicksmash_core::bus::BusDriver;
use kicksmash_core::hal::{AccessMask, Clock};
use kicksmash_core::{BusWidthMode, FlashController};

/// Run the id command
pub fn run_id<B: BusDriver, C: Clock, M: AccessMask>(flash: &mut FlashController<B, C, M>) {
    let id = flash.identify();
    let info = id.block_info();

    println!(
        "Found: {} (manufacturer {:04x}, device {:04x})",
        info.name,
        id.manufacturer(),
        id.device()
    );
    if flash.mode() == BusWidthMode::Mode32 {
        let other = kicksmash_core::chip::resolve_sector_map(id.part2);
        println!("Upper half: {:08x} ({})", id.part2, other.name);
    }
    println!(
        "Geometry: {}K-word blocks, boot block {} in {}K-word units (map 0x{:02x})",
        info.common_block_size_kwords,
        info.boot_block_number,
        info.boot_sector_size_kwords,
        info.boot_sector_erase_map
    );
}
