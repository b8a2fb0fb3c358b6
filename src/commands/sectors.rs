//! Sector map command implementation

use kicksmash_core::bus::BusDriver;
use kicksmash_core::chip::resolve_sector_map;
use kicksmash_core::hal::{AccessMask, Clock};
use kicksmash_core::{FlashController, DEVICE_WORDS};

/// Run the sectors command
pub fn run_sectors<B: BusDriver, C: Clock, M: AccessMask>(
    flash: &mut FlashController<B, C, M>,
    chip_id: Option<u32>,
) {
    let chip_id = chip_id.unwrap_or_else(|| flash.identify().part1);
    let info = resolve_sector_map(chip_id);

    println!("{} ({:08x})", info.name, chip_id);
    println!("{:>7} {:>7} {:>6}", "Start", "End", "Words");
    println!("{}", "-".repeat(22));
    for sector in info.sectors(0, DEVICE_WORDS) {
        let marker = if info.in_boot_block(sector.start) {
            " boot"
        } else {
            ""
        };
        println!(
            "{:07x} {:07x} {:>5}K{}",
            sector.start,
            sector.end() - 1,
            sector.words >> 10,
            marker
        );
    }
}
