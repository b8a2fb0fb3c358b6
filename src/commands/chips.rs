//! Chip list command implementation

use kicksmash_core::chip::{CHIP_BLOCKS, WILDCARD_BLOCK};

/// List all known chips
pub fn list_chips() {
    println!("Known flash chips:");
    println!();
    println!(
        "{:<24} {:>10} {:>10} {:>8}",
        "Name", "Chip ID", "Boot block", "Map"
    );
    println!("{}", "-".repeat(56));

    for info in CHIP_BLOCKS {
        let id = if core::ptr::eq(info, WILDCARD_BLOCK) {
            "*".to_string()
        } else {
            format!("{:08X}", info.chip_id)
        };
        println!(
            "{:<24} {:>10} {:>10} {:>#8x}",
            info.name, id, info.boot_block_number, info.boot_sector_erase_map
        );
    }
}
