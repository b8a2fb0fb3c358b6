//! Generated chip table and lookup

use super::ChipBlockInfo;

include!(concat!(env!("OUT_DIR"), "/chip_blocks_generated.rs"));

/// Find the erase geometry for a chip id
///
/// Never fails: an unknown id resolves to the last table entry, which
/// describes a generic bottom-boot part.
pub fn resolve_sector_map(chip_id: u32) -> &'static ChipBlockInfo {
    let known = CHIP_BLOCKS.len().saturating_sub(1);
    CHIP_BLOCKS[..known]
        .iter()
        .find(|info| info.chip_id == chip_id)
        .unwrap_or(WILDCARD_BLOCK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_parts() {
        assert_eq!(resolve_sector_map(0x0001_22D2).name, "M29F160FT");
        assert_eq!(resolve_sector_map(0x0001_22D2).boot_block_number, 31);
        assert_eq!(resolve_sector_map(0x00C2_2258).name, "MX29F800CB");
        assert_eq!(resolve_sector_map(0x0001_22D6).boot_sector_erase_map, 0x71);
    }

    #[test]
    fn test_unknown_falls_back() {
        let info = resolve_sector_map(0xdead_beef);
        assert!(core::ptr::eq(info, WILDCARD_BLOCK));
        assert!(core::ptr::eq(info, CHIP_BLOCKS.last().unwrap()));
        assert_eq!(info.boot_block_number, 0);
        assert_eq!(info.boot_sector_erase_map, 0x1d);
    }

    #[test]
    fn test_wildcard_id_never_matches() {
        // Zero is the wildcard's placeholder id; it still resolves to it
        let info = resolve_sector_map(0);
        assert!(core::ptr::eq(info, WILDCARD_BLOCK));
    }
}
