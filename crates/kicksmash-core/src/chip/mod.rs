//! Chip erase geometry
//!
//! Parts in this family have uniform 32K-word blocks except for one boot
//! block (first or last) that is split into smaller sectors. The split is
//! described by a bitmask over 4K-word units: bit `n` set means a sector
//! starts at unit `n`.

mod id;
mod table;

pub use id::DeviceId;
pub use table::{resolve_sector_map, CHIP_BLOCKS, WILDCARD_BLOCK};

/// Erase geometry of one chip family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct ChipBlockInfo {
    /// Part name
    pub name: &'static str,
    /// Manufacturer code (upper half) and device code (lower half)
    pub chip_id: u32,
    /// Index of the boot block (0 = bottom boot)
    pub boot_block_number: u8,
    /// Size of an ordinary block in 1K words
    pub common_block_size_kwords: u8,
    /// Size of one boot-sector unit in 1K words
    pub boot_sector_size_kwords: u8,
    /// Bit `n` set: a boot sector starts at unit `n`
    pub boot_sector_erase_map: u8,
}

/// An erasable region, in word addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sector {
    /// First word of the sector
    pub start: u32,
    /// Length in words
    pub words: u32,
}

impl Sector {
    /// First word after the sector
    pub const fn end(&self) -> u32 {
        self.start + self.words
    }

    /// Whether the sector contains `addr`
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr < self.end()
    }
}

/// The boot block map walks at most this many units
const MAX_BOOT_UNITS: u32 = 8;

impl ChipBlockInfo {
    /// Ordinary block size in words
    pub const fn block_words(&self) -> u32 {
        (self.common_block_size_kwords as u32) << 10
    }

    /// Boot-sector unit size in words
    pub const fn boot_unit_words(&self) -> u32 {
        (self.boot_sector_size_kwords as u32) << 10
    }

    /// First word of the boot block
    pub const fn boot_block_start(&self) -> u32 {
        self.boot_block_number as u32 * self.block_words()
    }

    /// Whether `addr` lies in the boot block
    pub const fn in_boot_block(&self, addr: u32) -> bool {
        addr / self.block_words() == self.boot_block_number as u32
    }

    /// The sector containing `addr`
    pub fn sector_at(&self, addr: u32) -> Sector {
        let block = self.block_words();
        let block_start = addr - addr % block;
        if !self.in_boot_block(addr) {
            return Sector {
                start: block_start,
                words: block,
            };
        }

        let unit = self.boot_unit_words();
        let units = (block / unit).min(MAX_BOOT_UNITS);
        let map = u32::from(self.boot_sector_erase_map) | 1;
        let here = (addr - block_start) / unit;

        // Nearest boundary at or below
        let mut first = here;
        while map & (1 << first) == 0 {
            first -= 1;
        }

        let mut next = first + 1;
        while next < units && map & (1 << next) == 0 {
            next += 1;
        }

        Sector {
            start: block_start + first * unit,
            words: (next - first) * unit,
        }
    }

    /// Size in words of the sector containing `addr`
    pub fn sector_size_at(&self, addr: u32) -> u32 {
        self.sector_at(addr).words
    }

    /// Every sector from `start` up to `end`, starting with the one that
    /// contains `start`
    pub fn sectors(&self, start: u32, end: u32) -> Sectors<'_> {
        Sectors {
            info: self,
            next: start,
            end,
        }
    }
}

/// Iterator over consecutive sectors, see [`ChipBlockInfo::sectors`]
#[derive(Debug, Clone)]
pub struct Sectors<'a> {
    info: &'a ChipBlockInfo,
    next: u32,
    end: u32,
}

impl Iterator for Sectors<'_> {
    type Item = Sector;

    fn next(&mut self) -> Option<Sector> {
        if self.next >= self.end {
            return None;
        }
        let sector = self.info.sector_at(self.next);
        self.next = sector.end();
        Some(sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bottom_boot() -> ChipBlockInfo {
        ChipBlockInfo {
            name: "test",
            chip_id: 0,
            boot_block_number: 0,
            common_block_size_kwords: 32,
            boot_sector_size_kwords: 4,
            boot_sector_erase_map: 0x1d,
        }
    }

    fn top_boot() -> ChipBlockInfo {
        ChipBlockInfo {
            boot_block_number: 31,
            boot_sector_erase_map: 0x71,
            ..bottom_boot()
        }
    }

    #[test]
    fn test_bottom_boot_layout() {
        let info = bottom_boot();
        let sectors: std::vec::Vec<_> = info.sectors(0, 0x8001).collect();
        assert_eq!(
            sectors,
            [
                Sector { start: 0x0000, words: 0x2000 },
                Sector { start: 0x2000, words: 0x1000 },
                Sector { start: 0x3000, words: 0x1000 },
                Sector { start: 0x4000, words: 0x4000 },
                Sector { start: 0x8000, words: 0x8000 },
            ]
        );
    }

    #[test]
    fn test_top_boot_layout() {
        let info = top_boot();
        let base = 31 * 0x8000;
        let sizes: std::vec::Vec<_> = info
            .sectors(base, base + 0x8000)
            .map(|s| s.words)
            .collect();
        assert_eq!(sizes, [0x4000, 0x1000, 0x1000, 0x2000]);
        assert_eq!(info.sector_size_at(base - 1), 0x8000);
    }

    #[test]
    fn test_sector_start_from_inner_address() {
        let info = bottom_boot();
        // Second unit of the leading 8K sector
        assert_eq!(info.sector_at(0x1234), Sector { start: 0, words: 0x2000 });
        // Last unit of the 16K sector
        assert_eq!(info.sector_at(0x7fff), Sector { start: 0x4000, words: 0x4000 });
        assert_eq!(info.sector_size_at(0x3000), 0x1000);
    }

    #[test]
    fn test_common_blocks() {
        let info = bottom_boot();
        assert_eq!(info.sector_at(0x1_2345), Sector { start: 0x1_0000, words: 0x8000 });
        assert!(!info.in_boot_block(0x8000));
        assert_eq!(top_boot().boot_block_start(), 0xf_8000);
    }
}
