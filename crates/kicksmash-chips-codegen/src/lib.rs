//! kicksmash-chips-codegen - Build-time code generator for the erase geometry table
//!
//! This crate parses the RON chip block definitions and generates Rust code
//! that is included in kicksmash-core at build time, so the table ends up as
//! an immutable `static` slice in flash rather than being parsed at runtime.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use serde::Deserialize;

use std::fs;
use std::io;
use std::path::Path;

/// Number of addressable words in the device (1M 16-bit words)
const DEVICE_WORDS: u32 = 1 << 20;

/// Boot sectors are tracked by an 8-bit erase map
const BOOT_SECTOR_UNITS: u32 = 8;

/// Error type for codegen operations
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Ron(ron::error::SpannedError),
    Validation(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ron::error::SpannedError> for Error {
    fn from(e: ron::error::SpannedError) -> Self {
        Error::Ron(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Ron(e) => write!(f, "RON parse error: {}", e),
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// One chip entry as written in `blocks.ron`
#[derive(Debug, Clone, Deserialize)]
pub struct ChipBlockDef {
    /// Part name, used for diagnostics only
    pub name: String,
    /// Manufacturer code (upper 16 bits) and device code (lower 16 bits)
    pub chip_id: u32,
    /// Index of the block holding the small boot sectors (0 = bottom boot)
    pub boot_block: u8,
    /// Size of every regular block in 1K words
    pub block_kwords: u8,
    /// Size of one boot sector unit in 1K words
    pub sector_kwords: u8,
    /// Bit n set = a boot sector starts at unit n
    pub erase_map: u8,
    /// Fallback entry, never matched by id
    #[serde(default)]
    pub wildcard: bool,
}

impl ChipBlockDef {
    fn validate(&self) -> Result<(), Error> {
        let block_words = u32::from(self.block_kwords) << 10;
        let sector_words = u32::from(self.sector_kwords) << 10;

        if block_words == 0 || !block_words.is_power_of_two() {
            return Err(Error::Validation(format!(
                "{}: block size {}K words is not a power of two",
                self.name, self.block_kwords
            )));
        }
        if sector_words == 0 || block_words % sector_words != 0 {
            return Err(Error::Validation(format!(
                "{}: boot sector size {}K words does not divide the block size",
                self.name, self.sector_kwords
            )));
        }
        if block_words / sector_words > BOOT_SECTOR_UNITS {
            return Err(Error::Validation(format!(
                "{}: boot block holds more than {} sector units",
                self.name, BOOT_SECTOR_UNITS
            )));
        }
        if self.erase_map & 1 == 0 {
            return Err(Error::Validation(format!(
                "{}: erase map 0x{:02x} does not start a sector at unit 0",
                self.name, self.erase_map
            )));
        }
        if u32::from(self.boot_block) >= DEVICE_WORDS / block_words {
            return Err(Error::Validation(format!(
                "{}: boot block {} is outside the device",
                self.name, self.boot_block
            )));
        }
        Ok(())
    }

    fn to_tokens(&self) -> TokenStream {
        let name = &self.name;
        let chip_id = syn::LitInt::new(&format!("0x{:08X}", self.chip_id), Span::call_site());
        let map = syn::LitInt::new(&format!("0x{:02x}", self.erase_map), Span::call_site());
        let boot_block = self.boot_block;
        let block_kwords = self.block_kwords;
        let sector_kwords = self.sector_kwords;

        quote! {
            ChipBlockInfo {
                name: #name,
                chip_id: #chip_id,
                boot_block_number: #boot_block,
                common_block_size_kwords: #block_kwords,
                boot_sector_size_kwords: #sector_kwords,
                boot_sector_erase_map: #map,
            }
        }
    }
}

/// The parsed chip table
#[derive(Debug, Clone)]
pub struct ChipTable {
    /// Entries in lookup order, wildcard last
    pub entries: Vec<ChipBlockDef>,
}

impl ChipTable {
    /// Parse a table from RON text
    pub fn from_ron(text: &str) -> Result<Self, Error> {
        let entries: Vec<ChipBlockDef> = ron::from_str(text)?;
        Ok(Self { entries })
    }

    /// Load a table from a RON file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Validate the table
    ///
    /// Exactly one wildcard entry is allowed and it must be the last one,
    /// so that a lookup always terminates on it. Chip ids must be unique.
    pub fn validate(&self) -> Result<(), Error> {
        let Some(last) = self.entries.last() else {
            return Err(Error::Validation("chip table is empty".into()));
        };
        if !last.wildcard {
            return Err(Error::Validation(format!(
                "last entry {} must be the wildcard",
                last.name
            )));
        }

        let known = &self.entries[..self.entries.len() - 1];
        for (i, entry) in known.iter().enumerate() {
            if entry.wildcard {
                return Err(Error::Validation(format!(
                    "{}: only the last entry may be a wildcard",
                    entry.name
                )));
            }
            if known[..i].iter().any(|e| e.chip_id == entry.chip_id) {
                return Err(Error::Validation(format!(
                    "{}: duplicate chip id 0x{:08X}",
                    entry.name, entry.chip_id
                )));
            }
        }

        for entry in &self.entries {
            entry.validate()?;
        }
        Ok(())
    }

    /// Generate Rust code for the table
    pub fn generate_code(&self) -> String {
        let entries: Vec<_> = self.entries.iter().map(|e| e.to_tokens()).collect();
        let count = entries.len();
        let wildcard = count.saturating_sub(1);

        let tokens = quote! {
            // Auto-generated by kicksmash-chips-codegen
            // Do not edit manually!

            static CHIP_BLOCK_ARRAY: [ChipBlockInfo; #count] = [
                #(#entries),*
            ];

            /// Erase geometry of every supported chip
            ///
            /// Generated from chips/blocks.ron. The last entry is the
            /// wildcard default.
            pub static CHIP_BLOCKS: &[ChipBlockInfo] = &CHIP_BLOCK_ARRAY;

            /// Geometry used for chip ids not in the table
            pub static WILDCARD_BLOCK: &ChipBlockInfo = &CHIP_BLOCK_ARRAY[#wildcard];
        };

        let syntax_tree = syn::parse2(tokens).expect("Failed to parse generated code");
        prettyplease::unparse(&syntax_tree)
    }
}

/// Generate code from a RON table and write it to the output file
pub fn generate(table_file: &Path, output_file: &Path) -> Result<(), Error> {
    let table = ChipTable::load(table_file)?;
    table.validate()?;

    let code = table.generate_code();
    fs::write(output_file, code)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
    [
        (
            name: "M29F160FT",
            chip_id: 0x000122D2,
            boot_block: 31,
            block_kwords: 32,
            sector_kwords: 4,
            erase_map: 0x71,
        ),
        (
            name: "default",
            chip_id: 0,
            boot_block: 0,
            block_kwords: 32,
            sector_kwords: 4,
            erase_map: 0x1d,
            wildcard: true,
        ),
    ]
    "#;

    #[test]
    fn test_parse_table() {
        let table = ChipTable::from_ron(TABLE).unwrap();
        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entries[0].chip_id, 0x000122D2);
        assert_eq!(table.entries[0].boot_block, 31);
        assert!(!table.entries[0].wildcard);
        assert!(table.entries[1].wildcard);
        table.validate().unwrap();
    }

    #[test]
    fn test_wildcard_must_be_last() {
        let mut table = ChipTable::from_ron(TABLE).unwrap();
        table.entries.reverse();
        assert!(matches!(table.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_erase_map_needs_first_unit() {
        let mut table = ChipTable::from_ron(TABLE).unwrap();
        table.entries[0].erase_map = 0x70;
        assert!(matches!(table.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_boot_block_inside_device() {
        let mut table = ChipTable::from_ron(TABLE).unwrap();
        table.entries[0].boot_block = 32;
        assert!(matches!(table.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_generate_code() {
        let table = ChipTable::from_ron(TABLE).unwrap();
        let code = table.generate_code();
        assert!(code.contains("pub static CHIP_BLOCKS"));
        assert!(code.contains("[ChipBlockInfo; 2usize]"));
        assert!(code.contains("CHIP_BLOCK_ARRAY[1usize]"));
        assert!(code.contains("0x000122D2"));
        assert!(code.contains("boot_sector_erase_map: 0x71"));
    }
}
