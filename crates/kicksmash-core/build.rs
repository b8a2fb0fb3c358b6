//! Build script for kicksmash-core
//!
//! This script generates the chip erase geometry table from the RON file at
//! build time.

use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());

    // The table lives at the workspace root
    let table_file = manifest_dir
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("chips")
        .join("blocks.ron");
    let output_file = out_dir.join("chip_blocks_generated.rs");

    println!("cargo::rerun-if-changed={}", table_file.display());

    kicksmash_chips_codegen::generate(&table_file, &output_file)
        .expect("Failed to generate chip block table");
}
