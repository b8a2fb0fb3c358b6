//! Board description files
//!
//! A board file picks the wiring (a revision preset or a full pin map),
//! the chips fitted in each slot, the word framing, algorithm timings and
//! any faults to inject. Every key is optional.
//!
//! ```toml
//! revision = 2
//! mode = "32"
//!
//! [chips]
//! low = 0x000122D8
//! high = 0x000122D8
//!
//! [faults]
//! stuck_low = ["A7"]
//! ```

use std::path::Path;

use kicksmash_core::bus::{PinMap, Signal, ADDRESS_LINES, DATA_LINES};
use kicksmash_core::BusWidthMode;
use serde::{Deserialize, Serialize};

use crate::chip::{ChipFaults, ChipTiming};
use crate::error::{Result, SimError};

/// Chip fitted when a board file does not say (M29F160FB)
pub const DEFAULT_CHIP_ID: u32 = 0x0001_22d8;

/// Board revision used when neither a revision nor a pin map is given
pub const DEFAULT_REVISION: u8 = 2;

/// Chips fitted to the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChipsConfig {
    /// Autoselect id of the chip on D0-D15
    pub low: Option<u32>,
    /// Autoselect id of the chip on D16-D31
    pub high: Option<u32>,
}

impl Default for ChipsConfig {
    fn default() -> Self {
        Self {
            low: Some(DEFAULT_CHIP_ID),
            high: None,
        }
    }
}

/// Faults to inject
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaultConfig {
    /// Signals held low
    pub stuck_low: Vec<String>,
    /// Signals held high
    pub stuck_high: Vec<String>,
    /// Pairs of shorted signals
    pub bridges: Vec<(String, String)>,
    /// Chip misbehaviour, applied to every fitted chip
    pub chip: ChipFaults,
}

/// Scripted host system; present when the board is installed in a machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Addresses the host fetches, in order
    pub fetch: Vec<u32>,
    /// Socket OE# samples each fetch lasts
    pub samples: u32,
    /// Idle samples between fetches
    pub spacing: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            fetch: Vec::new(),
            samples: 4,
            spacing: 0,
        }
    }
}

/// A simulated board
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    /// Board revision preset for the wiring
    pub revision: Option<u8>,
    /// Explicit wiring; wins over `revision`
    pub pins: Option<PinMap>,
    /// Word framing
    pub mode: BusWidthMode,
    /// Fitted chips
    pub chips: ChipsConfig,
    /// Embedded algorithm durations
    pub timing: ChipTiming,
    /// Injected faults
    pub faults: FaultConfig,
    /// Host system on the socket
    pub host: Option<HostConfig>,
}

impl BoardConfig {
    /// Parse a board description
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a board file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded board file {}", path.display());
        Ok(config)
    }

    /// Default revision 2 board with chips fitted where `mode` needs them
    pub fn for_mode(mode: BusWidthMode) -> Self {
        let chips = match mode {
            BusWidthMode::Mode32 => ChipsConfig {
                low: Some(DEFAULT_CHIP_ID),
                high: Some(DEFAULT_CHIP_ID),
            },
            BusWidthMode::Mode16Low => ChipsConfig::default(),
            BusWidthMode::Mode16High => ChipsConfig {
                low: None,
                high: Some(DEFAULT_CHIP_ID),
            },
        };
        Self {
            mode,
            chips,
            ..Self::default()
        }
    }

    /// Wiring to use
    pub fn pin_map(&self) -> PinMap {
        match &self.pins {
            Some(pins) => pins.clone(),
            None => PinMap::for_revision(self.revision.unwrap_or(DEFAULT_REVISION)),
        }
    }
}

/// Parse a signal name: `A0`-`A19`, `D0`-`D31`, `WE`, `OE` or `SOE`
pub fn parse_signal(name: &str) -> Result<Signal> {
    let unknown = || SimError::UnknownSignal(name.to_string());
    let upper = name.trim().to_ascii_uppercase();
    match upper.as_str() {
        "WE" => return Ok(Signal::WriteEnable),
        "OE" => return Ok(Signal::OutputEnable),
        "SOE" => return Ok(Signal::SocketOutputEnable),
        _ => {}
    }

    let mut chars = upper.chars();
    let kind = chars.next().ok_or_else(unknown)?;
    let line: u8 = chars.as_str().parse().map_err(|_| unknown())?;
    match kind {
        'A' if usize::from(line) < ADDRESS_LINES => Ok(Signal::Address(line)),
        'D' if usize::from(line) < DATA_LINES => Ok(Signal::Data(line)),
        _ => Err(unknown()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = BoardConfig::from_toml_str("").unwrap();
        assert_eq!(config.mode, BusWidthMode::Mode16Low);
        assert_eq!(config.chips.low, Some(DEFAULT_CHIP_ID));
        assert_eq!(config.pin_map(), PinMap::board_rev2());
        assert!(config.host.is_none());
    }

    #[test]
    fn test_full_file() {
        let text = r#"
            revision = 1
            mode = "32"

            [chips]
            low = 0x00C22258
            high = 0x00C22258

            [timing]
            program_usec = 20

            [faults]
            stuck_low = ["a7"]
            bridges = [["D1", "D2"]]
            chip = { weak_programs = 3 }

            [host]
            fetch = [0x100, 0x104]
        "#;
        let config = BoardConfig::from_toml_str(text).unwrap();
        assert_eq!(config.mode, BusWidthMode::Mode32);
        assert_eq!(config.chips.high, Some(0x00c2_2258));
        assert_eq!(config.timing.program_usec, 20);
        assert_eq!(config.timing.sector_erase_usec, ChipTiming::default().sector_erase_usec);
        assert_eq!(config.faults.chip.weak_programs, 3);
        assert_eq!(config.host.as_ref().unwrap().samples, 4);
        assert_eq!(config.pin_map(), PinMap::board_rev1());
    }

    #[test]
    fn test_mode_names() {
        for (name, mode) in [
            ("32", BusWidthMode::Mode32),
            ("16-low", BusWidthMode::Mode16Low),
            ("16-high", BusWidthMode::Mode16High),
        ] {
            let config = BoardConfig::from_toml_str(&format!("mode = \"{name}\"")).unwrap();
            assert_eq!(config.mode, mode);
        }
        assert!(BoardConfig::from_toml_str("mode = \"mode16-high\"").is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            BoardConfig::from_toml_str("speed = 3"),
            Err(SimError::Parse(_))
        ));
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(parse_signal("A19").unwrap(), Signal::Address(19));
        assert_eq!(parse_signal("d31").unwrap(), Signal::Data(31));
        assert_eq!(parse_signal("soe").unwrap(), Signal::SocketOutputEnable);
        assert!(parse_signal("A20").is_err());
        assert!(parse_signal("").is_err());
        assert!(parse_signal("X1").is_err());
    }
}
