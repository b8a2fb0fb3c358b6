//! Autoselect identification

use super::{resolve_sector_map, ChipBlockInfo};
use crate::bus::BusDriver;
use crate::controller::FlashController;
use crate::hal::{AccessMask, Clock};
use crate::mode::BusWidthMode;
use crate::protocol::commands;

/// Identification words of the device(s) on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId {
    /// Manufacturer (upper half) and device code (lower half) of the chip
    /// the active mode addresses
    pub part1: u32,
    /// Same for the other half of the bus
    pub part2: u32,
}

impl DeviceId {
    /// Combine the two autoselect reads
    pub const fn from_autoselect(mode: BusWidthMode, low: u32, high: u32) -> Self {
        let lower_chip = (low << 16) | (high & 0xffff);
        let upper_chip = (low & 0xffff_0000) | (high >> 16);
        match mode {
            BusWidthMode::Mode32 | BusWidthMode::Mode16Low => Self {
                part1: lower_chip,
                part2: upper_chip,
            },
            BusWidthMode::Mode16High => Self {
                part1: upper_chip,
                part2: lower_chip,
            },
        }
    }

    /// Manufacturer code of the addressed chip
    pub const fn manufacturer(&self) -> u16 {
        (self.part1 >> 16) as u16
    }

    /// Device code of the addressed chip
    pub const fn device(&self) -> u16 {
        self.part1 as u16
    }

    /// Erase geometry for the addressed chip
    pub fn block_info(&self) -> &'static ChipBlockInfo {
        resolve_sector_map(self.part1)
    }
}

impl<B: BusDriver, C: Clock, M: AccessMask> FlashController<B, C, M> {
    /// Read the manufacturer and device codes
    pub fn identify(&mut self) -> DeviceId {
        self.send_command(commands::UNLOCK1_ADDR, commands::AUTOSELECT);
        let (low, high) = self.quiesced(|ctl| (ctl.read_word(0), ctl.read_word(1)));
        self.read_mode();

        let id = DeviceId::from_autoselect(self.mode, low, high);
        log::debug!("autoselect {:08x} {:08x} -> {:08x}", low, high, id.part1);
        id
    }
}
