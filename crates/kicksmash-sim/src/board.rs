//! A complete simulated board: ports, chips, clock and a controller

use kicksmash_core::bus::GpioBus;
use kicksmash_core::{BusWidthMode, FlashController};

use crate::chip::NorChip;
use crate::clock::SimClock;
use crate::config::{parse_signal, BoardConfig};
use crate::error::{Result, SimError};
use crate::host::HostBus;
use crate::mask::SimMask;
use crate::ports::{ChipSlot, SimPorts};

/// Bus driver of a simulated board
pub type SimBus = GpioBus<SimPorts>;

/// Controller driving a simulated board
pub type SimController = FlashController<SimBus, SimClock, SimMask>;

/// Simulated Kicksmash board
pub struct SimBoard {
    flash: SimController,
    mask: SimMask,
    clock: SimClock,
}

impl SimBoard {
    /// Assemble a board from its description
    pub fn new(config: &BoardConfig) -> Result<Self> {
        let map = config.pin_map();
        map.validate()?;

        let clock = SimClock::new();
        let mut ports = SimPorts::new(map.clone(), clock.clone());
        for (slot, id) in [
            (ChipSlot::Low, config.chips.low),
            (ChipSlot::High, config.chips.high),
        ] {
            if let Some(id) = id {
                let mut chip = NorChip::with_timing(id, config.timing);
                chip.faults = config.faults.chip;
                ports.set_chip(slot, Some(chip));
            }
        }

        let needed: &[(ChipSlot, &'static str)] = match config.mode {
            BusWidthMode::Mode32 => &[(ChipSlot::Low, "low"), (ChipSlot::High, "high")],
            BusWidthMode::Mode16Low => &[(ChipSlot::Low, "low")],
            BusWidthMode::Mode16High => &[(ChipSlot::High, "high")],
        };
        if let Some(&(_, slot)) = needed.iter().find(|(s, _)| ports.chip(*s).is_none()) {
            return Err(SimError::MissingChip {
                mode: config.mode.to_string(),
                slot,
            });
        }

        for (names, high) in [
            (&config.faults.stuck_low, false),
            (&config.faults.stuck_high, true),
        ] {
            for name in names {
                ports.stick(parse_signal(name)?, high);
            }
        }
        for (a, b) in &config.faults.bridges {
            ports.bridge(parse_signal(a)?, parse_signal(b)?);
        }

        if let Some(host) = &config.host {
            let script =
                HostBus::fetching(host.fetch.iter().copied(), host.samples).with_spacing(host.spacing);
            ports.set_host(Some(script));
        }

        let bus = GpioBus::new(ports, &map)?;
        let mask = SimMask::new();
        let flash = FlashController::with_mask(bus, clock.clone(), mask.clone(), config.mode);
        log::debug!(
            "simulated board: {} mode, chips low={:?} high={:?}",
            config.mode,
            config.chips.low,
            config.chips.high
        );

        Ok(Self { flash, mask, clock })
    }

    /// Default board for a word framing
    pub fn for_mode(mode: BusWidthMode) -> Result<Self> {
        Self::new(&BoardConfig::for_mode(mode))
    }

    /// The controller
    pub fn flash(&mut self) -> &mut SimController {
        &mut self.flash
    }

    /// The controller, read-only
    pub fn flash_ref(&self) -> &SimController {
        &self.flash
    }

    /// Simulated GPIO ports
    pub fn ports(&self) -> &SimPorts {
        self.flash.bus().ports()
    }

    /// Mutable access to the simulated GPIO ports
    pub fn ports_mut(&mut self) -> &mut SimPorts {
        self.flash.bus_mut().ports_mut()
    }

    /// The chip in a slot
    pub fn chip(&self, slot: ChipSlot) -> Option<&NorChip> {
        self.ports().chip(slot)
    }

    /// Mutable access to the chip in a slot
    pub fn chip_mut(&mut self, slot: ChipSlot) -> Option<&mut NorChip> {
        self.ports_mut().chip_mut(slot)
    }

    /// Interrupt mask counters
    pub fn mask(&self) -> &SimMask {
        &self.mask
    }

    /// Shared virtual clock
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Keep only the controller
    pub fn into_flash(self) -> SimController {
        self.flash
    }
}
