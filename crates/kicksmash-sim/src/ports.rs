//! Simulated MCU GPIO ports wired to the flash socket
//!
//! Every pin has an output latch and a mode, as on the STM32F1. The level a
//! pin reads is resolved in priority order: injected stuck faults, the
//! MCU's own output, the flash chips (data lines, while OE# is low), the
//! host system (address lines and socket OE#), the weak pull, and finally
//! the board's resistors for a floating pin (control lines read high,
//! everything else low).
//!
//! Control line edges are detected after every port update: the falling
//! edge of WE# latches the address, its rising edge delivers a write cycle
//! to the chips, and the falling edge of OE# starts a read cycle.

use kicksmash_core::bus::{GpioPorts, Pin, PinMap, PinMode, Port, Signal, PORT_COUNT};

use crate::chip::NorChip;
use crate::clock::SimClock;
use crate::host::HostBus;

/// Where a 16-bit chip sits on the 32-bit data bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipSlot {
    /// D0-D15
    Low,
    /// D16-D31
    High,
}

impl ChipSlot {
    /// Both slots
    pub const ALL: [ChipSlot; 2] = [ChipSlot::Low, ChipSlot::High];

    const fn index(self) -> usize {
        self as usize
    }

    const fn shift(self) -> u32 {
        match self {
            Self::Low => 0,
            Self::High => 16,
        }
    }
}

/// Socket-level counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusStats {
    /// WE# rising edges
    pub write_cycles: u64,
    /// OE# falling edges with WE# high
    pub read_cycles: u64,
}

/// GPIO ports of a simulated board
#[derive(Debug)]
pub struct SimPorts {
    map: PinMap,
    signals: [[Option<Signal>; 16]; PORT_COUNT],
    odr: [u16; PORT_COUNT],
    output: [u16; PORT_COUNT],
    pull: [u16; PORT_COUNT],
    stuck_low: [u16; PORT_COUNT],
    stuck_high: [u16; PORT_COUNT],
    bridges: Vec<(Pin, Pin)>,
    clock: SimClock,
    chips: [Option<NorChip>; 2],
    host: Option<HostBus>,
    we_high: bool,
    oe_high: bool,
    latched_address: u32,
    flash_output: Option<(u32, u32)>,
    stats: BusStats,
}

impl SimPorts {
    /// Ports for the given wiring with no chips fitted
    ///
    /// Every pin starts as a floating input, as after reset.
    pub fn new(map: PinMap, clock: SimClock) -> Self {
        let mut signals = [[None; 16]; PORT_COUNT];
        for (signal, pin) in map.signals() {
            signals[pin.port.index()][usize::from(pin.pin)] = Some(signal);
        }
        Self {
            map,
            signals,
            odr: [0; PORT_COUNT],
            output: [0; PORT_COUNT],
            pull: [0; PORT_COUNT],
            stuck_low: [0; PORT_COUNT],
            stuck_high: [0; PORT_COUNT],
            bridges: Vec::new(),
            clock,
            chips: [None, None],
            host: None,
            we_high: true,
            oe_high: true,
            latched_address: 0,
            flash_output: None,
            stats: BusStats::default(),
        }
    }

    /// Fit a chip
    pub fn with_chip(mut self, slot: ChipSlot, chip: NorChip) -> Self {
        self.chips[slot.index()] = Some(chip);
        self
    }

    /// Fit, replace or remove a chip
    pub fn set_chip(&mut self, slot: ChipSlot, chip: Option<NorChip>) {
        self.chips[slot.index()] = chip;
    }

    /// The chip in a slot
    pub fn chip(&self, slot: ChipSlot) -> Option<&NorChip> {
        self.chips[slot.index()].as_ref()
    }

    /// Mutable access to the chip in a slot
    pub fn chip_mut(&mut self, slot: ChipSlot) -> Option<&mut NorChip> {
        self.chips[slot.index()].as_mut()
    }

    /// Install the board in a host system (or take it out with `None`)
    pub fn set_host(&mut self, host: Option<HostBus>) {
        self.host = host;
    }

    /// The host system, if installed
    pub fn host(&self) -> Option<&HostBus> {
        self.host.as_ref()
    }

    /// Wiring in use
    pub fn map(&self) -> &PinMap {
        &self.map
    }

    /// Shared clock
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Socket-level counters
    pub fn stats(&self) -> BusStats {
        self.stats
    }

    fn pin_of(&self, signal: Signal) -> Option<Pin> {
        self.map
            .signals()
            .find(|&(s, _)| s == signal)
            .map(|(_, pin)| pin)
    }

    /// Hold a signal at a fixed level regardless of drivers
    ///
    /// Returns false if the signal is not part of the wiring.
    pub fn stick(&mut self, signal: Signal, high: bool) -> bool {
        let Some(pin) = self.pin_of(signal) else {
            return false;
        };
        let i = pin.port.index();
        if high {
            self.stuck_high[i] |= pin.mask();
        } else {
            self.stuck_low[i] |= pin.mask();
        }
        true
    }

    /// Short two undriven signals together; a high on either wins
    pub fn bridge(&mut self, a: Signal, b: Signal) -> bool {
        match (self.pin_of(a), self.pin_of(b)) {
            (Some(a), Some(b)) => {
                self.bridges.push((a, b));
                true
            }
            _ => false,
        }
    }

    /// Remove all stuck lines and shorts
    pub fn clear_faults(&mut self) {
        self.stuck_low = [0; PORT_COUNT];
        self.stuck_high = [0; PORT_COUNT];
        self.bridges.clear();
    }

    /// Current mode of a pin
    pub fn pin_mode(&self, pin: Pin) -> PinMode {
        let i = pin.port.index();
        if self.output[i] & pin.mask() != 0 {
            PinMode::Output
        } else if self.pull[i] & pin.mask() != 0 {
            PinMode::InputPull
        } else {
            PinMode::Input
        }
    }

    fn stuck(&self, pin: Pin) -> Option<bool> {
        let i = pin.port.index();
        if self.stuck_low[i] & pin.mask() != 0 {
            Some(false)
        } else if self.stuck_high[i] & pin.mask() != 0 {
            Some(true)
        } else {
            None
        }
    }

    fn is_output(&self, pin: Pin) -> bool {
        self.output[pin.port.index()] & pin.mask() != 0
    }

    fn signal(&self, pin: Pin) -> Option<Signal> {
        self.signals[pin.port.index()][usize::from(pin.pin)]
    }

    fn raw_level(&self, pin: Pin) -> bool {
        if let Some(level) = self.stuck(pin) {
            return level;
        }
        let i = pin.port.index();
        let latch = self.odr[i] & pin.mask() != 0;
        if self.is_output(pin) {
            return latch;
        }

        let signal = self.signal(pin);
        match signal {
            Some(Signal::Data(n)) => {
                if let Some((value, driven)) = self.flash_output {
                    if (driven >> n) & 1 != 0 {
                        return (value >> n) & 1 != 0;
                    }
                }
            }
            Some(Signal::Address(n)) => {
                if let Some(host) = &self.host {
                    return (host.address() >> n) & 1 != 0;
                }
            }
            _ => {}
        }

        if self.pull[i] & pin.mask() != 0 {
            return latch;
        }
        matches!(
            signal,
            Some(Signal::WriteEnable | Signal::OutputEnable | Signal::SocketOutputEnable)
        )
    }

    fn level(&self, pin: Pin) -> bool {
        let mut high = self.raw_level(pin);
        if self.is_output(pin) || self.stuck(pin).is_some() {
            return high;
        }
        for &(a, b) in &self.bridges {
            if a == pin {
                high |= self.raw_level(b);
            } else if b == pin {
                high |= self.raw_level(a);
            }
        }
        high
    }

    fn gather(&self, pins: &[Pin]) -> u32 {
        pins.iter()
            .enumerate()
            .filter(|&(_, &pin)| self.level(pin))
            .fold(0, |acc, (bit, _)| acc | (1 << bit))
    }

    /// Address currently on A0-A19
    pub fn bus_address(&self) -> u32 {
        self.gather(&self.map.address)
    }

    /// Word currently on D0-D31
    pub fn bus_data(&self) -> u32 {
        self.gather(&self.map.data)
    }

    fn write_cycle(&mut self, addr: u32, data: u32, now: u64) {
        log::trace!("write {:05x} {:08x}", addr, data);
        self.stats.write_cycles += 1;
        for slot in ChipSlot::ALL {
            if let Some(chip) = self.chips[slot.index()].as_mut() {
                chip.write(addr, (data >> slot.shift()) as u16, now);
            }
        }
    }

    fn read_cycle(&mut self, now: u64) {
        let addr = self.bus_address();
        self.stats.read_cycles += 1;
        let mut value = 0;
        let mut driven = 0;
        for slot in ChipSlot::ALL {
            if let Some(chip) = self.chips[slot.index()].as_mut() {
                value |= u32::from(chip.read(addr, now)) << slot.shift();
                driven |= 0xffff << slot.shift();
            }
        }
        log::trace!("read {:05x} {:08x}", addr, value & driven);
        self.flash_output = Some((value, driven));
    }

    fn update_control(&mut self) {
        let we = self.level(self.map.write_enable);
        let oe = self.level(self.map.output_enable);
        let now = self.clock.peek();

        if self.we_high && !we {
            self.latched_address = self.bus_address();
        }
        if !self.we_high && we {
            let data = self.bus_data();
            self.write_cycle(self.latched_address, data, now);
        }
        if oe || !we {
            self.flash_output = None;
        } else if self.oe_high {
            self.read_cycle(now);
        }

        self.we_high = we;
        self.oe_high = oe;
    }
}

impl GpioPorts for SimPorts {
    fn set_mode(&mut self, port: Port, mask: u16, mode: PinMode) {
        let i = port.index();
        self.output[i] &= !mask;
        self.pull[i] &= !mask;
        match mode {
            PinMode::Output => self.output[i] |= mask,
            PinMode::InputPull => self.pull[i] |= mask,
            PinMode::Input => {}
        }
        self.update_control();
    }

    fn set(&mut self, port: Port, mask: u16, value: u16) {
        let i = port.index();
        self.odr[i] = (self.odr[i] & !mask) | (value & mask);
        self.update_control();
    }

    fn get(&mut self, port: Port, mask: u16) -> u16 {
        let mut levels = 0;
        for bit in (0..16u8).filter(|bit| mask & (1 << bit) != 0) {
            let pin = Pin::new(port, bit);
            let host_driven = self.signal(pin) == Some(Signal::SocketOutputEnable)
                && self.stuck(pin).is_none()
                && !self.is_output(pin);
            let from_host = if host_driven {
                self.host.as_mut().map(HostBus::sample_output_enable)
            } else {
                None
            };
            let sampled = from_host.unwrap_or_else(|| self.level(pin));
            if sampled {
                levels |= 1 << bit;
            }
        }
        levels
    }
}
