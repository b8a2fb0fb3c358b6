//! Flash controller state and timed bus cycles
//!
//! [`FlashController`] owns the bus driver together with the controller
//! state: active word framing, whether the bus is driven, calibrated cycle
//! timings, last access time and the sticky device status. Protocol,
//! polling, identification, data operations, self-test and snoop are
//! further `impl` blocks in their own modules.

use crate::bus::BusDriver;
use crate::hal::{AccessMask, Clock, NoMask};
use crate::mode::BusWidthMode;
use crate::status::DeviceStatus;

/// Device capacity in words
pub const DEVICE_WORDS: u32 = 1 << 20;

/// Idle time after which [`FlashController::poll_idle`] releases the bus
const IDLE_DISCONNECT_USEC: u64 = 1_000_000;

/// Settling time after tri-stating the bus
const DISABLE_SETTLE_USEC: u64 = 50;

/// Whether the controller is driving the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusState {
    /// All lines released (pulled, not driven)
    #[default]
    Disabled,
    /// Address, OE# and WE# driven; data lines switch per cycle
    Enabled,
}

/// Cycle timings converted to clock ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timing {
    /// tDF: OE# high to data high-Z
    pub t15: u64,
    /// tOE: OE# low to data valid
    pub t20: u64,
    /// tWP: WE# pulse width (covers tDS)
    pub t30: u64,
}

impl Timing {
    fn calibrate<C: Clock>(clock: &C) -> Self {
        Self {
            t15: clock.nsec_to_ticks(15),
            t20: clock.nsec_to_ticks(20),
            t30: clock.nsec_to_ticks(30),
        }
    }
}

/// Parallel NOR flash controller
///
/// Generic over the line driver `B`, the tick source `C` and the
/// interrupt mask `M` that fences multi-cycle sequences.
pub struct FlashController<B, C, M = NoMask> {
    pub(crate) bus: B,
    pub(crate) clock: C,
    pub(crate) access_mask: M,
    pub(crate) mode: BusWidthMode,
    pub(crate) state: BusState,
    pub(crate) timing: Option<Timing>,
    pub(crate) last_access: Option<u64>,
    pub(crate) status: DeviceStatus,
    pub(crate) standalone: Option<bool>,
}

impl<B: BusDriver, C: Clock> FlashController<B, C, NoMask> {
    /// Create a controller for a host with no asynchronous bus user
    pub fn new(bus: B, clock: C, mode: BusWidthMode) -> Self {
        Self::with_mask(bus, clock, NoMask, mode)
    }
}

impl<B: BusDriver, C: Clock, M: AccessMask> FlashController<B, C, M> {
    /// Create a controller
    ///
    /// The bus starts out disabled and no line is touched until the first
    /// operation (or an explicit [`enable`](Self::enable)).
    pub fn with_mask(bus: B, clock: C, access_mask: M, mode: BusWidthMode) -> Self {
        Self {
            bus,
            clock,
            access_mask,
            mode,
            state: BusState::Disabled,
            timing: None,
            last_access: None,
            status: DeviceStatus::Normal,
            standalone: None,
        }
    }

    /// Active word framing
    pub fn mode(&self) -> BusWidthMode {
        self.mode
    }

    /// Change the word framing
    ///
    /// The word mask is latched when the bus is enabled, so an enabled bus
    /// is released and picks up the new mode on its next use.
    pub fn set_mode(&mut self, mode: BusWidthMode) {
        if mode == self.mode {
            return;
        }
        if self.state == BusState::Enabled {
            self.disable();
        }
        self.mode = mode;
    }

    /// Mask applied to every command and data word
    pub fn word_mask(&self) -> u32 {
        self.mode.mask()
    }

    /// Whether the bus is currently driven
    pub fn state(&self) -> BusState {
        self.state
    }

    /// Sticky outcome of the last program/erase poll
    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    /// Result of the last [`check_standalone`](Self::check_standalone), if run
    pub fn is_standalone(&self) -> Option<bool> {
        self.standalone
    }

    /// The bus driver
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable access to the bus driver
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// The tick source
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Take the controller apart
    pub fn into_parts(self) -> (B, C, M) {
        (self.bus, self.clock, self.access_mask)
    }

    /// Start driving the bus
    ///
    /// Calibrates the cycle timings on first use, drives the address lines
    /// (at 0), OE# and WE# high, leaves the data lines as pulled inputs and
    /// puts the device in read mode.
    pub fn enable(&mut self) {
        if self.state == BusState::Enabled {
            return;
        }
        if self.timing.is_none() {
            let timing = Timing::calibrate(&self.clock);
            log::trace!(
                "cycle timing: t15={} t20={} t30={} ticks",
                timing.t15,
                timing.t20,
                timing.t30
            );
            self.timing = Some(timing);
        }

        self.bus.set_address(0);
        self.bus.enable_address_output();
        self.bus.set_write_enable(true);
        self.bus.set_output_enable(true);
        self.bus.enable_output_enable_drive();
        self.bus.disable_data_output();
        self.state = BusState::Enabled;
        log::debug!("bus enabled ({})", self.mode);

        self.read_mode();
    }

    /// Release every line and wait for the pulls to settle
    pub fn disable(&mut self) {
        self.bus.set_write_enable(true);
        self.bus.disable_output_enable_drive();
        self.bus.disable_address_output();
        self.bus.disable_data_output();
        self.clock.delay_usec(DISABLE_SETTLE_USEC);
        if self.state == BusState::Enabled {
            log::debug!("bus disabled");
        }
        self.state = BusState::Disabled;
    }

    /// Release the bus after a second without commands
    ///
    /// Meant to be called from the firmware main loop.
    pub fn poll_idle(&mut self) {
        let Some(last) = self.last_access else {
            return;
        };
        let idle = self.clock.ticks_to_usec(self.clock.now().wrapping_sub(last));
        if idle > IDLE_DISCONNECT_USEC {
            log::debug!("idle for {} us, releasing bus", idle);
            self.disable();
            self.last_access = None;
        }
    }

    pub(crate) fn ensure_enabled(&mut self) {
        if self.state == BusState::Disabled {
            self.enable();
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_access = Some(self.clock.now());
    }

    /// Run `f` with the asynchronous bus user masked
    pub(crate) fn quiesced<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.access_mask.mask();
        let result = f(self);
        self.access_mask.unmask();
        result
    }

    fn timing(&mut self) -> Timing {
        match self.timing {
            Some(timing) => timing,
            None => {
                let timing = Timing::calibrate(&self.clock);
                self.timing = Some(timing);
                timing
            }
        }
    }

    /// One timed read cycle; returns the raw 32-bit bus sample
    pub(crate) fn read_word(&mut self, addr: u32) -> u32 {
        let timing = self.timing();
        self.bus.set_address(addr);
        self.bus.enable_address_output();
        self.bus.set_output_enable(false);
        self.bus.enable_output_enable_drive();
        self.clock.delay_ticks(timing.t20);
        let value = self.bus.read_data();
        self.bus.set_output_enable(true);
        self.bus.disable_output_enable_drive();
        self.clock.delay_ticks(timing.t15);
        value
    }

    /// One timed write cycle; `data` is masked with the active word mask
    ///
    /// The address is latched by the device on the falling edge of WE# and
    /// the data on the rising edge. OE# stays high throughout.
    pub(crate) fn write_word(&mut self, addr: u32, data: u32) {
        let timing = self.timing();
        self.bus.set_address(addr);
        self.bus.set_output_enable(true);
        self.bus.enable_output_enable_drive();
        self.bus.set_write_enable(false);
        self.bus.set_data(data & self.mode.mask());
        self.bus.enable_data_output();
        self.clock.delay_ticks(timing.t30);
        self.bus.set_write_enable(true);
        self.bus.disable_data_output();
        self.bus.disable_output_enable_drive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BusOp, MockBus, StepClock};

    #[test]
    fn test_enable_drives_lines_and_resets() {
        let mut ctl = FlashController::new(MockBus::new(), StepClock::new(), BusWidthMode::Mode32);
        ctl.enable();
        assert_eq!(ctl.state(), BusState::Enabled);

        let ops = ctl.bus().ops();
        assert_eq!(ops[0], BusOp::SetAddress(0));
        assert_eq!(ops[1], BusOp::EnableAddress);
        // Read/reset goes out as the last write cycle
        assert_eq!(ctl.bus().writes(), [(0x555, 0x00f0_00f0)]);

        // Second enable is a no-op
        let before = ctl.bus().ops().len();
        ctl.enable();
        assert_eq!(ctl.bus().ops().len(), before);
    }

    #[test]
    fn test_write_cycle_order() {
        let mut ctl = FlashController::new(MockBus::new(), StepClock::new(), BusWidthMode::Mode16Low);
        ctl.write_word(0x2aa, 0x0055_0055);
        assert_eq!(
            ctl.bus().ops(),
            [
                BusOp::SetAddress(0x2aa),
                BusOp::SetOutputEnable(true),
                BusOp::EnableOutputEnable,
                BusOp::SetWriteEnable(false),
                BusOp::SetData(0x0055),
                BusOp::EnableData,
                BusOp::SetWriteEnable(true),
                BusOp::DisableData,
                BusOp::DisableOutputEnable,
            ]
        );
    }

    #[test]
    fn test_read_cycle_order() {
        let mut bus = MockBus::new();
        bus.push_reads([0x1234_5678]);
        let mut ctl = FlashController::new(bus, StepClock::new(), BusWidthMode::Mode32);
        assert_eq!(ctl.read_word(7), 0x1234_5678);
        assert_eq!(
            ctl.bus().ops(),
            [
                BusOp::SetAddress(7),
                BusOp::EnableAddress,
                BusOp::SetOutputEnable(false),
                BusOp::EnableOutputEnable,
                BusOp::ReadData,
                BusOp::SetOutputEnable(true),
                BusOp::DisableOutputEnable,
            ]
        );
    }

    #[test]
    fn test_idle_disconnect() {
        let mut ctl = FlashController::new(MockBus::new(), StepClock::new(), BusWidthMode::Mode32);
        ctl.enable();
        assert!(ctl.last_access.is_some());

        ctl.poll_idle();
        assert_eq!(ctl.state(), BusState::Enabled);

        ctl.clock().advance_usec(1_000_001);
        ctl.poll_idle();
        assert_eq!(ctl.state(), BusState::Disabled);
        assert_eq!(ctl.last_access, None);

        // Nothing more to do until the next access
        let before = ctl.bus().ops().len();
        ctl.clock().advance_usec(5_000_000);
        ctl.poll_idle();
        assert_eq!(ctl.bus().ops().len(), before);
    }

    #[test]
    fn test_set_mode_releases_bus() {
        let mut ctl = FlashController::new(MockBus::new(), StepClock::new(), BusWidthMode::Mode32);
        ctl.enable();
        ctl.set_mode(BusWidthMode::Mode16High);
        assert_eq!(ctl.state(), BusState::Disabled);
        assert_eq!(ctl.word_mask(), 0xffff_0000);
    }
}
