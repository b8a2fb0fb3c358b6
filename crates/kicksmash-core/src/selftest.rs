//! Pin connectivity self-test
//!
//! The MCU pulls (rather than drives) the socket lines and watches how they
//! respond. With everything pulled down nothing may read high. Pulling the
//! lines up one at a time, cumulatively, each line must rise within a
//! millisecond without disturbing any other line. A line that never rises
//! is open or shorted to ground; a line that rises with its neighbour is
//! bridged to it.

use core::fmt;

use crate::bus::{BusDriver, ADDRESS_LINES, ADDRESS_MASK};
use crate::controller::{BusState, FlashController};
use crate::hal::{AccessMask, Clock};

/// Pull-up window per line
const RISE_WINDOW_MSEC: u64 = 1;

/// Pull-down settling time
const PULL_DOWN_SETTLE_USEC: u64 = 100;

/// Upper bound on recorded faults (at most one per tested line)
pub const MAX_FAULTS: usize = 40;

/// Faults found by [`FlashController::verify_connectivity`]
pub type FaultList = heapless::Vec<Fault, MAX_FAULTS>;

/// A connectivity problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Address lines high with everything pulled down
    AddressStuckHigh {
        /// Offending lines
        lines: u32,
        /// Whether OE# was being driven high
        oe_driven: bool,
    },
    /// Data lines high with everything pulled down
    DataStuckHigh {
        /// Offending lines
        lines: u32,
        /// Whether OE# was being driven high
        oe_driven: bool,
    },
    /// Data lines rose while pulling up an address line
    DataHighWithAddressPullUp {
        /// Address line being tested
        line: u8,
        /// Data sample
        data: u32,
    },
    /// Pulling up an address line changed other address lines
    AddressPullUpIncorrect {
        /// Address line being tested
        line: u8,
        /// Address sample
        value: u32,
        /// Expected address sample
        expected: u32,
    },
    /// An address line never rose
    AddressStuckLow {
        /// Address line being tested
        line: u8,
        /// Last address sample
        value: u32,
    },
    /// Address lines dropped while pulling up a data line
    AddressLowWithDataPullUp {
        /// Data line being tested
        line: u8,
        /// Address sample
        address: u32,
    },
    /// Pulling up a data line changed other data lines
    DataPullUpIncorrect {
        /// Data line being tested
        line: u8,
        /// Data sample
        value: u32,
        /// Expected data sample
        expected: u32,
    },
    /// A data line never rose
    DataStuckLow {
        /// Data line being tested
        line: u8,
        /// Last data sample
        value: u32,
    },
    /// The stop signal fired before a line was pulled up
    Stopped {
        /// Line that was about to be tested
        line: u8,
        /// Whether the data pass was running
        data: bool,
    },
}

/// Line list like `A19 A3`, highest first
struct Lines(char, u32);

impl fmt::Display for Lines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for bit in (0..32).rev() {
            if self.1 & (1 << bit) != 0 {
                write!(f, "{}{}{}", sep, self.0, bit)?;
                sep = " ";
            }
        }
        Ok(())
    }
}

fn when(oe_driven: bool) -> &'static str {
    if oe_driven {
        " when OE high"
    } else {
        ""
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::AddressStuckHigh { lines, oe_driven } => write!(
                f,
                "{} addr stuck high: 0x{:05x}{}",
                Lines('A', lines),
                lines,
                when(oe_driven)
            ),
            Self::DataStuckHigh { lines, oe_driven } => write!(
                f,
                "{} data stuck high: 0x{:08x}{}",
                Lines('D', lines),
                lines,
                when(oe_driven)
            ),
            Self::DataHighWithAddressPullUp { line, data } => write!(
                f,
                "{} found high with A{} pull-up: 0x{:08x}",
                Lines('D', data),
                line,
                data
            ),
            Self::AddressPullUpIncorrect {
                line,
                value,
                expected,
            } => write!(
                f,
                "A{} pull-up caused incorrect {} value: 0x{:05x}",
                line,
                Lines('A', value ^ expected),
                value
            ),
            Self::AddressStuckLow { line, value } => {
                write!(f, "A{} stuck low: 0x{:05x}", line, value)
            }
            Self::AddressLowWithDataPullUp { line, address } => write!(
                f,
                "{} found low with D{} pull-up: 0x{:05x}",
                Lines('A', address ^ ADDRESS_MASK),
                line,
                address
            ),
            Self::DataPullUpIncorrect {
                line,
                value,
                expected,
            } => write!(
                f,
                "D{} pull-up caused incorrect {} value: 0x{:08x}",
                line,
                Lines('D', value ^ expected),
                value
            ),
            Self::DataStuckLow { line, value } => {
                write!(f, "D{} stuck low: 0x{:08x}", line, value)
            }
            Self::Stopped { line, data } => {
                write!(f, "stopped before {}{}", if data { 'D' } else { 'A' }, line)
            }
        }
    }
}

/// Collects faults, keeping only the first unless verbose
struct Report {
    faults: FaultList,
    verbose: bool,
}

impl Report {
    fn record(&mut self, fault: Fault) {
        log::warn!("{}", fault);
        if self.verbose || self.faults.is_empty() {
            // Capacity covers one fault per line
            let _ = self.faults.push(fault);
        }
    }
}

/// Lines `first..=line` set
fn cumulative(first: u8, line: u8) -> u32 {
    let upto = if line >= 31 {
        u32::MAX
    } else {
        (1u32 << (line + 1)) - 1
    };
    upto & !((1u32 << first) - 1)
}

/// Which bus direction a pull-up pass exercises
#[derive(Clone, Copy)]
enum Pass {
    Address,
    Data,
}

impl<B: BusDriver, C: Clock, M: AccessMask> FlashController<B, C, M> {
    /// Check every socket line with the MCU pull resistors
    ///
    /// Runs with the bus released and leaves it released. With `verbose`
    /// every fault is returned and each phase reports its result; otherwise
    /// only the first fault is returned.
    ///
    /// `stop` is checked before each line is pulled up. Once it returns true
    /// the test ends with a [`Fault::Stopped`] entry.
    pub fn verify_connectivity(
        &mut self,
        verbose: bool,
        mut stop: impl FnMut() -> bool,
    ) -> Result<(), FaultList> {
        let mut report = Report {
            faults: FaultList::new(),
            verbose,
        };

        if self.pull_down_phase(&mut report) {
            if verbose {
                log::info!("address and data pull-down: pass");
            }
            if self.pull_up_phase(Pass::Address, &mut report, &mut stop) {
                if verbose {
                    log::info!("address pull-up: pass");
                }
                if self.pull_up_phase(Pass::Data, &mut report, &mut stop) && verbose {
                    log::info!("data pull-up: pass");
                }
            }
        }

        self.disable();
        if report.faults.is_empty() {
            Ok(())
        } else {
            Err(report.faults)
        }
    }

    fn pull_down_phase(&mut self, report: &mut Report) -> bool {
        self.disable();
        for oe_driven in [false, true] {
            if oe_driven {
                self.bus.enable_output_enable_drive();
                self.bus.set_output_enable(true);
            }
            self.clock.delay_usec(PULL_DOWN_SETTLE_USEC);

            let lines = self.bus.read_address();
            if lines != 0 {
                report.record(Fault::AddressStuckHigh { lines, oe_driven });
                return false;
            }
            let lines = self.bus.read_data();
            if lines != 0 {
                report.record(Fault::DataStuckHigh { lines, oe_driven });
                return false;
            }
        }
        true
    }

    fn pull_up_phase(
        &mut self,
        pass: Pass,
        report: &mut Report,
        stop: &mut impl FnMut() -> bool,
    ) -> bool {
        let lines = match pass {
            Pass::Address => 0..ADDRESS_LINES as u8,
            Pass::Data => self.mode.data_lines(),
        };
        let first = lines.start;
        let mut clean = true;

        for line in lines {
            if stop() {
                let fault = Fault::Stopped {
                    line,
                    data: matches!(pass, Pass::Data),
                };
                log::info!("{}", fault);
                // Recorded even when quiet
                let _ = report.faults.push(fault);
                return false;
            }

            let expected = cumulative(first, line);
            match pass {
                Pass::Address => self.bus.set_address(expected),
                Pass::Data => self.bus.set_data(expected),
            }

            let start = self.clock.now();
            let deadline = self.clock.deadline_after_msec(RISE_WINDOW_MSEC);
            let mut seen = None;
            let mut value = 0;
            let mut fault = None;

            while !self.clock.has_elapsed(deadline) {
                let (other, sample) = match pass {
                    Pass::Address => (self.bus.read_data(), self.bus.read_address()),
                    Pass::Data => (self.bus.read_address(), self.bus.read_data()),
                };
                fault = match pass {
                    Pass::Address if other != 0 => {
                        Some(Fault::DataHighWithAddressPullUp { line, data: other })
                    }
                    Pass::Data if other != ADDRESS_MASK => {
                        Some(Fault::AddressLowWithDataPullUp { line, address: other })
                    }
                    _ => None,
                };
                if fault.is_some() {
                    break;
                }

                value = sample;
                if value & (1 << line) != 0 {
                    if seen.is_none() {
                        seen = Some(self.clock.now());
                    }
                    if value != expected {
                        fault = Some(match pass {
                            Pass::Address => Fault::AddressPullUpIncorrect {
                                line,
                                value,
                                expected,
                            },
                            Pass::Data => Fault::DataPullUpIncorrect {
                                line,
                                value,
                                expected,
                            },
                        });
                        break;
                    }
                }
            }

            let fault = match (fault, seen) {
                (Some(fault), _) => Some(fault),
                (None, None) => Some(match pass {
                    Pass::Address => Fault::AddressStuckLow { line, value },
                    Pass::Data => Fault::DataStuckLow { line, value },
                }),
                (None, Some(_)) => None,
            };
            if let Some(fault) = fault {
                report.record(fault);
                clean = false;
            }
            if let Some(seen) = seen {
                let prefix = match pass {
                    Pass::Address => 'A',
                    Pass::Data => 'D',
                };
                log::debug!(
                    " {}{}: {} usec",
                    prefix,
                    line,
                    self.clock.ticks_to_usec(seen.wrapping_sub(start))
                );
            }
        }
        clean
    }

    /// Detect whether the board sits alone or inside a host system
    ///
    /// Pulls A0-A15 up, then down, waiting 1 ms each time. In a host system
    /// the host's drivers win and the lines do not follow; they are then
    /// left floating so they never load the host bus. The result is cached
    /// and available from [`is_standalone`](Self::is_standalone).
    pub fn check_standalone(&mut self) -> bool {
        const LOW_LINES: u32 = 0xffff;

        if self.state == BusState::Enabled {
            self.disable();
        } else {
            self.bus.disable_address_output();
        }

        self.bus.set_address(LOW_LINES);
        self.clock.delay_usec(RISE_WINDOW_MSEC * 1000);
        let got = self.bus.read_address() & LOW_LINES;
        let standalone = if got != LOW_LINES {
            log::info!("A0-A15 pull-up got {:04x}", got);
            false
        } else {
            self.bus.set_address(0);
            self.clock.delay_usec(RISE_WINDOW_MSEC * 1000);
            let got = self.bus.read_address() & LOW_LINES;
            if got != 0 {
                log::info!("A0-A15 pull-down got {:04x}", got);
            }
            got == 0
        };

        if !standalone {
            self.bus.float_address_lines();
        }
        self.standalone = Some(standalone);
        standalone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BusOp, MockBus, StepClock};
    use crate::mode::BusWidthMode;
    use std::string::ToString;

    fn controller(bus: MockBus, mode: BusWidthMode) -> FlashController<MockBus, StepClock> {
        FlashController::new(bus, StepClock::with_step(50), mode)
    }

    #[test]
    fn test_clean_board_passes() {
        let mut ctl = controller(MockBus::new(), BusWidthMode::Mode32);
        ctl.enable();
        assert_eq!(ctl.verify_connectivity(true, || false), Ok(()));
        assert_eq!(ctl.state(), BusState::Disabled);
    }

    #[test]
    fn test_stuck_low_line_keeps_testing() {
        let mut bus = MockBus::new();
        bus.stuck_low_address = 1 << 5;
        let mut ctl = controller(bus, BusWidthMode::Mode16Low);

        let faults = ctl.verify_connectivity(true, || false).unwrap_err();
        let stuck: std::vec::Vec<_> = faults
            .iter()
            .filter(|f| matches!(f, Fault::AddressStuckLow { .. }))
            .collect();
        assert_eq!(stuck, [&Fault::AddressStuckLow { line: 5, value: 0x1f }]);
        // A6..A19 were still pulled up and each saw A5 missing
        assert_eq!(faults.len(), 15);
        assert_eq!(
            faults[1],
            Fault::AddressPullUpIncorrect { line: 6, value: 0x5f, expected: 0x7f }
        );
        // No data pass after a failed address pass
        assert!(!ctl.bus().ops().contains(&BusOp::SetData(1)));
    }

    #[test]
    fn test_quiet_mode_keeps_first_fault() {
        let mut bus = MockBus::new();
        bus.stuck_low_address = 1 << 5;
        let mut ctl = controller(bus, BusWidthMode::Mode16Low);
        let faults = ctl.verify_connectivity(false, || false).unwrap_err();
        assert_eq!(faults.as_slice(), [Fault::AddressStuckLow { line: 5, value: 0x1f }]);
    }

    #[test]
    fn test_stuck_high_ends_test() {
        let mut bus = MockBus::new();
        bus.stuck_high_address = 0x8_0008;
        let mut ctl = controller(bus, BusWidthMode::Mode32);
        let faults = ctl.verify_connectivity(true, || false).unwrap_err();
        assert_eq!(
            faults.as_slice(),
            [Fault::AddressStuckHigh { lines: 0x8_0008, oe_driven: false }]
        );
        assert!(!ctl.bus().ops().contains(&BusOp::SetAddress(1)));
        assert_eq!(faults[0].to_string(), "A19 A3 addr stuck high: 0x80008");
    }

    #[test]
    fn test_bridged_lines() {
        let mut bus = MockBus::new();
        bus.tied_address = 0x18;
        let mut ctl = controller(bus, BusWidthMode::Mode32);
        let faults = ctl.verify_connectivity(true, || false).unwrap_err();
        assert_eq!(
            faults.as_slice(),
            [Fault::AddressPullUpIncorrect { line: 3, value: 0x1f, expected: 0x0f }]
        );
        assert_eq!(
            faults[0].to_string(),
            "A3 pull-up caused incorrect A4 value: 0x0001f"
        );
    }

    #[test]
    fn test_data_high_during_pull_down() {
        let mut bus = MockBus::new();
        bus.stuck_high_data = 1 << 7;
        let mut ctl = controller(bus, BusWidthMode::Mode16Low);
        let faults = ctl.verify_connectivity(false, || false).unwrap_err();
        assert_eq!(faults[0].to_string(), "D7 data stuck high: 0x00000080");
    }

    #[test]
    fn test_data_pass_follows_mode() {
        let mut ctl = controller(MockBus::new(), BusWidthMode::Mode16High);
        ctl.verify_connectivity(false, || false).unwrap();
        let data_sets: std::vec::Vec<u32> = ctl
            .bus()
            .ops()
            .iter()
            .filter_map(|op| match op {
                BusOp::SetData(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(data_sets.len(), 16);
        assert_eq!(data_sets[0], 0x0001_0000);
        assert_eq!(data_sets[15], 0xffff_0000);
    }

    #[test]
    fn test_stop_ends_address_pass() {
        let mut ctl = controller(MockBus::new(), BusWidthMode::Mode32);
        let mut checks = 0;
        let faults = ctl
            .verify_connectivity(false, || {
                checks += 1;
                checks > 3
            })
            .unwrap_err();

        assert_eq!(faults.as_slice(), [Fault::Stopped { line: 3, data: false }]);
        assert_eq!(faults[0].to_string(), "stopped before A3");
        assert_eq!(checks, 4);
        let ops = ctl.bus().ops();
        assert!(ops.contains(&BusOp::SetAddress(0x7)));
        assert!(!ops.contains(&BusOp::SetAddress(0xf)));
        assert!(!ops.iter().any(|op| matches!(op, BusOp::SetData(v) if *v != 0)));
        assert_eq!(ctl.state(), BusState::Disabled);
    }

    #[test]
    fn test_stop_during_data_pass() {
        let mut ctl = controller(MockBus::new(), BusWidthMode::Mode16High);
        let mut checks = 0;
        let faults = ctl
            .verify_connectivity(true, || {
                checks += 1;
                // 20 address lines, then D16 and D17
                checks > 22
            })
            .unwrap_err();
        assert_eq!(faults.as_slice(), [Fault::Stopped { line: 18, data: true }]);
        assert!(ctl.bus().ops().contains(&BusOp::SetData(0x0003_0000)));
        assert!(!ctl.bus().ops().contains(&BusOp::SetData(0x0007_0000)));
    }

    #[test]
    fn test_cumulative_patterns() {
        assert_eq!(cumulative(0, 0), 1);
        assert_eq!(cumulative(0, 19), 0xf_ffff);
        assert_eq!(cumulative(16, 31), 0xffff_0000);
        assert_eq!(cumulative(0, 31), u32::MAX);
    }

    #[test]
    fn test_standalone_detection() {
        let mut ctl = controller(MockBus::new(), BusWidthMode::Mode32);
        assert!(ctl.check_standalone());
        assert_eq!(ctl.is_standalone(), Some(true));

        let mut bus = MockBus::new();
        bus.stuck_low_address = 1 << 2;
        let mut ctl = controller(bus, BusWidthMode::Mode32);
        assert!(!ctl.check_standalone());
        assert_eq!(ctl.bus().ops().last(), Some(&BusOp::FloatAddress));
    }
}
