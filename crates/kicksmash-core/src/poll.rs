//! Program/erase completion polling
//!
//! While an embedded algorithm runs, every read returns a status word in
//! which DQ6 toggles. The operation is finished once a read has matched the
//! one before it twice in a row. The reference starts at zero, so an idle
//! device reading 0 completes after two reads. DQ5 set means the device
//! gave up; it is only believed after it has been seen several times.

use bitflags::bitflags;

use crate::bus::BusDriver;
use crate::controller::FlashController;
use crate::hal::{AccessMask, Clock};
use crate::status::DeviceStatus;

bitflags! {
    /// Status bits of the data polling word, both device halves
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusBits: u32 {
        /// Low device: exceeded timing limits
        const DQ5_LOW = 1 << 5;
        /// Low device: toggle bit
        const DQ6_LOW = 1 << 6;
        /// Low device: data polling bit
        const DQ7_LOW = 1 << 7;
        /// High device: exceeded timing limits
        const DQ5_HIGH = 1 << 21;
        /// High device: toggle bit
        const DQ6_HIGH = 1 << 22;
        /// High device: data polling bit
        const DQ7_HIGH = 1 << 23;

        /// Failure on either device
        const FAILURE = Self::DQ5_LOW.bits() | Self::DQ5_HIGH.bits();
    }
}

impl StatusBits {
    /// Whether either device reports a failure
    pub fn failed(self) -> bool {
        self.intersects(Self::FAILURE)
    }
}

/// What is being waited for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Word program
    Program,
    /// Chip or sector erase
    Erase,
}

impl PollMode {
    fn timeout_status(self) -> DeviceStatus {
        match self {
            Self::Program => DeviceStatus::ProgramTimeout,
            Self::Erase => DeviceStatus::EraseTimeout,
        }
    }

    fn failure_status(self) -> DeviceStatus {
        match self {
            Self::Program => DeviceStatus::ProgramFailure,
            Self::Erase => DeviceStatus::EraseFailure,
        }
    }
}

/// Failing samples tolerated before giving up
const FAILURE_LIMIT: u32 = 6;

/// Word program time limit (MX29F800: 360 us max)
pub const PROGRAM_TIMEOUT_USEC: u32 = 360;

impl<B: BusDriver, C: Clock, M: AccessMask> FlashController<B, C, M> {
    /// Wait for a program or erase to finish
    ///
    /// On success the sticky status becomes `Normal`. On failure or timeout
    /// the sticky status is set, the device is reset to read mode and the
    /// status is returned.
    pub fn poll_until_done(
        &mut self,
        timeout_usec: u32,
        mode: PollMode,
    ) -> Result<(), DeviceStatus> {
        self.poll_inner(timeout_usec, mode, false)
    }

    pub(crate) fn poll_inner(
        &mut self,
        timeout_usec: u32,
        mode: PollMode,
        verbose: bool,
    ) -> Result<(), DeviceStatus> {
        let word_mask = self.mode.mask();
        let timeout = u64::from(timeout_usec);
        let start = self.clock.now();
        let mut elapsed = 0;
        let mut sample = 0;
        let mut previous = 0;
        let mut same = 0;
        let mut failures = 0;
        let mut reported_sec = 0;

        while elapsed < timeout {
            elapsed = self.clock.ticks_to_usec(self.clock.now().wrapping_sub(start));
            sample = self.read_word(0) & word_mask;

            if sample == previous {
                same += 1;
                if same > 1 {
                    if verbose {
                        log::info!("{:?} done after {} us", mode, elapsed);
                    }
                    self.status = DeviceStatus::Normal;
                    return Ok(());
                }
            } else {
                if same != 0 {
                    log::trace!("status settled then changed: {:08x}", sample);
                }
                same = 0;
                previous = sample;
            }

            if StatusBits::from_bits_truncate(sample).failed() {
                failures += 1;
                if failures > FAILURE_LIMIT {
                    break;
                }
            }

            if verbose && reported_sec < elapsed / 1_000_000 {
                reported_sec = elapsed / 1_000_000;
                log::info!("{:08x} {} s", sample, reported_sec);
            }
        }

        if verbose {
            let secs = elapsed / 1_000_000;
            log::info!("{:08x} {}.{:03} s", sample, secs, (elapsed % 1_000_000) / 1000);
        }

        let status = if StatusBits::from_bits_truncate(sample).failed() {
            mode.failure_status()
        } else {
            mode.timeout_status()
        };
        log::warn!("{}", status);
        self.status = status;
        self.reset_device();
        Err(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, StepClock};
    use crate::mode::BusWidthMode;
    use crate::FlashController;

    fn controller(mode: BusWidthMode, script: &[u32]) -> FlashController<MockBus, StepClock> {
        let mut ctl = FlashController::new(MockBus::new(), StepClock::new(), mode);
        ctl.enable();
        ctl.bus_mut().clear_ops();
        ctl.bus_mut().push_reads(script.iter().copied());
        ctl
    }

    fn samples(ctl: &FlashController<MockBus, StepClock>) -> usize {
        ctl.bus().read_addresses().len()
    }

    #[test]
    fn test_immediate_completion_takes_two_samples() {
        let mut ctl = controller(BusWidthMode::Mode32, &[0, 0]);
        assert_eq!(ctl.poll_until_done(360, PollMode::Program), Ok(()));
        assert_eq!(samples(&ctl), 2);
        assert!(ctl.bus().read_addresses().iter().all(|&a| a == 0));
    }

    #[test]
    fn test_toggle_then_settle() {
        // A new value has to be seen three times in a row
        let script = [0x40, 0x00, 0x40, 0x1234, 0x1234, 0x1234];
        let mut ctl = controller(BusWidthMode::Mode16Low, &script);
        assert_eq!(ctl.poll_until_done(360, PollMode::Program), Ok(()));
        assert_eq!(samples(&ctl), 6);
        assert_eq!(ctl.status(), DeviceStatus::Normal);
    }

    #[test]
    fn test_settle_then_change() {
        // 0x40 repeats once, then changes; 0x55 must start over
        let script = [0x40, 0x40, 0x00, 0x55, 0x55, 0x55];
        let mut ctl = controller(BusWidthMode::Mode16Low, &script);
        assert_eq!(ctl.poll_until_done(360, PollMode::Program), Ok(()));
        assert_eq!(samples(&ctl), 6);
    }

    #[test]
    fn test_masked_half_is_ignored() {
        // Upper half toggles but nothing is wired there in 16-bit low mode
        let script = [0x0040_0000, 0x0000_0000];
        let mut ctl = controller(BusWidthMode::Mode16Low, &script);
        assert_eq!(ctl.poll_until_done(360, PollMode::Program), Ok(()));
        assert_eq!(samples(&ctl), 2);
    }

    #[test]
    fn test_failure_on_seventh_failing_sample() {
        let script = [0x60, 0x20, 0x60, 0x20, 0x60, 0x20, 0x60, 0x20, 0x60];
        let mut ctl = controller(BusWidthMode::Mode16Low, &script);
        assert_eq!(
            ctl.poll_until_done(360, PollMode::Program),
            Err(DeviceStatus::ProgramFailure)
        );
        // Seven status samples, then the reset cycles
        assert_eq!(samples(&ctl), 7);
        assert_eq!(ctl.status(), DeviceStatus::ProgramFailure);
        assert_eq!(
            ctl.bus().writes(),
            [(0, 0xf0), (0x555, 0xf0)]
        );
    }

    #[test]
    fn test_high_half_failure_bit() {
        let toggling = [0x0060_0000, 0x0020_0000];
        let script: std::vec::Vec<u32> = toggling.iter().copied().cycle().take(7).collect();
        let mut ctl = controller(BusWidthMode::Mode16High, &script);
        assert_eq!(
            ctl.poll_until_done(1_000_000, PollMode::Erase),
            Err(DeviceStatus::EraseFailure)
        );
    }

    #[test]
    fn test_timeout() {
        let toggling: std::vec::Vec<u32> = [0x40, 0x00].iter().copied().cycle().take(100_000).collect();
        let mut ctl = controller(BusWidthMode::Mode16Low, &toggling);
        assert_eq!(
            ctl.poll_until_done(20, PollMode::Program),
            Err(DeviceStatus::ProgramTimeout)
        );
        assert_eq!(ctl.status(), DeviceStatus::ProgramTimeout);
        assert!(samples(&ctl) > 2);
    }

    #[test]
    fn test_status_bits() {
        assert!(StatusBits::from_bits_truncate(0x0020_0000).failed());
        assert!(StatusBits::from_bits_truncate(0x20).failed());
        assert!(!StatusBits::from_bits_truncate(0x00c0_00c0).failed());
    }
}
