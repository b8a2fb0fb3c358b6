//! Read, program and erase
//!
//! These are the operations the host command dispatcher calls. Every one
//! checks its range against the device before touching the bus and
//! re-enables the bus if it was released.

use crate::bus::BusDriver;
use crate::controller::{FlashController, DEVICE_WORDS};
use crate::error::{Error, Result};
use crate::hal::{AccessMask, Clock};
use crate::poll::{PollMode, PROGRAM_TIMEOUT_USEC};
use crate::protocol::commands;
use crate::status::DeviceStatus;

/// What an erase covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum EraseMode {
    /// The whole device; address and length are ignored
    Chip,
    /// Every sector touching the given range (at least one)
    Sector,
}

/// Extra program attempts per word, shared by both retry reasons
const PROGRAM_RETRIES: u32 = 2;

/// MX29F800 chip erase limit
const CHIP_ERASE_TIMEOUT_USEC: u32 = 32_000_000;

/// Sector erase budget: a base plus this much per queued sector
const SECTOR_ERASE_TIMEOUT_USEC: u32 = 1_000_000;

/// Sector erase load window (tBAL) before polling starts
const ERASE_LOAD_USEC: u64 = 100;

fn check_range(addr: u32, len: usize) -> Result<()> {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    match addr.checked_add(len) {
        Some(end) if end <= DEVICE_WORDS => Ok(()),
        _ => Err(Error::BadRange { addr, len }),
    }
}

impl<B: BusDriver, C: Clock, M: AccessMask> FlashController<B, C, M> {
    /// Read `buf.len()` words starting at word address `addr`
    ///
    /// In the 16-bit modes each word carries the 16 bits of the addressed
    /// half in its low bits.
    pub fn read(&mut self, addr: u32, buf: &mut [u32]) -> Result<()> {
        check_range(addr, buf.len())?;
        self.ensure_enabled();

        let mode = self.mode;
        self.quiesced(|ctl| {
            for (word_addr, word) in (addr..).zip(buf.iter_mut()) {
                *word = mode.from_bus(ctl.read_word(word_addr));
            }
        });
        Ok(())
    }

    /// Read `len` words into a new vector
    #[cfg(feature = "alloc")]
    pub fn read_to_vec(&mut self, addr: u32, len: usize) -> Result<alloc::vec::Vec<u32>> {
        check_range(addr, len)?;
        let mut buf = alloc::vec![0; len];
        self.read(addr, &mut buf)?;
        Ok(buf)
    }

    /// Program `words` starting at word address `addr`, verifying each
    ///
    /// The target must be erased (or only need bits cleared). A word whose
    /// poll fails, or that reads back with bits still set that should have
    /// been cleared, is programmed again up to twice.
    pub fn write(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        check_range(addr, words.len())?;
        self.ensure_enabled();

        for (word_addr, &word) in (addr..).zip(words) {
            self.program_verified(word_addr, word)?;
        }

        self.read_mode();
        Ok(())
    }

    fn program_verified(&mut self, addr: u32, word: u32) -> Result<()> {
        let mode = self.mode;
        let mask = mode.mask();
        let value = mode.to_bus(word);
        let mut attempts = 0;

        loop {
            if let Err(status) = self.program_word(addr, value) {
                if attempts < PROGRAM_RETRIES {
                    attempts += 1;
                    log::debug!("program failed at 0x{:05x}, retrying", addr);
                    continue;
                }
                return Err(Error::ProgramFailed { addr, status });
            }

            let found = self.read_word(addr);
            let diff = (value ^ found) & mask;
            if diff == 0 {
                return Ok(());
            }

            // Bits still reading 1 can be programmed again; a 0 that
            // should be 1 needs an erase
            if attempts < PROGRAM_RETRIES && diff & !found == 0 {
                attempts += 1;
                log::debug!("program mismatch at 0x{:05x}, retrying", addr);
                continue;
            }

            self.read_mode();
            return Err(Error::ProgramMismatch {
                addr,
                expected: mode.from_bus(value),
                found: mode.from_bus(found),
            });
        }
    }

    fn program_word(&mut self, addr: u32, value: u32) -> core::result::Result<(), DeviceStatus> {
        self.touch();
        self.quiesced(|ctl| {
            ctl.unlock();
            ctl.write_word(commands::UNLOCK1_ADDR, commands::PROGRAM);
            ctl.write_word(addr, value);
        });
        self.poll_until_done(PROGRAM_TIMEOUT_USEC, PollMode::Program)
    }

    /// Erase the chip, or the sectors covering `[addr, addr + len)`
    ///
    /// In sector mode `len == 0` erases the one sector containing `addr`.
    /// The erase geometry comes from the identified chip. Erases are not
    /// retried; the device is back in read mode whatever the outcome.
    pub fn erase(&mut self, mode: EraseMode, addr: u32, len: u32) -> Result<()> {
        let end = match mode {
            EraseMode::Chip => DEVICE_WORDS,
            EraseMode::Sector => match addr.checked_add(len.max(1)) {
                Some(end) if end <= DEVICE_WORDS => end,
                _ => return Err(Error::BadRange { addr, len }),
            },
        };
        self.ensure_enabled();

        let info = self.identify().block_info();
        log::debug!("erase geometry from {}", info.name);
        self.clear_status();

        self.touch();
        let timeout = self.quiesced(|ctl| {
            ctl.erase_preamble();
            match mode {
                EraseMode::Chip => {
                    ctl.write_word(commands::UNLOCK1_ADDR, commands::CHIP_ERASE);
                    CHIP_ERASE_TIMEOUT_USEC
                }
                EraseMode::Sector => {
                    let mut timeout = SECTOR_ERASE_TIMEOUT_USEC;
                    for sector in info.sectors(addr, end) {
                        log::debug!(
                            "erase sector 0x{:05x} ({}K words)",
                            sector.start,
                            sector.words >> 10
                        );
                        ctl.write_word(sector.start, commands::SECTOR_ERASE);
                        timeout = timeout.saturating_add(SECTOR_ERASE_TIMEOUT_USEC);
                    }
                    timeout
                }
            }
        });

        self.clock.delay_usec(ERASE_LOAD_USEC);
        let result = self.poll_inner(timeout, PollMode::Erase, true);
        self.read_mode();

        result.map_err(|status| match status {
            DeviceStatus::EraseFailure => Error::EraseFailure { addr },
            _ => Error::EraseTimeout { addr },
        })
    }

    fn erase_preamble(&mut self) {
        self.unlock();
        self.write_word(commands::UNLOCK1_ADDR, commands::ERASE_SETUP);
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BusOp, MockBus, StepClock};
    use crate::mode::BusWidthMode;
    use crate::BusState;
    use std::vec::Vec;

    type TestController = FlashController<MockBus, StepClock>;

    fn idle(mode: BusWidthMode) -> TestController {
        FlashController::new(MockBus::new(), StepClock::new(), mode)
    }

    fn enabled(mode: BusWidthMode) -> TestController {
        let mut ctl = idle(mode);
        ctl.enable();
        ctl.bus_mut().clear_ops();
        ctl
    }

    fn program_count(ctl: &TestController) -> usize {
        let writes = ctl.bus().writes();
        writes
            .windows(3)
            .filter(|w| w[0].0 == 0x555 && w[1].0 == 0x2aa && w[2] == (0x555, 0xa0))
            .count()
    }

    #[test]
    fn test_out_of_range_touches_nothing() {
        let mut ctl = idle(BusWidthMode::Mode32);
        let mut buf = [0u32; 4];
        assert_eq!(
            ctl.read(DEVICE_WORDS - 2, &mut buf),
            Err(Error::BadRange { addr: DEVICE_WORDS - 2, len: 4 })
        );
        assert!(matches!(ctl.write(DEVICE_WORDS, &[1]), Err(Error::BadRange { .. })));
        assert!(matches!(ctl.write(u32::MAX, &[1]), Err(Error::BadRange { .. })));
        assert!(matches!(
            ctl.erase(EraseMode::Sector, DEVICE_WORDS, 0),
            Err(Error::BadRange { .. })
        ));
        assert!(matches!(
            ctl.erase(EraseMode::Sector, DEVICE_WORDS - 1, 2),
            Err(Error::BadRange { .. })
        ));
        assert!(ctl.bus().ops().is_empty());
        assert_eq!(ctl.state(), BusState::Disabled);
    }

    #[test]
    fn test_read_last_word_is_in_range() {
        let mut ctl = idle(BusWidthMode::Mode32);
        let mut buf = [0u32; 1];
        ctl.read(DEVICE_WORDS - 1, &mut buf).unwrap();
    }

    #[test]
    fn test_read_framing() {
        let mut ctl = enabled(BusWidthMode::Mode16High);
        ctl.bus_mut().push_reads([0x1234_5678, 0x9abc_def0]);
        let mut buf = [0u32; 2];
        ctl.read(0x100, &mut buf).unwrap();
        assert_eq!(buf, [0x1234, 0x9abc]);
        assert_eq!(ctl.bus().read_addresses(), [0x100, 0x101]);

        let mut ctl = enabled(BusWidthMode::Mode16Low);
        ctl.bus_mut().push_reads([0x1234_5678]);
        let mut buf = [0u32; 1];
        ctl.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0x5678]);
    }

    #[test]
    fn test_write_sequence() {
        let mut ctl = enabled(BusWidthMode::Mode16Low);
        // Poll settles on 0 twice, then read-back
        ctl.bus_mut().push_reads([0, 0, 0xbeef]);
        ctl.write(0x40, &[0xbeef]).unwrap();
        assert_eq!(
            ctl.bus().writes(),
            [
                (0x555, 0xaa),
                (0x2aa, 0x55),
                (0x555, 0xa0),
                (0x40, 0xbeef),
                (0x555, 0xf0),
            ]
        );
        assert_eq!(ctl.bus().read_addresses(), [0, 0, 0x40]);
    }

    #[test]
    fn test_write_high_half() {
        let mut ctl = enabled(BusWidthMode::Mode16High);
        ctl.bus_mut().push_reads([0, 0, 0xbeef_0000]);
        ctl.write(0x40, &[0xbeef]).unwrap();
        assert!(ctl.bus().writes().contains(&(0x40, 0xbeef_0000)));
    }

    #[test]
    fn test_mismatch_with_set_bits_is_retried() {
        let mut ctl = enabled(BusWidthMode::Mode16Low);
        ctl.bus_mut().push_reads([0, 0, 0x12ff, 0, 0, 0x1200]);
        ctl.write(0, &[0x1200]).unwrap();
        assert_eq!(program_count(&ctl), 2);
    }

    #[test]
    fn test_mismatch_with_cleared_bit_fails() {
        let mut ctl = enabled(BusWidthMode::Mode16Low);
        ctl.bus_mut().push_reads([0, 0, 0x00fe]);
        assert_eq!(
            ctl.write(7, &[0x00ff]),
            Err(Error::ProgramMismatch { addr: 7, expected: 0x00ff, found: 0x00fe })
        );
        assert_eq!(program_count(&ctl), 1);
    }

    #[test]
    fn test_mismatch_retries_are_bounded() {
        let mut ctl = enabled(BusWidthMode::Mode16Low);
        ctl.bus_mut().push_reads([0, 0, 0xffff, 0, 0, 0xffff, 0, 0, 0xffff]);
        assert_eq!(
            ctl.write(3, &[0]),
            Err(Error::ProgramMismatch { addr: 3, expected: 0, found: 0xffff })
        );
        assert_eq!(program_count(&ctl), 3);
    }

    #[test]
    fn test_poll_failure_is_retried() {
        let mut ctl = enabled(BusWidthMode::Mode16Low);
        let failing = [0x60, 0x20, 0x60, 0x20, 0x60, 0x20, 0x60];
        ctl.bus_mut().push_reads(failing);
        ctl.bus_mut().push_reads([0, 0, 0x5a5a]);
        ctl.write(0x10, &[0x5a5a]).unwrap();
        assert_eq!(program_count(&ctl), 2);
        // The good poll cleared the sticky status again
        assert_eq!(ctl.status(), DeviceStatus::Normal);
    }

    #[test]
    fn test_poll_failures_exhaust_attempts() {
        let mut ctl = enabled(BusWidthMode::Mode16Low);
        for _ in 0..3 {
            ctl.bus_mut().push_reads([0x60, 0x20, 0x60, 0x20, 0x60, 0x20, 0x60]);
        }
        assert_eq!(
            ctl.write(0x10, &[0x5a5a]),
            Err(Error::ProgramFailed { addr: 0x10, status: DeviceStatus::ProgramFailure })
        );
        assert_eq!(program_count(&ctl), 3);
        assert_eq!(ctl.status(), DeviceStatus::ProgramFailure);
    }

    fn sector_erase_writes(ctl: &TestController) -> Vec<u32> {
        ctl.bus()
            .writes()
            .iter()
            .filter(|&&(_, data)| data == 0x30)
            .map(|&(addr, _)| addr)
            .collect()
    }

    fn erase_controller() -> TestController {
        let mut ctl = enabled(BusWidthMode::Mode16Low);
        // Autoselect: M29F160FB, then an immediately finished erase
        ctl.bus_mut().push_reads([0x0001, 0x22d8, 0, 0]);
        ctl
    }

    #[test]
    fn test_erase_zero_length_is_one_sector() {
        let mut ctl = erase_controller();
        ctl.erase(EraseMode::Sector, 0x2345, 0).unwrap();
        assert_eq!(sector_erase_writes(&ctl), [0x2000]);
    }

    #[test]
    fn test_erase_covers_range() {
        let mut ctl = erase_controller();
        ctl.erase(EraseMode::Sector, 0x1000, 0x3000).unwrap();
        assert_eq!(sector_erase_writes(&ctl), [0x0000, 0x2000, 0x3000]);

        let mut ctl = erase_controller();
        ctl.erase(EraseMode::Sector, 0x7fff, 2).unwrap();
        assert_eq!(sector_erase_writes(&ctl), [0x4000, 0x8000]);
    }

    #[test]
    fn test_erase_command_stream() {
        let mut ctl = erase_controller();
        ctl.erase(EraseMode::Chip, 0x1234, 99).unwrap();
        let writes = ctl.bus().writes();
        let tail = &writes[writes.len() - 7..];
        assert_eq!(
            tail,
            [
                (0x555, 0xaa),
                (0x2aa, 0x55),
                (0x555, 0x80),
                (0x555, 0xaa),
                (0x2aa, 0x55),
                (0x555, 0x10),
                (0x555, 0xf0),
            ]
        );
    }

    #[test]
    fn test_erase_failure_is_reported() {
        let mut ctl = enabled(BusWidthMode::Mode16Low);
        ctl.bus_mut().push_reads([0x0001, 0x22d8]);
        ctl.bus_mut().push_reads([0x60, 0x20, 0x60, 0x20, 0x60, 0x20, 0x60]);
        assert_eq!(
            ctl.erase(EraseMode::Sector, 0x8000, 0),
            Err(Error::EraseFailure { addr: 0x8000 })
        );
        assert_eq!(ctl.status(), DeviceStatus::EraseFailure);
        // Device left in read mode
        assert_eq!(ctl.bus().writes().last(), Some(&(0x555, 0xf0)));
    }

    #[test]
    fn test_operations_reenable_bus() {
        let mut ctl = enabled(BusWidthMode::Mode32);
        ctl.disable();
        ctl.bus_mut().clear_ops();

        let mut buf = [0u32; 1];
        ctl.read(0, &mut buf).unwrap();
        assert_eq!(ctl.state(), BusState::Enabled);
        assert_eq!(ctl.bus().ops()[1], BusOp::EnableAddress);
    }
}
