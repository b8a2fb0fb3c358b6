//! AMD-style command protocol
//!
//! Most commands must be preceded by the two unlock cycles. Commands are
//! given in both-halves form (`0x00aa00aa`) so a stacked pair of 16-bit
//! devices receives them together; the word mask of the active mode drops
//! the half that has no device behind it.

use crate::bus::BusDriver;
use crate::controller::FlashController;
use crate::hal::{AccessMask, Clock};

/// Command words and the addresses they go to
pub mod commands {
    /// First unlock cycle address
    pub const UNLOCK1_ADDR: u32 = 0x555;
    /// Second unlock cycle address
    pub const UNLOCK2_ADDR: u32 = 0x2aa;
    /// First unlock cycle data
    pub const UNLOCK1: u32 = 0x00aa_00aa;
    /// Second unlock cycle data
    pub const UNLOCK2: u32 = 0x0055_0055;

    /// Program one word
    pub const PROGRAM: u32 = 0x00a0_00a0;
    /// Erase setup, followed by a second unlock and the erase command
    pub const ERASE_SETUP: u32 = 0x0080_0080;
    /// Erase the whole chip
    pub const CHIP_ERASE: u32 = 0x0010_0010;
    /// Erase one sector (written to the sector address)
    pub const SECTOR_ERASE: u32 = 0x0030_0030;
    /// Autoselect (manufacturer/device id)
    pub const AUTOSELECT: u32 = 0x0090_0090;
    /// Return to read array mode
    pub const READ_RESET: u32 = 0x00f0_00f0;

    /// CFI query
    pub const CFI_QUERY: u32 = 0x98;
    /// Erase suspend
    pub const ERASE_SUSPEND: u32 = 0xb0;
    /// Erase resume
    pub const ERASE_RESUME: u32 = 0x30;

    /// Whether a command is accepted without the unlock cycles
    pub const fn is_unlock_free(cmd: u32) -> bool {
        matches!(
            cmd & 0xffff,
            CFI_QUERY | 0xf0 | ERASE_SUSPEND | ERASE_RESUME
        )
    }
}

/// Time for a command to take effect
const COMMAND_SETTLE_USEC: u64 = 2;

impl<B: BusDriver, C: Clock, M: AccessMask> FlashController<B, C, M> {
    /// Send a command to the device
    ///
    /// Bare 16-bit commands are replicated into the upper half in the
    /// 32-bit and 16-bit-high modes. Everything except CFI query,
    /// read/reset, erase suspend and erase resume is preceded by the unlock
    /// cycles, with the asynchronous bus user masked for the whole sequence.
    pub fn send_command(&mut self, addr: u32, cmd: u32) {
        self.ensure_enabled();
        self.touch();

        let cmd = self.mode.widen_command(cmd);
        if commands::is_unlock_free(cmd) {
            self.write_word(addr, cmd);
        } else {
            self.quiesced(|ctl| {
                ctl.unlock();
                ctl.write_word(addr, cmd);
            });
        }
        self.clock.delay_usec(COMMAND_SETTLE_USEC);
    }

    /// The two unlock cycles; callers hold the access mask
    pub(crate) fn unlock(&mut self) {
        self.write_word(commands::UNLOCK1_ADDR, commands::UNLOCK1);
        self.write_word(commands::UNLOCK2_ADDR, commands::UNLOCK2);
    }

    /// Put the device back in read array mode
    pub fn read_mode(&mut self) {
        self.send_command(commands::UNLOCK1_ADDR, commands::READ_RESET);
    }

    /// Reset the device out of any failed program/erase state
    pub(crate) fn reset_device(&mut self) {
        self.send_command(0, commands::READ_RESET);
        self.read_mode();
    }

    /// Reset the device and forget the sticky status
    pub fn clear_status(&mut self) {
        self.reset_device();
        self.status = crate::status::DeviceStatus::Normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, StepClock};
    use crate::mode::BusWidthMode;
    use crate::status::DeviceStatus;

    #[derive(Default)]
    struct CountingMask {
        depth: i32,
        max_depth: i32,
        sections: u32,
    }

    impl AccessMask for CountingMask {
        fn mask(&mut self) {
            self.depth += 1;
            self.max_depth = self.max_depth.max(self.depth);
            self.sections += 1;
        }

        fn unmask(&mut self) {
            self.depth -= 1;
        }
    }

    fn enabled(mode: BusWidthMode) -> FlashController<MockBus, StepClock, CountingMask> {
        let mut ctl =
            FlashController::with_mask(MockBus::new(), StepClock::new(), CountingMask::default(), mode);
        ctl.enable();
        ctl.bus_mut().clear_ops();
        ctl.access_mask.sections = 0;
        ctl
    }

    #[test]
    fn test_unlocked_command() {
        let mut ctl = enabled(BusWidthMode::Mode32);
        ctl.send_command(0x555, commands::AUTOSELECT);
        assert_eq!(
            ctl.bus().writes(),
            [(0x555, 0x00aa_00aa), (0x2aa, 0x0055_0055), (0x555, 0x0090_0090)]
        );
        assert_eq!(ctl.access_mask.sections, 1);
        assert_eq!(ctl.access_mask.depth, 0);
    }

    #[test]
    fn test_unlock_free_commands() {
        for cmd in [0xf0, 0x98, 0xb0, 0x30] {
            let mut ctl = enabled(BusWidthMode::Mode32);
            ctl.send_command(0x1234, cmd);
            assert_eq!(ctl.bus().writes(), [(0x1234, cmd | (cmd << 16))]);
            assert_eq!(ctl.access_mask.sections, 0);
        }
    }

    #[test]
    fn test_sixteen_bit_masking() {
        let mut ctl = enabled(BusWidthMode::Mode16Low);
        ctl.send_command(0x555, 0xf0);
        assert_eq!(ctl.bus().writes(), [(0x555, 0xf0)]);

        let mut ctl = enabled(BusWidthMode::Mode16High);
        ctl.send_command(0x555, commands::AUTOSELECT);
        assert_eq!(
            ctl.bus().writes(),
            [(0x555, 0x00aa_0000), (0x2aa, 0x0055_0000), (0x555, 0x0090_0000)]
        );
    }

    #[test]
    fn test_command_updates_last_access() {
        let mut ctl = enabled(BusWidthMode::Mode32);
        ctl.last_access = None;
        ctl.send_command(0, commands::READ_RESET);
        assert!(ctl.last_access.is_some());
    }

    #[test]
    fn test_command_reenables_bus() {
        let mut ctl = enabled(BusWidthMode::Mode32);
        ctl.disable();
        ctl.bus_mut().clear_ops();
        ctl.send_command(0x555, commands::READ_RESET);
        assert_eq!(ctl.state(), crate::BusState::Enabled);
        // Enable issues its own read/reset before ours
        assert_eq!(
            ctl.bus().writes(),
            [(0x555, 0x00f0_00f0), (0x555, 0x00f0_00f0)]
        );
    }

    #[test]
    fn test_clear_status() {
        let mut ctl = enabled(BusWidthMode::Mode32);
        ctl.status = DeviceStatus::ProgramFailure;
        ctl.clear_status();
        assert_eq!(ctl.status(), DeviceStatus::Normal);
        assert_eq!(
            ctl.bus().writes(),
            [(0, 0x00f0_00f0), (0x555, 0x00f0_00f0)]
        );
    }
}
