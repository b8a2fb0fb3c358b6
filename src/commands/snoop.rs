//! Snoop command implementation

use kicksmash_core::bus::BusDriver;
use kicksmash_core::hal::{AccessMask, Clock};
use kicksmash_core::FlashController;
use std::fmt;
use std::io::Write;

use crate::error::Result;

/// Forwards snoop output to stdout as it is produced
struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut out = std::io::stdout().lock();
        out.write_all(s.as_bytes()).map_err(|_| fmt::Error)?;
        out.flush().map_err(|_| fmt::Error)
    }
}

/// Run the snoop command
///
/// Stops at the `checks`-th stop check, i.e. after that many flushes of an
/// idle bus or long runs of host activity.
pub fn run_snoop<B: BusDriver, C: Clock, M: AccessMask>(
    flash: &mut FlashController<B, C, M>,
    checks: u32,
) -> Result<()> {
    let mut remaining = checks.max(1);
    flash.snoop(&mut Console, || {
        remaining -= 1;
        remaining == 0
    })?;
    Ok(())
}
