//! Self-test command implementation

use kicksmash_core::bus::BusDriver;
use kicksmash_core::hal::{AccessMask, Clock};
use kicksmash_core::FlashController;

use crate::error::{CliError, Result};

/// Run the selftest command
///
/// With `lines` set, the pull-up passes stop once that many lines were tested.
pub fn run_selftest<B: BusDriver, C: Clock, M: AccessMask>(
    flash: &mut FlashController<B, C, M>,
    verbose: bool,
    lines: Option<u32>,
) -> Result<()> {
    let standalone = flash.check_standalone();
    if !standalone {
        println!("Board is installed in a host system; skipping line test");
        return Ok(());
    }

    let mut tested = 0u32;
    let stop = || {
        let done = lines.is_some_and(|limit| tested >= limit);
        tested += 1;
        done
    };

    match flash.verify_connectivity(verbose, stop) {
        Ok(()) => {
            println!("All address and data lines pass");
            Ok(())
        }
        Err(faults) => {
            for fault in &faults {
                println!("FAIL: {}", fault);
            }
            Err(CliError::SelfTest(faults.len()))
        }
    }
}
