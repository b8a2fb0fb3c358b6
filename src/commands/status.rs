//! Status command implementation

use kicksmash_core::bus::BusDriver;
use kicksmash_core::hal::{AccessMask, Clock};
use kicksmash_core::FlashController;

/// Run the status command
pub fn run_status<B: BusDriver, C: Clock, M: AccessMask>(
    flash: &mut FlashController<B, C, M>,
    clear: bool,
) {
    let status = flash.status();
    println!("Status: {} ({})", status, status.code());
    println!("Bus: {:?}", flash.state());
    if let Some(standalone) = flash.is_standalone() {
        println!(
            "Board: {}",
            if standalone { "standalone" } else { "installed in host" }
        );
    }
    if clear {
        flash.clear_status();
        println!("Status cleared");
    }
}
