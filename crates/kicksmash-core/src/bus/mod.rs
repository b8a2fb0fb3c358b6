//! Bus driver: the electrical layer under the controller
//!
//! The controller only ever talks to the flash through [`BusDriver`]. Values
//! are logical: bit N of an address is line A<N>, bit N of a data word is
//! line D<N>. How those lines land on MCU pins is the driver's business; the
//! GPIO implementation in [`gpio`] does it through a [`PinMap`].
//!
//! ## Pull semantics
//!
//! While a direction is disabled its lines are inputs with a weak pull, and
//! the value last given to `set_address`/`set_data` selects the pull per line
//! (1 = pull-up, 0 = pull-down). This mirrors the STM32F1 GPIO block, where
//! the output data register picks the pull direction of an input, and it is
//! what the connectivity self-test relies on.

pub mod gpio;
pub mod pins;

pub use gpio::{GpioBus, GpioPorts, PinMode};
pub use pins::{Pin, PinMap, PinMapError, Port, Signal, ADDRESS_LINES, DATA_LINES, PORT_COUNT};

/// Mask covering all address lines
pub const ADDRESS_MASK: u32 = (1 << ADDRESS_LINES) - 1;

/// Line-level access to the flash socket
///
/// This is a pure hardware-effect layer and never fails. Control lines are
/// active low; `high == true` means the line is deasserted.
pub trait BusDriver {
    /// Put an address on A0-A19 (or select pulls while address output is off)
    fn set_address(&mut self, addr: u32);

    /// Sample A0-A19
    fn read_address(&mut self) -> u32;

    /// Put a word on D0-D31 (or select pulls while data output is off)
    fn set_data(&mut self, data: u32);

    /// Sample D0-D31
    fn read_data(&mut self) -> u32;

    /// Drive the address lines
    fn enable_address_output(&mut self);

    /// Stop driving the address lines; they return to pull-down
    fn disable_address_output(&mut self);

    /// Leave the address lines fully floating
    ///
    /// Used when the board turns out to be installed in a host system whose
    /// own address drivers must not fight our pulls.
    fn float_address_lines(&mut self);

    /// Drive the data lines
    fn enable_data_output(&mut self);

    /// Stop driving the data lines; they return to pull-down
    fn disable_data_output(&mut self);

    /// Set the level of WE#
    fn set_write_enable(&mut self, high: bool);

    /// Set the level of OE# (takes effect on the pin while OE# is driven)
    fn set_output_enable(&mut self, high: bool);

    /// Drive OE#
    fn enable_output_enable_drive(&mut self);

    /// Release OE#
    fn disable_output_enable_drive(&mut self);

    /// Sample OE# as asserted by the host system on the ROM socket
    fn read_socket_output_enable(&mut self) -> bool;
}

impl<B: BusDriver + ?Sized> BusDriver for &mut B {
    fn set_address(&mut self, addr: u32) {
        (**self).set_address(addr)
    }

    fn read_address(&mut self) -> u32 {
        (**self).read_address()
    }

    fn set_data(&mut self, data: u32) {
        (**self).set_data(data)
    }

    fn read_data(&mut self) -> u32 {
        (**self).read_data()
    }

    fn enable_address_output(&mut self) {
        (**self).enable_address_output()
    }

    fn disable_address_output(&mut self) {
        (**self).disable_address_output()
    }

    fn float_address_lines(&mut self) {
        (**self).float_address_lines()
    }

    fn enable_data_output(&mut self) {
        (**self).enable_data_output()
    }

    fn disable_data_output(&mut self) {
        (**self).disable_data_output()
    }

    fn set_write_enable(&mut self, high: bool) {
        (**self).set_write_enable(high)
    }

    fn set_output_enable(&mut self, high: bool) {
        (**self).set_output_enable(high)
    }

    fn enable_output_enable_drive(&mut self) {
        (**self).enable_output_enable_drive()
    }

    fn disable_output_enable_drive(&mut self) {
        (**self).disable_output_enable_drive()
    }

    fn read_socket_output_enable(&mut self) -> bool {
        (**self).read_socket_output_enable()
    }
}
