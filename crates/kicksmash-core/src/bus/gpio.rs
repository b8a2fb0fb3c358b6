//! Bus driver on top of port+mask GPIO primitives
//!
//! [`GpioPorts`] is the only thing a board has to provide: set a pin mode,
//! set levels and read levels for a set of pins on one port. [`GpioBus`]
//! turns logical address/data words into per-port masks through a
//! [`PinMap`] computed once at construction.

use super::pins::{Pin, PinMap, PinMapError, Port, ADDRESS_LINES, DATA_LINES, PORT_COUNT};
use super::BusDriver;

/// Electrical mode of a GPIO pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Floating input
    Input,
    /// Input with weak pull; the output latch picks up (1) or down (0)
    InputPull,
    /// Push-pull output
    Output,
}

/// Port-level GPIO access
pub trait GpioPorts {
    /// Configure the pins in `mask`
    fn set_mode(&mut self, port: Port, mask: u16, mode: PinMode);

    /// Set the output latch of the pins in `mask` to the bits of `value`
    fn set(&mut self, port: Port, mask: u16, value: u16);

    /// Read the input levels of the pins in `mask`
    fn get(&mut self, port: Port, mask: u16) -> u16;
}

impl<P: GpioPorts + ?Sized> GpioPorts for &mut P {
    fn set_mode(&mut self, port: Port, mask: u16, mode: PinMode) {
        (**self).set_mode(port, mask, mode)
    }

    fn set(&mut self, port: Port, mask: u16, value: u16) {
        (**self).set(port, mask, value)
    }

    fn get(&mut self, port: Port, mask: u16) -> u16 {
        (**self).get(port, mask)
    }
}

/// A group of logical lines and the port masks they occupy
#[derive(Debug, Clone)]
struct LineGroup<const N: usize> {
    pins: [Pin; N],
    masks: [u16; PORT_COUNT],
}

impl<const N: usize> LineGroup<N> {
    fn new(pins: [Pin; N]) -> Self {
        let mut masks = [0u16; PORT_COUNT];
        for pin in &pins {
            masks[pin.port.index()] |= pin.mask();
        }
        Self { pins, masks }
    }

    fn scatter(&self, value: u32) -> [u16; PORT_COUNT] {
        let mut levels = [0u16; PORT_COUNT];
        for (bit, pin) in self.pins.iter().enumerate() {
            if (value >> bit) & 1 != 0 {
                levels[pin.port.index()] |= pin.mask();
            }
        }
        levels
    }

    fn gather(&self, levels: &[u16; PORT_COUNT]) -> u32 {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| levels[pin.port.index()] & pin.mask() != 0)
            .fold(0, |acc, (bit, _)| acc | (1 << bit))
    }

    fn write<P: GpioPorts>(&self, ports: &mut P, value: u32) {
        let levels = self.scatter(value);
        for port in Port::ALL {
            let mask = self.masks[port.index()];
            if mask != 0 {
                ports.set(port, mask, levels[port.index()]);
            }
        }
    }

    fn read<P: GpioPorts>(&self, ports: &mut P) -> u32 {
        let mut levels = [0u16; PORT_COUNT];
        for port in Port::ALL {
            let mask = self.masks[port.index()];
            if mask != 0 {
                levels[port.index()] = ports.get(port, mask);
            }
        }
        self.gather(&levels)
    }

    fn set_mode<P: GpioPorts>(&self, ports: &mut P, mode: PinMode) {
        for port in Port::ALL {
            let mask = self.masks[port.index()];
            if mask != 0 {
                ports.set_mode(port, mask, mode);
            }
        }
    }
}

/// [`BusDriver`] implemented over [`GpioPorts`] and a [`PinMap`]
pub struct GpioBus<P> {
    ports: P,
    address: LineGroup<ADDRESS_LINES>,
    data: LineGroup<DATA_LINES>,
    write_enable: Pin,
    output_enable: Pin,
    socket_output_enable: Pin,
}

impl<P: GpioPorts> GpioBus<P> {
    /// Build a bus driver for the given wiring
    ///
    /// WE# is configured as a driven-high output right away; every other
    /// line starts as it was left by reset until the controller enables
    /// the bus.
    pub fn new(mut ports: P, map: &PinMap) -> Result<Self, PinMapError> {
        map.validate()?;

        let we = map.write_enable;
        ports.set(we.port, we.mask(), we.mask());
        ports.set_mode(we.port, we.mask(), PinMode::Output);

        Ok(Self {
            ports,
            address: LineGroup::new(map.address),
            data: LineGroup::new(map.data),
            write_enable: we,
            output_enable: map.output_enable,
            socket_output_enable: map.socket_output_enable,
        })
    }

    /// Access the underlying ports
    pub fn ports(&self) -> &P {
        &self.ports
    }

    /// Mutable access to the underlying ports
    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }

    /// Give the ports back
    pub fn into_inner(self) -> P {
        self.ports
    }

    fn set_pin(&mut self, pin: Pin, high: bool) {
        let value = if high { pin.mask() } else { 0 };
        self.ports.set(pin.port, pin.mask(), value);
    }
}

impl<P: GpioPorts> BusDriver for GpioBus<P> {
    fn set_address(&mut self, addr: u32) {
        self.address.write(&mut self.ports, addr);
    }

    fn read_address(&mut self) -> u32 {
        self.address.read(&mut self.ports)
    }

    fn set_data(&mut self, data: u32) {
        self.data.write(&mut self.ports, data);
    }

    fn read_data(&mut self) -> u32 {
        self.data.read(&mut self.ports)
    }

    fn enable_address_output(&mut self) {
        self.address.set_mode(&mut self.ports, PinMode::Output);
    }

    fn disable_address_output(&mut self) {
        self.address.set_mode(&mut self.ports, PinMode::InputPull);
        self.address.write(&mut self.ports, 0);
    }

    fn float_address_lines(&mut self) {
        self.address.set_mode(&mut self.ports, PinMode::Input);
    }

    fn enable_data_output(&mut self) {
        self.data.set_mode(&mut self.ports, PinMode::Output);
    }

    fn disable_data_output(&mut self) {
        self.data.set_mode(&mut self.ports, PinMode::InputPull);
        self.data.write(&mut self.ports, 0);
    }

    fn set_write_enable(&mut self, high: bool) {
        self.set_pin(self.write_enable, high);
    }

    fn set_output_enable(&mut self, high: bool) {
        self.set_pin(self.output_enable, high);
    }

    fn enable_output_enable_drive(&mut self) {
        let oe = self.output_enable;
        self.ports.set_mode(oe.port, oe.mask(), PinMode::Output);
    }

    fn disable_output_enable_drive(&mut self) {
        let oe = self.output_enable;
        self.ports.set_mode(oe.port, oe.mask(), PinMode::Input);
    }

    fn read_socket_output_enable(&mut self) -> bool {
        let pin = self.socket_output_enable;
        self.ports.get(pin.port, pin.mask()) != 0
    }
}
