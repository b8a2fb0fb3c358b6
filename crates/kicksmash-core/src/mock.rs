//! Scripted bus and stepping clock for unit tests

use core::cell::Cell;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::bus::BusDriver;
use crate::hal::Clock;

/// One recorded bus driver call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    SetAddress(u32),
    ReadAddress,
    SetData(u32),
    ReadData,
    EnableAddress,
    DisableAddress,
    FloatAddress,
    EnableData,
    DisableData,
    SetWriteEnable(bool),
    SetOutputEnable(bool),
    EnableOutputEnable,
    DisableOutputEnable,
    ReadSocketOutputEnable,
}

/// Records every call; reads come from a script, then from the latches
///
/// Once a script runs dry, address and data reads return the last value
/// set on them (what a pulled or driven line would show), with the stuck
/// and tied line masks applied.
#[derive(Debug, Default)]
pub struct MockBus {
    ops: Vec<BusOp>,
    data_reads: VecDeque<u32>,
    address_reads: VecDeque<u32>,
    socket_oe: VecDeque<bool>,
    address: u32,
    data: u32,
    pub stuck_low_address: u32,
    pub stuck_high_address: u32,
    pub stuck_high_data: u32,
    pub tied_address: u32,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue values for successive `read_data` calls
    pub fn push_reads(&mut self, values: impl IntoIterator<Item = u32>) {
        self.data_reads.extend(values);
    }

    /// Queue values for successive `read_address` calls
    pub fn push_address_reads(&mut self, values: impl IntoIterator<Item = u32>) {
        self.address_reads.extend(values);
    }

    /// Queue socket OE# levels (`true` = high)
    pub fn push_socket_oe(&mut self, levels: impl IntoIterator<Item = bool>) {
        self.socket_oe.extend(levels);
    }

    pub fn ops(&self) -> &[BusOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Completed write cycles as (address, data), taken at the WE# rising edge
    pub fn writes(&self) -> Vec<(u32, u32)> {
        let mut writes = Vec::new();
        let (mut addr, mut data, mut we_low) = (0, 0, false);
        for op in &self.ops {
            match *op {
                BusOp::SetAddress(a) => addr = a,
                BusOp::SetData(d) => data = d,
                BusOp::SetWriteEnable(false) => we_low = true,
                BusOp::SetWriteEnable(true) if we_low => {
                    writes.push((addr, data));
                    we_low = false;
                }
                _ => {}
            }
        }
        writes
    }

    /// Addresses of every data read
    pub fn read_addresses(&self) -> Vec<u32> {
        let mut addr = 0;
        let mut reads = Vec::new();
        for op in &self.ops {
            match *op {
                BusOp::SetAddress(a) => addr = a,
                BusOp::ReadData => reads.push(addr),
                _ => {}
            }
        }
        reads
    }

    fn address_level(&self) -> u32 {
        let mut value = self.address;
        if value & self.tied_address != 0 {
            value |= self.tied_address;
        }
        (value & !self.stuck_low_address) | self.stuck_high_address
    }
}

impl BusDriver for MockBus {
    fn set_address(&mut self, addr: u32) {
        self.ops.push(BusOp::SetAddress(addr));
        self.address = addr;
    }

    fn read_address(&mut self) -> u32 {
        self.ops.push(BusOp::ReadAddress);
        match self.address_reads.pop_front() {
            Some(value) => value,
            None => self.address_level(),
        }
    }

    fn set_data(&mut self, data: u32) {
        self.ops.push(BusOp::SetData(data));
        self.data = data;
    }

    fn read_data(&mut self) -> u32 {
        self.ops.push(BusOp::ReadData);
        match self.data_reads.pop_front() {
            Some(value) => value,
            None => self.data | self.stuck_high_data,
        }
    }

    fn enable_address_output(&mut self) {
        self.ops.push(BusOp::EnableAddress);
    }

    fn disable_address_output(&mut self) {
        self.ops.push(BusOp::DisableAddress);
        self.address = 0;
    }

    fn float_address_lines(&mut self) {
        self.ops.push(BusOp::FloatAddress);
    }

    fn enable_data_output(&mut self) {
        self.ops.push(BusOp::EnableData);
    }

    fn disable_data_output(&mut self) {
        self.ops.push(BusOp::DisableData);
        self.data = 0;
    }

    fn set_write_enable(&mut self, high: bool) {
        self.ops.push(BusOp::SetWriteEnable(high));
    }

    fn set_output_enable(&mut self, high: bool) {
        self.ops.push(BusOp::SetOutputEnable(high));
    }

    fn enable_output_enable_drive(&mut self) {
        self.ops.push(BusOp::EnableOutputEnable);
    }

    fn disable_output_enable_drive(&mut self) {
        self.ops.push(BusOp::DisableOutputEnable);
    }

    fn read_socket_output_enable(&mut self) -> bool {
        self.ops.push(BusOp::ReadSocketOutputEnable);
        self.socket_oe.pop_front().unwrap_or(true)
    }
}

/// Clock that moves forward on every read; delays jump straight ahead
#[derive(Debug)]
pub struct StepClock {
    ticks: Cell<u64>,
    step: u64,
}

impl StepClock {
    pub fn new() -> Self {
        Self::with_step(1)
    }

    pub fn with_step(step: u64) -> Self {
        Self {
            ticks: Cell::new(0),
            step,
        }
    }

    pub fn advance_usec(&self, usec: u64) {
        self.ticks.set(self.ticks.get() + usec * 72);
    }
}

impl Clock for StepClock {
    fn now(&self) -> u64 {
        let t = self.ticks.get();
        self.ticks.set(t + self.step);
        t
    }

    fn ticks_per_usec(&self) -> u32 {
        72
    }

    fn delay_ticks(&self, ticks: u64) {
        self.ticks.set(self.ticks.get() + ticks);
    }
}
