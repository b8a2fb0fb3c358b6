//! Passive bus snoop
//!
//! With the board installed in a host, the host's CPU fetches from the ROM
//! socket. While the host asserts OE# the address lines are sampled and
//! every new address is captured; once the bus has been quiet for a while
//! the captures are printed.

use core::fmt;

use heapless::spsc::Queue;

use crate::bus::BusDriver;
use crate::controller::{BusState, FlashController};
use crate::hal::{AccessMask, Clock};

/// Ring slots; one is always kept free
pub const CAPTURE_SLOTS: usize = 32;

/// Loop iterations between stop checks while OE# is active, and the
/// number of idle iterations before captures are flushed
const SNOOP_ITERATIONS: u32 = 30;

/// Fixed-size FIFO of captured addresses; new entries are dropped when full
#[derive(Debug)]
pub struct CaptureBuffer {
    queue: Queue<u32, CAPTURE_SLOTS>,
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBuffer {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
        }
    }

    /// Add an address; returns false (and drops it) if the buffer is full
    pub fn push(&mut self, addr: u32) -> bool {
        self.queue.enqueue(addr).is_ok()
    }

    /// Oldest captured address
    pub fn pop(&mut self) -> Option<u32> {
        self.queue.dequeue()
    }

    /// Number of captured addresses
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is captured
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the next push would be dropped
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Usable capacity
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Write all captures as ` <hex>` tokens and a newline, emptying the
    /// buffer; writes nothing if it is empty
    pub fn flush_to(&mut self, out: &mut dyn fmt::Write) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        while let Some(addr) = self.pop() {
            write!(out, " {:x}", addr)?;
        }
        out.write_char('\n')
    }
}

impl<B: BusDriver, C: Clock, M: AccessMask> FlashController<B, C, M> {
    /// Watch the socket and print the addresses the host reads
    ///
    /// Runs until `stop` returns true, which is checked every few loop
    /// iterations while the host is active and after every flush. The bus
    /// is released first so the host owns the address lines.
    pub fn snoop(
        &mut self,
        out: &mut dyn fmt::Write,
        mut stop: impl FnMut() -> bool,
    ) -> fmt::Result {
        if self.state == BusState::Enabled {
            self.disable();
        }

        let mut captures = CaptureBuffer::new();
        let mut last = u32::MAX;
        let mut active = 0u32;
        let mut idle = 0u32;

        loop {
            // Socket OE# is active low
            if !self.bus.read_socket_output_enable() {
                let addr = self.bus.read_address();
                // When full, `last` is kept so the address is retried
                if addr != last && captures.push(addr) {
                    last = addr;
                }
                idle = 0;
                active += 1;
                if active > SNOOP_ITERATIONS {
                    active = 0;
                    if stop() {
                        break;
                    }
                }
                continue;
            }

            idle = idle.saturating_add(1);
            if idle <= SNOOP_ITERATIONS {
                continue;
            }
            active = 0;
            captures.flush_to(out)?;
            if stop() {
                break;
            }
        }

        out.write_str("^C\n")
    }
}
