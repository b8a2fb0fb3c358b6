//! Scripted host system on the ROM socket
//!
//! When the board is installed in a machine, that machine drives the
//! address lines and the socket OE#. The script is a list of bus cycles,
//! each holding OE# low for a number of samples; between and after cycles
//! the host sits idle with OE# high.

use std::collections::VecDeque;

/// One host bus cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCycle {
    /// Address the host puts on A0-A19
    pub address: u32,
    /// Socket OE# samples for which the cycle is active
    pub samples: u32,
}

/// Host activity as seen from the board
#[derive(Debug, Clone, Default)]
pub struct HostBus {
    cycles: VecDeque<HostCycle>,
    /// Address left on the bus when the host is idle
    idle_address: u32,
    /// Remaining idle samples before the next cycle
    gap: u32,
    /// Idle samples inserted between cycles
    spacing: u32,
}

impl HostBus {
    /// A host that never reads the ROM
    pub fn idle() -> Self {
        Self::default()
    }

    /// A host that fetches `addresses` in order, each for `samples` polls
    pub fn fetching(addresses: impl IntoIterator<Item = u32>, samples: u32) -> Self {
        let mut host = Self::idle();
        host.cycles.extend(
            addresses
                .into_iter()
                .map(|address| HostCycle { address, samples }),
        );
        host
    }

    /// Insert idle samples between cycles
    pub fn with_spacing(mut self, spacing: u32) -> Self {
        self.spacing = spacing;
        self.gap = spacing;
        self
    }

    /// Queue another cycle
    pub fn push(&mut self, cycle: HostCycle) {
        self.cycles.push_back(cycle);
    }

    /// Whether the script has run out
    pub fn is_done(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Address currently on the bus
    pub fn address(&self) -> u32 {
        match self.cycles.front() {
            Some(cycle) if self.gap == 0 => cycle.address,
            _ => self.idle_address,
        }
    }

    /// Sample the socket OE#; each sample consumes script time
    pub fn sample_output_enable(&mut self) -> bool {
        if self.gap > 0 {
            self.gap -= 1;
            return true;
        }
        let Some(cycle) = self.cycles.front_mut() else {
            return true;
        };
        if cycle.samples > 0 {
            cycle.samples -= 1;
            return false;
        }
        self.idle_address = cycle.address;
        self.cycles.pop_front();
        self.gap = self.spacing;
        true
    }
}
