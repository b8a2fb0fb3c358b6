//! Virtual time shared by the controller and the simulated hardware

use std::cell::Cell;
use std::rc::Rc;

use kicksmash_core::hal::Clock;

/// Tick rate of the simulated MCU timer (72 MHz)
pub const TICKS_PER_USEC: u32 = 72;

/// Ticks consumed by each read of the counter
///
/// Busy-wait loops make progress through this, the way a real loop burns
/// cycles between timer reads.
const READ_COST_TICKS: u64 = 50;

/// Monotonic virtual clock
///
/// Clones share the same counter, so the chips see the time the
/// controller spends.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    ticks: Rc<Cell<u64>>,
}

impl SimClock {
    /// Create a clock at tick 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick without advancing time
    pub fn peek(&self) -> u64 {
        self.ticks.get()
    }

    /// Move time forward
    pub fn advance_ticks(&self, ticks: u64) {
        self.ticks.set(self.ticks.get().saturating_add(ticks));
    }

    /// Move time forward by whole microseconds
    pub fn advance_usec(&self, usec: u64) {
        self.advance_ticks(usec * u64::from(TICKS_PER_USEC));
    }

    /// Virtual microseconds since creation
    pub fn elapsed_usec(&self) -> u64 {
        self.peek() / u64::from(TICKS_PER_USEC)
    }
}

impl Clock for SimClock {
    fn now(&self) -> u64 {
        let t = self.ticks.get();
        self.ticks.set(t + READ_COST_TICKS);
        t
    }

    fn ticks_per_usec(&self) -> u32 {
        TICKS_PER_USEC
    }

    fn delay_ticks(&self, ticks: u64) {
        self.advance_ticks(ticks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_time() {
        let clock = SimClock::new();
        let other = clock.clone();
        clock.delay_usec(10);
        assert_eq!(other.peek(), 720);
        assert_eq!(other.elapsed_usec(), 10);
    }

    #[test]
    fn test_reading_moves_time() {
        let clock = SimClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b > a);
        assert!(clock.has_elapsed(40));
    }
}
