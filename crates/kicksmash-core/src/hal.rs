//! Capabilities the controller consumes from the board
//!
//! The monotonic tick source and the interrupt masking primitive live
//! outside this crate. Firmware implements them on top of the MCU timer and
//! the USB interrupt enable; the simulator implements them on a shared
//! virtual clock.

/// Monotonic tick counter
///
/// All delays in the controller are cooperative busy-waits against this
/// counter; there are no asynchronous timers.
pub trait Clock {
    /// Current tick count
    fn now(&self) -> u64;

    /// Tick rate
    fn ticks_per_usec(&self) -> u32;

    /// Busy-wait for the given number of ticks
    fn delay_ticks(&self, ticks: u64) {
        let start = self.now();
        while self.now().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }

    /// Convert nanoseconds to ticks, rounding up so a delay is never short
    fn nsec_to_ticks(&self, nsec: u32) -> u64 {
        let tpu = u64::from(self.ticks_per_usec());
        (u64::from(nsec) * tpu).div_ceil(1000)
    }

    /// Convert microseconds to ticks
    fn usec_to_ticks(&self, usec: u64) -> u64 {
        usec * u64::from(self.ticks_per_usec())
    }

    /// Convert ticks to whole microseconds
    fn ticks_to_usec(&self, ticks: u64) -> u64 {
        ticks / u64::from(self.ticks_per_usec().max(1))
    }

    /// Busy-wait for the given number of microseconds
    fn delay_usec(&self, usec: u64) {
        self.delay_ticks(self.usec_to_ticks(usec));
    }

    /// Tick value `msec` milliseconds from now
    fn deadline_after_msec(&self, msec: u64) -> u64 {
        self.now() + self.usec_to_ticks(msec * 1000)
    }

    /// Whether the given deadline has passed
    fn has_elapsed(&self, deadline: u64) -> bool {
        self.now() >= deadline
    }
}

/// Masks the asynchronous agent that shares the flash bus
///
/// On Kicksmash this is the USB interrupt, whose handler can touch the same
/// GPIO ports. An unlock sequence that gets interleaved with another bus
/// access desynchronises the chip's command state machine, so the
/// controller wraps every multi-cycle sequence in `mask()`/`unmask()`.
pub trait AccessMask {
    /// Block the asynchronous bus user
    fn mask(&mut self);

    /// Allow the asynchronous bus user again
    fn unmask(&mut self);
}

/// For hosts with no asynchronous bus user
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMask;

impl AccessMask for NoMask {
    fn mask(&mut self) {}

    fn unmask(&mut self) {}
}

impl<M: AccessMask + ?Sized> AccessMask for &mut M {
    fn mask(&mut self) {
        (**self).mask()
    }

    fn unmask(&mut self) {
        (**self).unmask()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> u64 {
        (**self).now()
    }

    fn ticks_per_usec(&self) -> u32 {
        (**self).ticks_per_usec()
    }

    fn delay_ticks(&self, ticks: u64) {
        (**self).delay_ticks(ticks)
    }

    fn nsec_to_ticks(&self, nsec: u32) -> u64 {
        (**self).nsec_to_ticks(nsec)
    }

    fn usec_to_ticks(&self, usec: u64) -> u64 {
        (**self).usec_to_ticks(usec)
    }

    fn ticks_to_usec(&self, ticks: u64) -> u64 {
        (**self).ticks_to_usec(ticks)
    }

    fn delay_usec(&self, usec: u64) {
        (**self).delay_usec(usec)
    }

    fn deadline_after_msec(&self, msec: u64) -> u64 {
        (**self).deadline_after_msec(msec)
    }

    fn has_elapsed(&self, deadline: u64) -> bool {
        (**self).has_elapsed(deadline)
    }
}
