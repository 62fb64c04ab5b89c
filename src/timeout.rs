//! Bounding the wait for a busy pipe.
//!
//! A transfer submission waits until the previous transfer on its pipe
//! retires. The [`Deadline`] you pass to [`xfer()`](crate::Driver::xfer)
//! decides how long that wait may last:
//!
//! - [`Forever`] waits until the interrupt handler retires the pipe. If the
//!   peripheral never interrupts (for instance, the host disappeared in the
//!   middle of a transfer) the caller never returns. Pair this with a
//!   watchdog.
//! - [`Polls`] gives up after a fixed number of checks.
//! - [`Timeout`] gives up after an interval measured by your [`Clock`].
//!
//! When a deadline expires, the submission returns
//! [`UsbError::WouldBlock`](usb_device::UsbError::WouldBlock) without
//! touching any driver state.
//!
//! # Example
//!
//! Use a free-running, microsecond timer as the clock, and wait at most 5ms.
//!
//! ```
//! use eptri_usbd::timeout::{Clock, Deadline, Timeout};
//!
//! struct Mtime;
//! impl Clock for Mtime {
//!     fn ticks(&self) -> u32 {
//!         // Read your platform's timer here...
//!         # 0
//!     }
//! }
//!
//! let mut deadline = Timeout::new(Mtime, 5_000);
//! assert!(!deadline.expired());
//! ```

/// Decides when a waiting submission gives up
pub trait Deadline {
    /// Returns `true` once the wait should end.
    ///
    /// Called once per unsuccessful check of the pipe.
    fn expired(&mut self) -> bool;
}

impl<D: Deadline + ?Sized> Deadline for &mut D {
    fn expired(&mut self) -> bool {
        (**self).expired()
    }
}

/// Never expires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Forever;

impl Deadline for Forever {
    fn expired(&mut self) -> bool {
        false
    }
}

/// Expires after a number of unsuccessful checks
///
/// `Polls::new(0)` never waits: a busy pipe fails immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polls {
    remaining: u32,
}

impl Polls {
    pub const fn new(polls: u32) -> Self {
        Self { remaining: polls }
    }

    /// Returns the number of checks left before expiring.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Deadline for Polls {
    fn expired(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(remaining) => {
                self.remaining = remaining;
                false
            }
            None => true,
        }
    }
}

/// A free-running tick counter.
///
/// The counter may wrap; [`Timeout`] handles the wrap.
pub trait Clock {
    /// Returns the current tick count.
    fn ticks(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn ticks(&self) -> u32 {
        (**self).ticks()
    }
}

/// Expires once `interval` ticks have elapsed
///
/// The interval starts when you create the timeout, or when you
/// [`restart()`](Timeout::restart) it.
#[derive(Debug)]
pub struct Timeout<C> {
    clock: C,
    start: u32,
    interval: u32,
}

impl<C: Clock> Timeout<C> {
    /// Start a timeout of `interval` ticks.
    pub fn new(clock: C, interval: u32) -> Self {
        let start = clock.ticks();
        Self {
            clock,
            start,
            interval,
        }
    }

    /// Restart the interval from the current tick.
    pub fn restart(&mut self) {
        self.start = self.clock.ticks();
    }

    /// Returns the number of ticks since the interval started.
    pub fn elapsed(&self) -> u32 {
        self.clock.ticks().wrapping_sub(self.start)
    }

    /// Returns the interval, in ticks.
    pub fn interval(&self) -> u32 {
        self.interval
    }
}

impl<C: Clock> Deadline for Timeout<C> {
    fn expired(&mut self) -> bool {
        self.elapsed() >= self.interval
    }
}

/// Check `ready` until it returns `true`, or until `deadline` expires.
///
/// Returns `true` if `ready` succeeded.
pub(crate) fn wait_until(mut ready: impl FnMut() -> bool, mut deadline: impl Deadline) -> bool {
    loop {
        if ready() {
            return true;
        }
        if deadline.expired() {
            return false;
        }
        core::hint::spin_loop();
    }
}
