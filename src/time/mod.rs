//! Monotonic host time
//!
//! All synchronization timestamps are drawn from a boot-relative microsecond
//! counter that is immune to wall-clock adjustments. The [`HostClock`] trait
//! is the seam that lets tests substitute a deterministic virtual clock for
//! the real one.

use std::time::{Duration, Instant};

/// Source of monotonic microsecond timestamps and short sleeps
pub trait HostClock {
    /// Microseconds elapsed on the host's monotonic timeline
    fn now_micros(&self) -> i64;

    /// Sleeps for the given number of microseconds
    ///
    /// Used for inter-probe pacing; accuracy in the tens of microseconds is
    /// enough.
    fn sleep_micros(&self, micros: i64);
}

/// Production clock over [`std::time::Instant`]
///
/// The origin is the moment the clock was created, so readings are small
/// positive numbers rather than raw counter values.
#[derive(Debug, Clone)]
pub struct UptimeClock {
    origin: Instant,
}

impl UptimeClock {
    /// Creates a clock whose zero point is now
    pub fn new() -> Self {
        UptimeClock {
            origin: Instant::now(),
        }
    }
}

impl Default for UptimeClock {
    fn default() -> Self {
        UptimeClock::new()
    }
}

impl HostClock for UptimeClock {
    fn now_micros(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }

    fn sleep_micros(&self, micros: i64) {
        if micros > 0 {
            std::thread::sleep(Duration::from_micros(micros as u64));
        }
    }
}
