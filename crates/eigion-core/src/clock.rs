//! Wall-clock abstraction.
//!
//! Commands record times in unix milliseconds. The clock is injected
//! through the execution context so that tests control time explicitly.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> SystemTime;

    /// The current time in unix milliseconds.
    fn now_millis(&self) -> u64 {
        unix_millis(self.now())
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Convert a time to unix milliseconds, clamping times before the epoch
/// to zero.
pub fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn pre_epoch_times_clamp_to_zero() {
        let before = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(unix_millis(before), 0);
    }
}
