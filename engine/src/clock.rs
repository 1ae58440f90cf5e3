//! Time source for debounce deadlines.
//!
//! The engine never reads the wall clock itself. Hosts provide a [`Clock`];
//! tests use [`ManualClock`] to step time deterministically.

use crate::Timestamp;
use std::cell::Cell;

/// Milliseconds on a monotonic host clock.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Timestamp>,
}

impl ManualClock {
    /// Create a clock starting at `start` milliseconds.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Move forward by `ms` and return the new time.
    pub fn advance(&self, ms: u64) -> Timestamp {
        let next = self.now.get().saturating_add(ms);
        self.now.set(next);
        next
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, now: Timestamp) {
        self.now.set(self.now.get().max(now));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(clock.advance(250), 1_250);
        assert_eq!(clock.now(), 1_250);
    }

    #[test]
    fn never_goes_backwards() {
        let clock = ManualClock::new(500);
        clock.set(100);
        assert_eq!(clock.now(), 500);
        clock.set(900);
        assert_eq!(clock.now(), 900);
    }
}
