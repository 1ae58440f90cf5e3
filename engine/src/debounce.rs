//! Trailing-edge debounce timer.

use crate::Timestamp;

/// Fires once, `window` ms after the most recent [`schedule`](Self::schedule).
///
/// Scheduling while already pending moves the deadline; it does not queue a
/// second firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
    window: u64,
    deadline: Option<Timestamp>,
}

impl Debouncer {
    pub fn new(window: u64) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    /// (Re)start the window at `now`.
    pub fn schedule(&mut self, now: Timestamp) {
        self.deadline = Some(now.saturating_add(self.window));
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the pending firing if its deadline has passed.
    pub fn fire_if_due(&mut self, now: Timestamp) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drop any pending firing. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}
