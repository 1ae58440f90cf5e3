//! Engine clock backed by the tokio timer.

use tokio::time::{Duration, Instant};
use urlsync_engine::{Clock, Timestamp};

/// Milliseconds since the host started, on tokio's monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    start: Instant,
}

impl TokioClock {
    pub fn new(start: Instant) -> Self {
        Self { start }
    }

    /// The instant an engine timestamp refers to, for `sleep_until`.
    pub fn instant_at(&self, ts: Timestamp) -> Instant {
        self.start + Duration::from_millis(ts)
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
