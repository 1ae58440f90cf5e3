//! Ready gate - holds inbound queries until the host is ready.
//!
//! Queries that arrive while the host is still loading its stores would
//! overwrite real defaults with premature values. The gate buffers them and
//! hands them back, in arrival order, once the host signals readiness.

use crate::{error::Result, query::Query, Error};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Gate lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GatePhase {
    Buffering,
    Flushing,
    Live,
}

#[derive(Debug, Clone)]
pub struct ReadyGate {
    phase: GatePhase,
    pending: VecDeque<Query>,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self {
            phase: GatePhase::Buffering,
            pending: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// True once the ready signal has been received.
    pub fn is_ready(&self) -> bool {
        self.phase != GatePhase::Buffering
    }

    pub fn is_live(&self) -> bool {
        self.phase == GatePhase::Live
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Offer an inbound query.
    ///
    /// Returns it back when the gate is live, meaning "apply now". Otherwise
    /// the query is buffered and `None` is returned.
    pub fn admit(&mut self, query: Query) -> Option<Query> {
        if self.is_live() {
            return Some(query);
        }
        debug!(phase = ?self.phase, pending = self.pending.len() + 1, "buffering inbound query");
        self.pending.push_back(query);
        None
    }

    /// Start the one-shot flush.
    ///
    /// `current` is the router's query at the time of the signal; it is
    /// placed ahead of everything buffered so far, unless it is the last
    /// buffered query already, which is then applied only once.
    pub fn begin_flush(&mut self, current: Query) -> Result<()> {
        if self.phase != GatePhase::Buffering {
            return Err(Error::AlreadyReady);
        }
        self.phase = GatePhase::Flushing;
        if self.pending.back() != Some(&current) {
            self.pending.push_front(current);
        }
        debug!(pending = self.pending.len(), "ready gate flushing");
        Ok(())
    }

    /// Next query to replay, oldest first. Queries admitted during the
    /// flush are returned too.
    pub fn next_pending(&mut self) -> Option<Query> {
        if self.phase != GatePhase::Flushing {
            return None;
        }
        self.pending.pop_front()
    }

    /// Finish the flush and go live.
    pub fn finish_flush(&mut self) {
        if self.phase == GatePhase::Flushing {
            self.pending.clear();
            self.phase = GatePhase::Live;
            debug!("ready gate live");
        }
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}
