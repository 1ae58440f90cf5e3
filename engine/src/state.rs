//! Sync status and the bounded conflict log.

use crate::{error::Result, value::Value, Error, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default number of conflicts kept.
pub const MAX_CONFLICTS: usize = 50;

/// How many of the oldest conflicts are dropped once the log overflows.
pub const CONFLICT_TRIM: usize = 20;

/// What produced a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncKind {
    /// Store ↔ URL (or store ↔ store) propagation
    Bidirectional,
    /// A cascade fan-out
    Cascade,
    /// Explicitly requested by the host
    Manual,
}

/// Informational record of the most recent sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub kind: SyncKind,
    pub description: String,
    pub value: Value,
    pub timestamp: Timestamp,
}

/// A failed write, kept for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    /// Assigned by [`SyncState::record_conflict`]
    pub id: u64,
    /// Where the value came from (`url`, a cascade or binding name)
    pub source: String,
    /// What refused it (query key or target name)
    pub target: String,
    pub value: Value,
    pub error_message: String,
    pub timestamp: Timestamp,
    pub resolved: bool,
    pub resolution: Option<String>,
}

impl ConflictRecord {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        value: Value,
        error_message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: 0,
            source: source.into(),
            target: target.into(),
            value,
            error_message: error_message.into(),
            timestamp,
            resolved: false,
            resolution: None,
        }
    }
}

/// Observable status of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Cleared while sync is paused
    pub active: bool,
    /// Set while the engine is applying its own writes
    pub is_processing: bool,
    pub last_sync: Option<SyncRecord>,
    /// Oldest first
    pub conflicts: Vec<ConflictRecord>,
    #[serde(skip)]
    next_conflict_id: u64,
    #[serde(skip, default = "default_max")]
    max_conflicts: usize,
    #[serde(skip, default = "default_trim")]
    conflict_trim: usize,
}

fn default_max() -> usize {
    MAX_CONFLICTS
}

fn default_trim() -> usize {
    CONFLICT_TRIM
}

impl SyncState {
    pub fn new() -> Self {
        Self::with_limits(MAX_CONFLICTS, CONFLICT_TRIM)
    }

    /// Create a state with a custom conflict cap.
    ///
    /// `trim` is clamped to at least 1 so an overflow always frees room.
    pub fn with_limits(max_conflicts: usize, trim: usize) -> Self {
        Self {
            active: true,
            is_processing: false,
            last_sync: None,
            conflicts: Vec::new(),
            next_conflict_id: 1,
            max_conflicts,
            conflict_trim: trim.max(1),
        }
    }

    /// Append a conflict, assigning its id. Returns the id.
    pub fn record_conflict(&mut self, mut conflict: ConflictRecord) -> u64 {
        conflict.id = self.next_conflict_id;
        self.next_conflict_id += 1;

        warn!(
            id = conflict.id,
            source = %conflict.source,
            target = %conflict.target,
            value = %conflict.value,
            error = %conflict.error_message,
            "sync conflict recorded"
        );

        let id = conflict.id;
        self.conflicts.push(conflict);
        if self.conflicts.len() > self.max_conflicts {
            let drop = self.conflict_trim.min(self.conflicts.len());
            self.conflicts.drain(..drop);
        }
        id
    }

    pub fn record_sync(
        &mut self,
        kind: SyncKind,
        description: impl Into<String>,
        value: Value,
        timestamp: Timestamp,
    ) {
        self.last_sync = Some(SyncRecord {
            kind,
            description: description.into(),
            value,
            timestamp,
        });
    }

    /// Mark a conflict as handled. Nothing is re-applied.
    pub fn resolve_conflict(&mut self, id: u64, resolution: impl Into<String>) -> Result<()> {
        let conflict = self
            .conflicts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(Error::ConflictNotFound(id))?;
        conflict.resolved = true;
        conflict.resolution = Some(resolution.into());
        Ok(())
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.conflicts.iter().filter(|c| !c.resolved)
    }

    /// Drop resolved conflicts, keeping open ones.
    pub fn clear_resolved(&mut self) {
        self.conflicts.retain(|c| !c.resolved);
    }

    pub fn clear_conflicts(&mut self) {
        self.conflicts.clear();
    }

    /// JSON view of the state, for diagnostics.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict(n: u64) -> ConflictRecord {
        ConflictRecord::new("url", "yr", Value::Number(n as f64), "rejected", n)
    }

    #[test]
    fn ids_are_sequential() {
        let mut state = SyncState::new();
        assert_eq!(state.record_conflict(conflict(0)), 1);
        assert_eq!(state.record_conflict(conflict(1)), 2);
        assert_eq!(state.conflicts[1].id, 2);
    }

    #[test]
    fn overflow_drops_oldest_twenty() {
        let mut state = SyncState::new();
        for n in 0..50 {
            state.record_conflict(conflict(n));
        }
        assert_eq!(state.conflicts.len(), 50);

        state.record_conflict(conflict(50));
        assert_eq!(state.conflicts.len(), 31);
        assert_eq!(state.conflicts[0].timestamp, 20);
        assert_eq!(state.conflicts.last().unwrap().timestamp, 50);
    }

    #[test]
    fn resolve_marks_record() {
        let mut state = SyncState::new();
        let id = state.record_conflict(conflict(7));
        state.resolve_conflict(id, "ignored").unwrap();

        assert!(state.conflicts[0].resolved);
        assert_eq!(state.conflicts[0].resolution.as_deref(), Some("ignored"));
        assert_eq!(state.unresolved().count(), 0);
        assert_eq!(
            state.resolve_conflict(99, "x"),
            Err(Error::ConflictNotFound(99))
        );

        state.clear_resolved();
        assert!(state.conflicts.is_empty());
    }

    #[test]
    fn json_is_camel_case() {
        let mut state = SyncState::new();
        state.record_sync(SyncKind::Manual, "sync now", Value::Text("dark=1".into()), 5);
        let json = state.to_json().unwrap();
        assert!(json.contains("lastSync"));
        assert!(json.contains("isProcessing"));
        assert!(json.contains("\"manual\""));
        assert!(!json.contains("maxConflicts"));
    }
}
