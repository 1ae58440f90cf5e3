//! Shared context: registry, sync state, ready gate, clock and config.
//!
//! Built once by the host after its stores exist and shared by reference.
//! Independent contexts do not interfere, so tests can run many side by side.

use crate::{
    clock::Clock,
    gate::{GatePhase, ReadyGate},
    query::Query,
    registry::Registry,
    serialize,
    state::{SyncState, CONFLICT_TRIM, MAX_CONFLICTS},
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Default outbound debounce window in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default cascade debounce window in milliseconds.
pub const DEFAULT_CASCADE_DEBOUNCE_MS: u64 = 100;

/// Tunables for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Trailing-edge window for store → URL propagation
    pub debounce_ms: u64,
    /// Trailing-edge window for cascade triggers
    pub cascade_debounce_ms: u64,
    pub max_conflicts: usize,
    /// Oldest conflicts dropped when `max_conflicts` is exceeded
    pub conflict_trim: usize,
    /// Reset bound keys that are absent from an inbound query to their
    /// defaults, instead of leaving the stores untouched.
    pub reset_missing_keys: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            cascade_debounce_ms: DEFAULT_CASCADE_DEBOUNCE_MS,
            max_conflicts: MAX_CONFLICTS,
            conflict_trim: CONFLICT_TRIM,
            reset_missing_keys: false,
        }
    }
}

pub struct SyncContext {
    registry: Registry,
    state: RefCell<SyncState>,
    gate: RefCell<ReadyGate>,
    clock: Rc<dyn Clock>,
    config: SyncConfig,
}

impl SyncContext {
    pub fn new(registry: Registry, clock: Rc<dyn Clock>, config: SyncConfig) -> Rc<Self> {
        let state = SyncState::with_limits(config.max_conflicts, config.conflict_trim);
        Rc::new(Self {
            registry,
            state: RefCell::new(state),
            gate: RefCell::new(ReadyGate::new()),
            clock,
            config,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Snapshot of the sync state.
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// False while sync is paused.
    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn gate_phase(&self) -> GatePhase {
        self.gate.borrow().phase()
    }

    /// Serialize the current store values.
    pub fn serialize(&self) -> Query {
        serialize::serialize(&self.registry)
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, SyncState> {
        self.state.borrow_mut()
    }

    pub(crate) fn gate_mut(&self) -> RefMut<'_, ReadyGate> {
        self.gate.borrow_mut()
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("registry", &self.registry)
            .field("state", &self.state.borrow())
            .field("gate", &self.gate.borrow().phase())
            .field("config", &self.config)
            .finish()
    }
}
