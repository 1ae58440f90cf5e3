//! Sync controller - keeps stores and the URL query in step.
//!
//! Two paths meet here:
//!
//! - **Inbound** (router → stores) runs synchronously on every router
//!   change. Until the host signals readiness the query is buffered by the
//!   [`ReadyGate`](crate::gate::ReadyGate) instead.
//! - **Outbound** (stores → router) is debounced. Each store change resets a
//!   trailing-edge timer; when it expires the registry is serialized and
//!   the router's query replaced.
//!
//! A single re-entrancy guard keeps the paths from feeding each other: store
//! changes caused by the engine's own writes, and router changes caused by
//! its own replaces, are ignored.
//!
//! The controller owns no timer. The host calls [`SyncController::tick`]
//! whenever [`SyncController::next_deadline`] has passed.

use crate::{
    cascade::{Cascade, CascadeOutcome, CascadeTracker},
    context::SyncContext,
    debounce::Debouncer,
    error::Result,
    gate::GatePhase,
    observable::{Observable, Signal, Subscription},
    query::Query,
    router::Router,
    serialize::{self, DeserializeReport},
    state::{ConflictRecord, SyncKind, SyncState},
    value::{UrlValue, Value},
    Timestamp,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Why the re-entrancy guard is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    /// Writing decoded or default values into stores
    Apply,
    /// Replacing the router's query
    Replace,
    /// Propagating a store → store binding
    Binding,
}

struct Inner {
    ctx: Rc<SyncContext>,
    router: Rc<dyn Router>,
    guard: Cell<Option<Guard>>,
    outbound: RefCell<Debouncer>,
    /// Replaced queries whose router echo has not arrived yet, oldest first
    pending_echoes: RefCell<VecDeque<Query>>,
    /// Router and registry watchers, renewed by `attach`
    watchers: RefCell<Vec<Subscription>>,
    /// Binding and cascade subscriptions
    links: RefCell<Vec<Subscription>>,
    cascades: RefCell<Vec<Rc<CascadeTracker>>>,
    attached: Cell<bool>,
}

impl Inner {
    fn guarded<R>(&self, guard: Guard, f: impl FnOnce() -> R) -> R {
        let previous = self.guard.replace(Some(guard));
        self.ctx.state_mut().is_processing = true;
        let out = f();
        self.guard.set(previous);
        self.ctx.state_mut().is_processing = previous.is_some();
        out
    }

    /// Swallow the echo of one of our own replaces.
    ///
    /// Routers deliver changes in order, so echoes older than the matching
    /// one were coalesced by the router and are dropped with it.
    fn consume_echo(&self, query: &Query) -> bool {
        let mut pending = self.pending_echoes.borrow_mut();
        match pending.iter().position(|q| q == query) {
            Some(i) => {
                pending.drain(..=i);
                true
            }
            None => false,
        }
    }

    fn on_route_change(&self, query: &Query) {
        if let Some(guard) = self.guard.get() {
            self.consume_echo(query);
            trace!(?guard, "ignoring router change made while processing");
            return;
        }
        if self.consume_echo(query) {
            trace!("ignoring echo of own replace");
            return;
        }
        if !self.ctx.is_active() {
            trace!("sync paused, ignoring router change");
            return;
        }

        let admitted = self.ctx.gate_mut().admit(query.clone());
        if let Some(query) = admitted {
            self.apply_inbound(&query);
        }
    }

    fn apply_inbound(&self, query: &Query) -> DeserializeReport {
        let now = self.ctx.now();
        let registry = self.ctx.registry();
        let report = self.guarded(Guard::Apply, || {
            if self.ctx.config().reset_missing_keys {
                serialize::deserialize_full(registry, query, now)
            } else {
                serialize::deserialize(registry, query, now)
            }
        });

        debug!(
            query = %query,
            applied = report.applied.len(),
            ignored = report.ignored.len(),
            conflicts = report.conflicts.len(),
            "applied inbound query"
        );
        self.record_conflicts(report.conflicts.iter().cloned());
        self.ctx.state_mut().record_sync(
            SyncKind::Bidirectional,
            "url -> stores",
            Value::Text(query.to_query_string()),
            now,
        );
        report
    }

    fn on_store_change(&self) {
        if let Some(guard) = self.guard.get() {
            trace!(?guard, "store change from engine write, not propagated");
            return;
        }
        self.schedule_outbound();
    }

    fn schedule_outbound(&self) {
        if !self.ctx.is_active() {
            return;
        }
        if self.ctx.gate_phase() != GatePhase::Live {
            trace!("store change before ready, not propagated");
            return;
        }
        let now = self.ctx.now();
        self.outbound.borrow_mut().schedule(now);
    }

    /// Serialize and replace the router's query. Returns whether a replace
    /// succeeded.
    fn flush(&self, kind: SyncKind) -> bool {
        let query = self.ctx.serialize();
        if query == self.router.current_query() {
            trace!("url already matches stores");
            return false;
        }

        let now = self.ctx.now();
        self.pending_echoes.borrow_mut().push_back(query.clone());
        let result = self.guarded(Guard::Replace, || self.router.replace_query(query.clone()));

        match result {
            Ok(()) => {
                debug!(query = %query, ?kind, "replaced url query");
                self.ctx.state_mut().record_sync(
                    kind,
                    "stores -> url",
                    Value::Text(query.to_query_string()),
                    now,
                );
                true
            }
            Err(e) => {
                let mut pending = self.pending_echoes.borrow_mut();
                if pending.back() == Some(&query) {
                    pending.pop_back();
                }
                drop(pending);
                warn!(error = %e, query = %query, "url replace failed, stores keep their values");
                false
            }
        }
    }

    fn record_conflicts(&self, conflicts: impl IntoIterator<Item = ConflictRecord>) {
        let mut state = self.ctx.state_mut();
        for conflict in conflicts {
            state.record_conflict(conflict);
        }
    }

    fn record_cascade(&self, outcome: &CascadeOutcome, now: Timestamp) {
        self.record_conflicts(outcome.conflicts.iter().cloned());
        self.ctx.state_mut().record_sync(
            SyncKind::Cascade,
            format!("cascade {}", outcome.cascade),
            outcome.value.clone(),
            now,
        );
    }

    fn cascades(&self) -> Vec<Rc<CascadeTracker>> {
        self.cascades.borrow().clone()
    }
}

/// Drives bidirectional store ↔ URL synchronization for one [`SyncContext`].
pub struct SyncController {
    inner: Rc<Inner>,
}

impl SyncController {
    pub fn new(ctx: Rc<SyncContext>, router: Rc<dyn Router>) -> Self {
        let window = ctx.config().debounce_ms;
        Self {
            inner: Rc::new(Inner {
                ctx,
                router,
                guard: Cell::new(None),
                outbound: RefCell::new(Debouncer::new(window)),
                pending_echoes: RefCell::new(VecDeque::new()),
                watchers: RefCell::new(Vec::new()),
                links: RefCell::new(Vec::new()),
                cascades: RefCell::new(Vec::new()),
                attached: Cell::new(false),
            }),
        }
    }

    pub fn context(&self) -> &Rc<SyncContext> {
        &self.inner.ctx
    }

    /// Subscribe to the router and to every watchable registry entry.
    ///
    /// Attaching again replaces the previous watchers rather than adding a
    /// second set.
    pub fn attach(&self) {
        let old = std::mem::take(&mut *self.inner.watchers.borrow_mut());
        drop(old);

        let mut watchers = Vec::new();

        let weak = Rc::downgrade(&self.inner);
        watchers.push(self.inner.router.subscribe(Rc::new(move |query: &Query| {
            if let Some(inner) = weak.upgrade() {
                inner.on_route_change(query);
            }
        })));

        let mut unwatched = Vec::new();
        for entry in self.inner.ctx.registry().iter() {
            let weak = Rc::downgrade(&self.inner);
            let listener: Rc<dyn Fn()> = Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_store_change();
                }
            });
            match entry.watch(listener) {
                Some(sub) => watchers.push(sub),
                None => unwatched.push(entry.key()),
            }
        }
        if !unwatched.is_empty() {
            debug!(
                keys = ?unwatched,
                "entries without watchers rely on notify_store_changed"
            );
        }

        *self.inner.watchers.borrow_mut() = watchers;
        self.inner.attached.set(true);
        debug!(entries = self.inner.ctx.registry().len(), "sync controller attached");
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.get()
    }

    /// Drop every subscription and pending timer.
    ///
    /// Must be called before a host re-initializes with a new registry, or
    /// the old listeners keep firing.
    pub fn dispose(&self) {
        let watchers = std::mem::take(&mut *self.inner.watchers.borrow_mut());
        let links = std::mem::take(&mut *self.inner.links.borrow_mut());
        let cascades = std::mem::take(&mut *self.inner.cascades.borrow_mut());
        drop(watchers);
        drop(links);
        for tracker in cascades {
            tracker.cancel();
        }
        self.inner.outbound.borrow_mut().cancel();
        self.inner.pending_echoes.borrow_mut().clear();
        self.inner.attached.set(false);
        debug!("sync controller disposed");
    }

    /// The host finished its own startup.
    ///
    /// Applies the router's current query, then every query buffered so far
    /// in arrival order, then goes live. Returns how many queries were
    /// applied. A second call fails with [`Error::AlreadyReady`](crate::Error::AlreadyReady).
    pub fn signal_ready(&self) -> Result<usize> {
        let current = self.inner.router.current_query();
        self.inner.ctx.gate_mut().begin_flush(current)?;

        let mut applied = 0;
        loop {
            let next = self.inner.ctx.gate_mut().next_pending();
            let Some(query) = next else {
                break;
            };
            self.inner.apply_inbound(&query);
            applied += 1;
        }
        self.inner.ctx.gate_mut().finish_flush();

        debug!(applied, "host ready, sync is live");
        Ok(applied)
    }

    /// Inbound entry point, for hosts that deliver router changes
    /// themselves instead of through [`Router::subscribe`].
    pub fn on_route_change(&self, query: &Query) {
        self.inner.on_route_change(query);
    }

    /// Outbound entry point for stores that have no watcher.
    pub fn notify_store_changed(&self) {
        self.inner.on_store_change();
    }

    /// Run whatever timers are due. Returns whether anything fired.
    pub fn tick(&self) -> bool {
        let now = self.inner.ctx.now();
        let mut fired = false;

        // Cascades first. A target that writes a bound store restarts the
        // outbound window, so that write is flushed on a later tick.
        for tracker in self.inner.cascades() {
            if let Some(outcome) = tracker.fire_if_due(now) {
                self.inner.record_cascade(&outcome, now);
                fired = true;
            }
        }

        let due = self.inner.outbound.borrow_mut().fire_if_due(now);
        if due {
            self.inner.flush(SyncKind::Bidirectional);
            fired = true;
        }

        fired
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        let outbound = self.inner.outbound.borrow().deadline();
        self.inner
            .cascades()
            .iter()
            .filter_map(|t| t.deadline())
            .chain(outbound)
            .min()
    }

    pub fn has_pending(&self) -> bool {
        self.next_deadline().is_some()
    }

    /// Push the current store state to the URL now, skipping the debounce.
    pub fn sync_now(&self) -> bool {
        if self.inner.ctx.gate_phase() != GatePhase::Live {
            warn!("manual sync requested before ready, ignored");
            return false;
        }
        self.inner.outbound.borrow_mut().cancel();
        self.inner.flush(SyncKind::Manual)
    }

    /// Stop propagating in both directions. Pending outbound flushes and
    /// armed cascades are dropped.
    pub fn pause(&self) {
        self.inner.ctx.state_mut().active = false;
        self.inner.outbound.borrow_mut().cancel();
        for tracker in self.inner.cascades() {
            tracker.cancel();
        }
        debug!("sync paused");
    }

    /// Resume propagation. The stores are treated as authoritative, so an
    /// outbound flush is scheduled to catch the URL up.
    pub fn resume(&self) {
        self.inner.ctx.state_mut().active = true;
        self.inner.schedule_outbound();
        debug!("sync resumed");
    }

    pub fn is_active(&self) -> bool {
        self.inner.ctx.is_active()
    }

    /// Write every binding's default into its store; the URL follows after
    /// the debounce window.
    pub fn reset_to_defaults(&self) -> DeserializeReport {
        let now = self.inner.ctx.now();
        let registry = self.inner.ctx.registry();
        let report = self
            .inner
            .guarded(Guard::Apply, || serialize::reset_to_defaults(registry, now));

        self.inner.record_conflicts(report.conflicts.iter().cloned());
        self.inner.ctx.state_mut().record_sync(
            SyncKind::Manual,
            "reset to defaults",
            Value::Text(String::new()),
            now,
        );
        self.inner.schedule_outbound();
        report
    }

    /// Shareable query string (`?a=1&b=2`) for the current store values.
    pub fn share_query(&self) -> String {
        self.inner.ctx.serialize().to_string()
    }

    pub fn state(&self) -> SyncState {
        self.inner.ctx.state()
    }

    pub fn gate_phase(&self) -> GatePhase {
        self.inner.ctx.gate_phase()
    }

    /// Annotate a conflict as handled. No value is re-applied.
    pub fn resolve_conflict(&self, id: u64, resolution: impl Into<String>) -> Result<()> {
        self.inner.ctx.state_mut().resolve_conflict(id, resolution)
    }

    pub fn clear_conflicts(&self) {
        self.inner.ctx.state_mut().clear_conflicts();
    }

    /// Propagate `from` into `to` through `map` whenever `from` changes.
    ///
    /// Two calls in opposite directions form a bidirectional sync; the
    /// shared guard stops each side from re-triggering the other.
    pub fn bind_one_way<A, B>(
        &self,
        name: impl Into<String>,
        from: &Signal<A>,
        to: &Signal<B>,
        map: impl Fn(&A) -> B + 'static,
    ) where
        A: Clone + PartialEq + 'static,
        B: UrlValue,
    {
        let name = name.into();
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let to = to.clone();

        let sub = from.subscribe(Rc::new(move |a: &A| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.guard.get() == Some(Guard::Binding) {
                trace!(binding = %name, "skipping binding echo");
                return;
            }
            if !inner.ctx.is_active() {
                return;
            }

            let next = map(a);
            let value = next.to_value();
            let changed = inner.guarded(Guard::Binding, || to.set(next));
            if !changed {
                return;
            }

            let now = inner.ctx.now();
            inner.ctx.state_mut().record_sync(
                SyncKind::Bidirectional,
                format!("binding {}", name),
                value,
                now,
            );
            // Inside an inbound apply the URL is already the source.
            if inner.guard.get().is_none() {
                inner.schedule_outbound();
            }
        }));

        self.inner.links.borrow_mut().push(sub);
    }

    /// Arm a cascade. Its trigger is debounced by `cascade_debounce_ms`.
    pub fn add_cascade<T: UrlValue>(&self, cascade: Cascade<T>) {
        let window = self.inner.ctx.config().cascade_debounce_ms;
        let tracker = Rc::new(cascade.into_tracker(window));

        let weak_inner = Rc::downgrade(&self.inner);
        let weak_tracker = Rc::downgrade(&tracker);
        let sub = tracker.watch(Rc::new(move || {
            let (Some(inner), Some(tracker)) = (weak_inner.upgrade(), weak_tracker.upgrade())
            else {
                return;
            };
            if inner.ctx.is_active() {
                tracker.on_trigger(inner.ctx.now());
            }
        }));

        debug!(cascade = %tracker.name(), "cascade armed");
        self.inner.links.borrow_mut().push(sub);
        self.inner.cascades.borrow_mut().push(tracker);
    }

    /// Run a cascade immediately, bypassing its debounce.
    pub fn run_cascade(&self, name: &str) -> Option<CascadeOutcome> {
        let tracker = self
            .inner
            .cascades()
            .into_iter()
            .find(|t| t.name() == name)?;
        tracker.cancel();

        let now = self.inner.ctx.now();
        let outcome = tracker.run_now(now);
        self.inner.record_cascade(&outcome, now);
        Some(outcome)
    }
}

impl fmt::Debug for SyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncController")
            .field("attached", &self.inner.attached.get())
            .field("guard", &self.inner.guard.get())
            .field("outbound_deadline", &self.inner.outbound.borrow().deadline())
            .field("cascades", &self.inner.cascades.borrow().len())
            .finish()
    }
}
