//! Cascade tracker - one trigger fanned out to ordered side effects.
//!
//! Used for derived synchronizations that are not a simple key binding, for
//! example keeping a theme preference, a UI flag and persisted user settings
//! consistent from a single watcher.

use crate::{
    debounce::Debouncer,
    error::Result,
    observable::{Observable, Signal, Subscription},
    state::ConflictRecord,
    value::{UrlValue, Value},
    Timestamp,
};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

type Action<T> = Box<dyn Fn(&T) -> Result<()>>;

struct Target<T> {
    name: String,
    priority: i32,
    action: Action<T>,
}

/// Description of a cascade, built before handing it to the controller.
pub struct Cascade<T> {
    name: String,
    trigger: Signal<T>,
    targets: Vec<Target<T>>,
}

impl<T: UrlValue> Cascade<T> {
    /// Start a cascade triggered by changes of `trigger`.
    pub fn on(name: impl Into<String>, trigger: &Signal<T>) -> Self {
        Self {
            name: name.into(),
            trigger: trigger.clone(),
            targets: Vec::new(),
        }
    }

    /// Add a side effect. Lower priorities run first; equal priorities run
    /// in the order they were added.
    pub fn target(
        mut self,
        name: impl Into<String>,
        priority: i32,
        action: impl Fn(&T) -> Result<()> + 'static,
    ) -> Self {
        self.targets.push(Target {
            name: name.into(),
            priority,
            action: Box::new(action),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_tracker(mut self, window: u64) -> CascadeTracker {
        self.targets.sort_by_key(|t| t.priority);

        let trigger = self.trigger.clone();
        let watched = self.trigger.clone();
        let targets = self.targets;
        let source = self.name.clone();

        CascadeTracker {
            name: self.name,
            read: Box::new(move || trigger.with(|v| v.to_value())),
            run: Box::new(move |value: &Value, now: Timestamp| {
                let mut executed = Vec::new();
                let mut conflicts = Vec::new();
                let Some(typed) = T::from_value(value.clone()) else {
                    return (executed, conflicts);
                };
                for target in &targets {
                    match (target.action)(&typed) {
                        Ok(()) => executed.push(target.name.clone()),
                        Err(e) => conflicts.push(ConflictRecord::new(
                            source.clone(),
                            target.name.clone(),
                            value.clone(),
                            e.to_string(),
                            now,
                        )),
                    }
                }
                (executed, conflicts)
            }),
            watch: Box::new(move |listener: Rc<dyn Fn()>| {
                watched.subscribe(Rc::new(move |_: &T| listener()))
            }),
            debouncer: RefCell::new(Debouncer::new(window)),
            running: Cell::new(false),
        }
    }
}

impl<T> fmt::Debug for Cascade<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cascade")
            .field("name", &self.name)
            .field(
                "targets",
                &self
                    .targets
                    .iter()
                    .map(|t| (t.name.as_str(), t.priority))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Result of one cascade run.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeOutcome {
    pub cascade: String,
    pub value: Value,
    /// Targets that succeeded, in execution order
    pub executed: Vec<String>,
    /// Targets that failed; ids still unassigned
    pub conflicts: Vec<ConflictRecord>,
}

type Runner = Box<dyn Fn(&Value, Timestamp) -> (Vec<String>, Vec<ConflictRecord>)>;

/// Type-erased, armed cascade owned by the controller.
pub(crate) struct CascadeTracker {
    name: String,
    read: Box<dyn Fn() -> Value>,
    run: Runner,
    watch: Box<dyn Fn(Rc<dyn Fn()>) -> Subscription>,
    debouncer: RefCell<Debouncer>,
    running: Cell<bool>,
}

impl CascadeTracker {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn watch(&self, listener: Rc<dyn Fn()>) -> Subscription {
        (self.watch)(listener)
    }

    /// Note a trigger change. Changes caused by this cascade's own targets
    /// are ignored.
    pub(crate) fn on_trigger(&self, now: Timestamp) {
        if self.running.get() {
            return;
        }
        self.debouncer.borrow_mut().schedule(now);
    }

    pub(crate) fn deadline(&self) -> Option<Timestamp> {
        self.debouncer.borrow().deadline()
    }

    pub(crate) fn cancel(&self) {
        self.debouncer.borrow_mut().cancel();
    }

    /// Run the targets if the debounce window has elapsed.
    pub(crate) fn fire_if_due(&self, now: Timestamp) -> Option<CascadeOutcome> {
        let due = self.debouncer.borrow_mut().fire_if_due(now);
        if !due {
            return None;
        }
        Some(self.run_now(now))
    }

    /// Run the targets immediately with the trigger's current value.
    pub(crate) fn run_now(&self, now: Timestamp) -> CascadeOutcome {
        let value = (self.read)();
        debug!(cascade = %self.name, value = %value, "running cascade");

        self.running.set(true);
        let (executed, conflicts) = (self.run)(&value, now);
        self.running.set(false);

        CascadeOutcome {
            cascade: self.name.clone(),
            value,
            executed,
            conflicts,
        }
    }
}

impl fmt::Debug for CascadeTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadeTracker")
            .field("name", &self.name)
            .field("deadline", &self.deadline())
            .field("running", &self.running.get())
            .finish()
    }
}
