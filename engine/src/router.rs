//! Router boundary.
//!
//! The engine only ever replaces the query; it has no notion of pushing a
//! history entry.

use crate::{
    error::Result,
    observable::{Listener, Observable, Signal, Subscription},
    query::Query,
    Error,
};
use std::cell::RefCell;
use std::fmt;

/// The host's router, as seen by the engine.
pub trait Router {
    /// The query of the current location.
    fn current_query(&self) -> Query;

    /// Replace the current query without adding a history entry.
    fn replace_query(&self, query: Query) -> Result<()>;

    /// Watch for query changes from any source.
    fn subscribe(&self, listener: Listener<Query>) -> Subscription;
}

/// Rejects a replacement with a reason, like a navigation guard.
pub type NavigationGuard = Box<dyn Fn(&Query) -> std::result::Result<(), String>>;

/// An in-memory router.
///
/// Hosts without a browser use it as the address bar; tests use it to count
/// replace calls and to simulate user navigation.
pub struct MemoryRouter {
    query: Signal<Query>,
    replace_calls: RefCell<Vec<Query>>,
    guard: RefCell<Option<NavigationGuard>>,
}

impl MemoryRouter {
    pub fn new(initial: Query) -> Self {
        Self {
            query: Signal::new(initial),
            replace_calls: RefCell::new(Vec::new()),
            guard: RefCell::new(None),
        }
    }

    /// Start at the query of a `?a=1&b=2` string.
    pub fn from_query_string(input: &str) -> Self {
        Self::new(Query::parse(input))
    }

    /// A navigation not made by the engine: the user edits the address or
    /// steps through history. Guards do not apply.
    pub fn navigate(&self, query: Query) {
        self.query.set(query);
    }

    /// Install a guard consulted on every replace.
    pub fn set_guard(&self, guard: impl Fn(&Query) -> std::result::Result<(), String> + 'static) {
        *self.guard.borrow_mut() = Some(Box::new(guard));
    }

    pub fn clear_guard(&self) {
        *self.guard.borrow_mut() = None;
    }

    /// Every replace attempt, accepted or not, oldest first.
    pub fn replace_calls(&self) -> Vec<Query> {
        self.replace_calls.borrow().clone()
    }

    pub fn replace_count(&self) -> usize {
        self.replace_calls.borrow().len()
    }

    /// The current location's query string with its leading `?`.
    pub fn url(&self) -> String {
        self.query.with(|q| q.to_string())
    }
}

impl Router for MemoryRouter {
    fn current_query(&self) -> Query {
        self.query.get()
    }

    fn replace_query(&self, query: Query) -> Result<()> {
        self.replace_calls.borrow_mut().push(query.clone());

        if let Some(guard) = self.guard.borrow().as_ref() {
            guard(&query).map_err(Error::RouterRejected)?;
        }

        self.query.set(query);
        Ok(())
    }

    fn subscribe(&self, listener: Listener<Query>) -> Subscription {
        self.query.subscribe(listener)
    }
}

impl Default for MemoryRouter {
    fn default() -> Self {
        Self::new(Query::new())
    }
}

impl fmt::Debug for MemoryRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRouter")
            .field("query", &self.query.get())
            .field("replace_calls", &self.replace_calls.borrow().len())
            .field("guarded", &self.guard.borrow().is_some())
            .finish()
    }
}
