//! Mapping registry - the table of store ↔ query bindings.
//!
//! The registry is the only way the engine reaches a store. Each entry pairs
//! a query key with a declared kind, a default, and accessor closures into
//! the host's store.

use crate::{
    error::Result,
    observable::{Observable, Signal, Subscription},
    value::{UrlValue, Value, ValueKind},
    Error, QueryKey,
};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Reads the current value from a store.
pub type Reader = Box<dyn Fn() -> Value>;

/// Writes a value into a store. Errors become conflict records.
pub type Writer = Box<dyn Fn(Value, WriteOptions) -> Result<()>>;

/// Subscribes a change callback to a store.
pub type Watcher = Box<dyn Fn(Rc<dyn Fn()>) -> Subscription>;

/// Options passed along with a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// The write comes from the engine, not from the user
    pub silent: bool,
}

impl WriteOptions {
    pub fn silent() -> Self {
        Self { silent: true }
    }
}

/// A single binding between a query key and a store value.
pub struct MappingEntry {
    key: QueryKey,
    kind: ValueKind,
    default: Value,
    read: Reader,
    write: Writer,
    watch: Option<Watcher>,
}

impl MappingEntry {
    pub fn new(
        key: impl Into<QueryKey>,
        kind: ValueKind,
        default: Value,
        read: impl Fn() -> Value + 'static,
        write: impl Fn(Value, WriteOptions) -> Result<()> + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            default,
            read: Box::new(read),
            write: Box::new(write),
            watch: None,
        }
    }

    /// Attach a change watcher so the controller can observe this entry.
    pub fn with_watch(mut self, watch: impl Fn(Rc<dyn Fn()>) -> Subscription + 'static) -> Self {
        self.watch = Some(Box::new(watch));
        self
    }

    /// Bind directly to a [`Signal`].
    pub fn signal<T: UrlValue>(key: impl Into<QueryKey>, default: T, signal: &Signal<T>) -> Self {
        let key = key.into();
        let reader = signal.clone();
        let writer = signal.clone();
        let watched = signal.clone();
        let write_key = key.clone();

        Self::new(
            key,
            T::KIND,
            default.to_value(),
            move || reader.with(|v| v.to_value()),
            move |value, _opts| {
                let got = value.type_name();
                let typed = T::from_value(value).ok_or_else(|| Error::TypeMismatch {
                    key: write_key.clone(),
                    expected: T::KIND.to_string(),
                    got: got.to_string(),
                })?;
                writer.set(typed);
                Ok(())
            },
        )
        .with_watch(move |listener| watched.subscribe(Rc::new(move |_: &T| listener())))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default(&self) -> &Value {
        &self.default
    }

    pub fn read(&self) -> Value {
        (self.read)()
    }

    pub fn write(&self, value: Value, opts: WriteOptions) -> Result<()> {
        (self.write)(value, opts)
    }

    pub fn is_watchable(&self) -> bool {
        self.watch.is_some()
    }

    /// Subscribe `listener` to changes, if this entry has a watcher.
    pub fn watch(&self, listener: Rc<dyn Fn()>) -> Option<Subscription> {
        self.watch.as_ref().map(|watch| watch(listener))
    }

    pub fn is_default(&self) -> bool {
        self.read() == self.default
    }
}

impl fmt::Debug for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingEntry")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("watchable", &self.watch.is_some())
            .finish()
    }
}

/// Ordered set of bindings with unique keys.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<MappingEntry>,
    index: HashMap<QueryKey, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding.
    ///
    /// Fails on a duplicate key, or when the default does not fit the
    /// declared kind. Both are programming errors to be surfaced at startup.
    pub fn register(&mut self, entry: MappingEntry) -> Result<&mut Self> {
        if self.index.contains_key(entry.key()) {
            return Err(Error::DuplicateKey(entry.key.clone()));
        }
        if !entry.default.matches(entry.kind) {
            return Err(Error::TypeMismatch {
                key: entry.key.clone(),
                expected: entry.kind.to_string(),
                got: entry.default.type_name().to_string(),
            });
        }

        self.index.insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(self)
    }

    /// Register a [`Signal`]-backed binding.
    pub fn bind<T: UrlValue>(
        &mut self,
        key: impl Into<QueryKey>,
        default: T,
        signal: &Signal<T>,
    ) -> Result<&mut Self> {
        self.register(MappingEntry::signal(key, default, signal))
    }

    /// Visit entries in registration order.
    pub fn for_each(&self, mut f: impl FnMut(&MappingEntry)) {
        for entry in &self.entries {
            f(entry);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&MappingEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(MappingEntry::key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
