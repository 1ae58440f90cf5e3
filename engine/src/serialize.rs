//! Serializer and deserializer: registry ↔ [`Query`].

use crate::{
    codec,
    query::Query,
    registry::{MappingEntry, Registry, WriteOptions},
    state::ConflictRecord,
    value::Value,
    QueryKey, Timestamp,
};
use tracing::trace;

/// Conflict source used for writes that came from the URL.
pub const URL_SOURCE: &str = "url";

/// Outcome of applying a query to the stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeserializeReport {
    /// Keys whose write succeeded
    pub applied: Vec<QueryKey>,
    /// Keys present in the query but not bound in the registry
    pub ignored: Vec<QueryKey>,
    /// Writes that failed; the conflict ids are still unassigned
    pub conflicts: Vec<ConflictRecord>,
}

impl DeserializeReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Read every binding and encode the values that differ from their default.
pub fn serialize(registry: &Registry) -> Query {
    let mut query = Query::new();
    registry.for_each(|entry| {
        if let Some(token) = codec::encode(&entry.read(), entry.default()) {
            query.insert(entry.key(), token);
        }
    });
    query
}

/// Apply the bound keys present in `query` to their stores.
///
/// Unknown keys are skipped. A failing write is reported as a conflict and
/// does not stop the remaining keys.
pub fn deserialize(registry: &Registry, query: &Query, now: Timestamp) -> DeserializeReport {
    let mut report = DeserializeReport::default();

    for (key, token) in query.iter() {
        let Some(entry) = registry.get(key) else {
            trace!(key = %key, "ignoring unbound query key");
            report.ignored.push(key.clone());
            continue;
        };
        let value = codec::decode(token, entry.kind(), entry.default());
        write_entry(entry, value, now, &mut report);
    }

    report
}

/// Like [`deserialize`], but bound keys missing from `query` are reset to
/// their defaults, so the stores mirror the query exactly.
pub fn deserialize_full(registry: &Registry, query: &Query, now: Timestamp) -> DeserializeReport {
    let mut report = deserialize(registry, query, now);
    for entry in registry.iter().filter(|e| !query.contains_key(e.key())) {
        write_entry(entry, entry.default().clone(), now, &mut report);
    }
    report
}

/// Write every binding's default back into its store.
pub fn reset_to_defaults(registry: &Registry, now: Timestamp) -> DeserializeReport {
    let mut report = DeserializeReport::default();
    for entry in registry.iter() {
        write_entry(entry, entry.default().clone(), now, &mut report);
    }
    report
}

fn write_entry(entry: &MappingEntry, value: Value, now: Timestamp, report: &mut DeserializeReport) {
    match entry.write(value.clone(), WriteOptions::silent()) {
        Ok(()) => report.applied.push(entry.key().to_string()),
        Err(e) => report.conflicts.push(ConflictRecord::new(
            URL_SOURCE,
            entry.key(),
            value,
            e.to_string(),
            now,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{observable::Signal, value::ValueKind, Error};

    struct Stores {
        dark: Signal<bool>,
        year: Signal<f64>,
        products: Signal<Vec<String>>,
    }

    fn setup() -> (Stores, Registry) {
        let stores = Stores {
            dark: Signal::new(false),
            year: Signal::new(2024.0),
            products: Signal::new(Vec::new()),
        };
        let mut registry = Registry::new();
        registry
            .bind("dark", false, &stores.dark)
            .unwrap()
            .bind("yr", 2024.0, &stores.year)
            .unwrap()
            .bind("pr", Vec::new(), &stores.products)
            .unwrap();
        (stores, registry)
    }

    #[test]
    fn defaults_serialize_to_empty_query() {
        let (_stores, registry) = setup();
        assert!(serialize(&registry).is_empty());
    }

    #[test]
    fn changed_values_are_serialized() {
        let (stores, registry) = setup();
        stores.dark.set(true);
        stores.year.set(2022.0);

        let query = serialize(&registry);
        assert_eq!(query.get("dark"), Some("1"));
        assert_eq!(query.get("yr"), Some("2022"));
        assert!(!query.contains_key("pr"));
    }

    #[test]
    fn deserialize_applies_and_ignores() {
        let (stores, registry) = setup();
        let query = Query::parse("pr=Wheat,Rice&utm_source=mail");

        let report = deserialize(&registry, &query, 0);
        assert_eq!(report.applied, vec!["pr".to_string()]);
        assert_eq!(report.ignored, vec!["utm_source".to_string()]);
        assert!(report.is_clean());
        assert_eq!(stores.products.get(), vec!["Wheat", "Rice"]);
    }

    #[test]
    fn failing_write_does_not_block_other_keys() {
        let (stores, mut registry) = setup();
        registry
            .register(MappingEntry::new(
                "cc",
                ValueKind::Number,
                Value::Number(0.0),
                || Value::Number(0.0),
                |_, _| Err(Error::rejected("cc", "slider locked")),
            ))
            .unwrap();

        let query = Query::new().with("cc", "35").with("dark", "1").with("yr", "2021");
        let report = deserialize(&registry, &query, 42);

        assert_eq!(report.conflicts.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.source, URL_SOURCE);
        assert_eq!(conflict.target, "cc");
        assert_eq!(conflict.value, Value::Number(35.0));
        assert_eq!(conflict.timestamp, 42);
        assert!(stores.dark.get());
        assert_eq!(stores.year.get(), 2021.0);
    }

    #[test]
    fn deserialize_is_idempotent() {
        let (stores, registry) = setup();
        let query = Query::parse("dark=1&yr=1999&pr=Maize");

        deserialize(&registry, &query, 0);
        let first = (stores.dark.get(), stores.year.get(), stores.products.get());
        deserialize(&registry, &query, 1);
        let second = (stores.dark.get(), stores.year.get(), stores.products.get());

        assert_eq!(first, second);
    }

    #[test]
    fn full_deserialize_resets_missing_keys() {
        let (stores, registry) = setup();
        stores.dark.set(true);
        stores.year.set(1990.0);

        deserialize_full(&registry, &Query::parse("yr=2000"), 0);
        assert!(!stores.dark.get());
        assert_eq!(stores.year.get(), 2000.0);
    }

    #[test]
    fn reset_writes_defaults() {
        let (stores, registry) = setup();
        stores.dark.set(true);
        stores.products.set(vec!["Rice".into()]);

        let report = reset_to_defaults(&registry, 0);
        assert_eq!(report.applied.len(), 3);
        assert!(serialize(&registry).is_empty());
    }

    #[test]
    fn engine_writes_are_silent() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut registry = Registry::new();
        registry
            .register(MappingEntry::new(
                "yr",
                ValueKind::Number,
                Value::Number(2024.0),
                || Value::Number(2024.0),
                move |_, opts| {
                    sink.borrow_mut().push(opts);
                    Ok(())
                },
            ))
            .unwrap();

        deserialize(&registry, &Query::new().with("yr", "2020"), 0);
        deserialize_full(&registry, &Query::new(), 0);
        reset_to_defaults(&registry, 0);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|opts| opts.silent));
    }
}
