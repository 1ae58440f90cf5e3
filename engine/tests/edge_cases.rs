//! Edge case tests for urlsync-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use std::rc::Rc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use urlsync_engine::codec::{decode, encode, encode_token, try_decode};
use urlsync_engine::{
    Error, ManualClock, MappingEntry, MemoryRouter, Query, Registry, Signal, SyncConfig,
    SyncContext, SyncController, Value, ValueKind, LIST_B64_PREFIX, MAX_INLINE_ITEMS,
};

/// Encode, push through the query-string layer, parse and decode again.
fn through_url(value: &Value, kind: ValueKind) -> Value {
    let token = encode_token(value);
    let url = Query::new().with("k", token).to_string();
    let parsed = Query::parse(&url);
    decode(parsed.get("k").unwrap(), kind, &Value::empty(kind))
}

// ============================================================================
// Empty Values
// ============================================================================

#[test]
fn empty_list_is_the_empty_token() {
    assert_eq!(encode_token(&Value::List(vec![])), "");
    assert_eq!(
        try_decode("", ValueKind::TextList).unwrap(),
        Value::List(vec![])
    );
}

#[test]
fn list_of_one_empty_string_survives() {
    let value = Value::text_list([""]);
    let token = encode_token(&value);
    assert!(token.starts_with(LIST_B64_PREFIX));
    assert_eq!(through_url(&value, ValueKind::TextList), value);
}

#[test]
fn list_with_empty_items_among_others() {
    let value = Value::text_list(["", "a", ""]);
    assert_eq!(encode_token(&value), ",a,");
    assert_eq!(through_url(&value, ValueKind::TextList), value);
}

#[test]
fn empty_text_differs_from_default() {
    let default = Value::Text("dashboard".into());
    assert_eq!(
        encode(&Value::Text(String::new()), &default),
        Some(String::new())
    );
}

#[test]
fn empty_query_strings() {
    for input in ["", "?", "&&", "?&"] {
        assert!(Query::parse(input).is_empty(), "input {:?}", input);
    }
    assert_eq!(Query::new().to_string(), "");
}

// ============================================================================
// Unicode and Reserved Characters
// ============================================================================

#[test]
fn unicode_text_round_trips() {
    let texts = vec![
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Ω≈ç√∫",
        "Hello\nWorld\tTab",
    ];

    for text in texts {
        let value = Value::Text(text.to_string());
        assert_eq!(through_url(&value, ValueKind::Text), value, "text {:?}", text);
    }
}

#[test]
fn unicode_list_items_round_trip() {
    let value = Value::text_list(["São Paulo", "Zürich", "東京"]);
    assert_eq!(through_url(&value, ValueKind::TextList), value);
}

#[test]
fn reserved_characters_in_items() {
    let value = Value::text_list(["a,b", "x=y&z", "100%", "q?", "#hash", "plus+sign", "b64:no"]);
    assert_eq!(through_url(&value, ValueKind::TextList), value);
}

#[test]
fn item_that_looks_packed_is_not_unpacked() {
    // Single item `b64:...` must be escaped so it is not mistaken for a packed list.
    let value = Value::text_list(["b64:W10"]);
    let token = encode_token(&value);
    assert!(!token.starts_with(LIST_B64_PREFIX));
    assert_eq!(through_url(&value, ValueKind::TextList), value);
}

#[test]
fn plus_in_query_reads_as_space() {
    let query = Query::parse("?pnl=trade+flows");
    assert_eq!(query.get("pnl"), Some("trade flows"));
}

// ============================================================================
// Long Lists
// ============================================================================

#[test]
fn very_long_list_round_trips() {
    let value = Value::text_list((0..1_000).map(|i| format!("item-{}", i)));
    let token = encode_token(&value);
    assert!(token.starts_with(LIST_B64_PREFIX));
    assert!(!token.contains('='));
    assert_eq!(through_url(&value, ValueKind::TextList), value);
}

#[test]
fn threshold_counts_items_not_characters() {
    let long_items = Value::text_list((0..MAX_INLINE_ITEMS).map(|_| "x".repeat(200)));
    assert!(!encode_token(&long_items).starts_with(LIST_B64_PREFIX));
}

#[test]
fn packed_number_list() {
    let value = Value::number_list((0..30).map(f64::from));
    let token = encode_token(&value);
    assert!(token.starts_with(LIST_B64_PREFIX));
    assert_eq!(through_url(&value, ValueKind::NumberList), value);
}

// ============================================================================
// Malformed Tokens
// ============================================================================

#[test]
fn malformed_packed_tokens_fall_back_to_empty() {
    let garbage = ["b64:", "b64:%%%", "b64:!!!!", "b64:e30", "b64:bm90IGpzb24"];
    for token in garbage {
        let value = decode(token, ValueKind::TextList, &Value::text_list(["x"]));
        assert_eq!(value, Value::List(vec![]), "token {:?}", token);
    }
}

#[test]
fn packed_token_with_standard_alphabet_or_padding() {
    // Standard alphabet with `=` padding.
    let json = r#"["a?b","c>d"]"#;
    let standard = STANDARD.encode(json);
    let value = decode(
        &format!("{}{}", LIST_B64_PREFIX, standard),
        ValueKind::TextList,
        &Value::List(vec![]),
    );
    assert_eq!(value, Value::text_list(["a?b", "c>d"]));
}

#[test]
fn scalar_fallbacks_use_the_default() {
    let year = Value::Number(2024.0);
    assert_eq!(decode("NaN", ValueKind::Number, &year), year);
    assert_eq!(decode("twenty", ValueKind::Number, &year), year);
    assert_eq!(decode("", ValueKind::Number, &year), year);
    assert_eq!(decode("yes", ValueKind::Bool, &Value::Bool(true)), Value::Bool(true));
}

#[test]
fn number_edge_values() {
    assert_eq!(try_decode("1e3", ValueKind::Number).unwrap(), Value::Number(1000.0));
    assert_eq!(try_decode("-0", ValueKind::Number).unwrap(), Value::Number(0.0));
    assert_eq!(encode_token(&Value::Number(-0.0)), "0");
    assert!(matches!(
        try_decode("NaN", ValueKind::Number),
        Err(Error::InvalidToken { .. })
    ));
}

#[test]
fn number_list_drops_non_numeric_items() {
    assert_eq!(
        try_decode("1,two,3", ValueKind::NumberList).unwrap(),
        Value::number_list([1.0, 3.0])
    );
}

// ============================================================================
// Registry Edge Cases
// ============================================================================

#[test]
fn duplicate_key_is_rejected() {
    let a = Signal::new(false);
    let b = Signal::new(true);
    let mut registry = Registry::new();
    registry.bind("dark", false, &a).unwrap();

    let err = registry.bind("dark", true, &b).unwrap_err();
    assert_eq!(err, Error::DuplicateKey("dark".into()));
    assert_eq!(registry.len(), 1);
}

#[test]
fn default_of_wrong_kind_is_rejected() {
    let mut registry = Registry::new();
    let result = registry.register(MappingEntry::new(
        "yr",
        ValueKind::Number,
        Value::Text("2024".into()),
        || Value::Number(2024.0),
        |_, _| Ok(()),
    ));
    assert!(matches!(result, Err(Error::TypeMismatch { .. })));
}

#[test]
fn empty_registry_syncs_nothing() {
    let clock = Rc::new(ManualClock::new(0));
    let router = Rc::new(MemoryRouter::from_query_string("?dark=1"));
    let ctx = SyncContext::new(Registry::new(), clock.clone(), SyncConfig::default());
    let controller = SyncController::new(ctx, router.clone());
    controller.attach();

    assert_eq!(controller.signal_ready().unwrap(), 1);
    assert!(controller.context().serialize().is_empty());
    clock.advance(1_000);
    assert!(!controller.tick());
    assert_eq!(router.url(), "?dark=1");
}

#[test]
fn zero_debounce_flushes_on_next_tick() {
    let dark = Signal::new(false);
    let mut registry = Registry::new();
    registry.bind("dark", false, &dark).unwrap();

    let config = SyncConfig {
        debounce_ms: 0,
        ..SyncConfig::default()
    };
    let clock = Rc::new(ManualClock::new(0));
    let router = Rc::new(MemoryRouter::default());
    let controller = SyncController::new(SyncContext::new(registry, clock, config), router.clone());
    controller.attach();
    controller.signal_ready().unwrap();

    dark.set(true);
    assert!(controller.tick());
    assert_eq!(router.url(), "?dark=1");
}
