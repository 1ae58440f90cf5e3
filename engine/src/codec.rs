//! Token codec for query parameters.
//!
//! Converts typed [`Value`]s to URL-safe string tokens and back.
//!
//! | Kind | Token |
//! |---|---|
//! | bool | `1` / `0` |
//! | number | decimal, integral values without fraction |
//! | text | unchanged (the query-string layer escapes it) |
//! | list, ≤ 20 items | items percent-encoded and joined with `,` |
//! | list, > 20 items | `b64:` + URL-safe base64 (no padding) of a JSON array |
//!
//! Decoding never fails from the caller's point of view: [`decode`] logs a
//! warning and falls back. [`try_decode`] exposes the underlying error.

use crate::{
    error::Result,
    value::{Item, Value, ValueKind},
    Error,
};
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::warn;

/// Marker in front of a packed list token.
pub const LIST_B64_PREFIX: &str = "b64:";

/// Longest list that is still written inline as comma-separated items.
pub const MAX_INLINE_ITEMS: usize = 20;

/// Characters escaped inside a list item. Same set as `encodeURIComponent`,
/// so `,` is always escaped and splitting on it is unambiguous.
const ITEM_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// URL-safe alphabet, writes no padding, accepts tokens with or without it.
const PACKED: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode `value` for the query string.
///
/// Returns `None` when `value` equals `default`; the caller omits the key.
pub fn encode(value: &Value, default: &Value) -> Option<String> {
    if value == default {
        return None;
    }
    Some(encode_token(value))
}

/// Encode `value` unconditionally.
pub fn encode_token(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => format_number(*n),
        Value::Text(s) => s.clone(),
        Value::List(items) => encode_list(items),
    }
}

/// Decode `token` as `kind`, falling back on malformed input.
///
/// Lists fall back to the empty list, scalars to `default`. A warning is
/// logged either way.
pub fn decode(token: &str, kind: ValueKind, default: &Value) -> Value {
    match try_decode(token, kind) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "falling back after undecodable token");
            if kind.is_list() {
                Value::empty(kind)
            } else {
                default.clone()
            }
        }
    }
}

/// Decode `token` as `kind`.
pub fn try_decode(token: &str, kind: ValueKind) -> Result<Value> {
    match kind {
        ValueKind::Bool => match token {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            _ => Err(invalid(kind, token, "expected 1 or 0")),
        },
        ValueKind::Number => parse_number(token)
            .map(Value::Number)
            .ok_or_else(|| invalid(kind, token, "not a number")),
        ValueKind::Text => Ok(Value::Text(token.to_string())),
        ValueKind::TextList | ValueKind::NumberList => decode_list(token, kind),
    }
}

/// Render a number the way a browser would stringify it.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Covers -0.0 as well.
        return "0".to_string();
    }
    format!("{}", n)
}

fn parse_number(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn encode_list(items: &[Item]) -> String {
    // `""` is the empty list, so `[""]` needs the packed form to survive.
    let lone_empty = matches!(items, [Item::Text(s)] if s.is_empty());
    if items.len() > MAX_INLINE_ITEMS || lone_empty {
        return pack(items);
    }

    items
        .iter()
        .map(|item| match item {
            Item::Text(s) => utf8_percent_encode(s, ITEM_ESCAPE).to_string(),
            Item::Number(n) => format_number(*n),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn pack(items: &[Item]) -> String {
    let json = match serde_json::to_string(items) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "list could not be packed, writing empty list");
            "[]".to_string()
        }
    };
    format!("{}{}", LIST_B64_PREFIX, PACKED.encode(json))
}

fn decode_list(token: &str, kind: ValueKind) -> Result<Value> {
    if let Some(packed) = token.strip_prefix(LIST_B64_PREFIX) {
        let items = unpack(packed, kind)?;
        return Ok(Value::List(coerce_items(items, kind)));
    }

    if token.is_empty() {
        return Ok(Value::List(Vec::new()));
    }

    let items = token
        .split(',')
        .map(|raw| Item::Text(percent_decode_str(raw).decode_utf8_lossy().into_owned()))
        .collect();
    Ok(Value::List(coerce_items(items, kind)))
}

fn unpack(packed: &str, kind: ValueKind) -> Result<Vec<Item>> {
    // Accept the standard alphabet too, in case a token was re-encoded.
    let mut normalized: String = packed
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();
    while normalized.len() % 4 != 0 {
        normalized.push('=');
    }

    let bytes = PACKED
        .decode(normalized.as_bytes())
        .map_err(|e| invalid(kind, packed, format!("base64: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| invalid(kind, packed, format!("json: {}", e)))
}

/// Bring items into the shape `kind` expects.
///
/// Numbers in a text list are stringified; text in a number list is parsed
/// and dropped with a warning when it is not numeric.
fn coerce_items(items: Vec<Item>, kind: ValueKind) -> Vec<Item> {
    match kind {
        ValueKind::NumberList => items
            .into_iter()
            .filter_map(|item| match item {
                Item::Number(n) => Some(Item::Number(n)),
                Item::Text(s) => match parse_number(&s) {
                    Some(n) => Some(Item::Number(n)),
                    None => {
                        warn!(item = %s, "dropping non-numeric list item");
                        None
                    }
                },
            })
            .collect(),
        _ => items
            .into_iter()
            .map(|item| match item {
                Item::Number(n) => Item::Text(format_number(n)),
                text => text,
            })
            .collect(),
    }
}

fn invalid(kind: ValueKind, token: &str, reason: impl Into<String>) -> Error {
    Error::InvalidToken {
        kind: kind.to_string(),
        token: token.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(n: usize) -> Value {
        Value::text_list((0..n).map(|i| format!("C{:02}", i)))
    }

    #[test]
    fn default_is_omitted() {
        assert_eq!(encode(&Value::Bool(false), &Value::Bool(false)), None);
        assert_eq!(
            encode(&Value::Bool(true), &Value::Bool(false)),
            Some("1".to_string())
        );
    }

    #[test]
    fn scalar_tokens() {
        assert_eq!(encode_token(&Value::Bool(false)), "0");
        assert_eq!(encode_token(&Value::Number(2022.0)), "2022");
        assert_eq!(encode_token(&Value::Number(0.25)), "0.25");
        assert_eq!(encode_token(&Value::Number(-0.0)), "0");
        assert_eq!(encode_token(&Value::Text("a b&c".into())), "a b&c");
    }

    #[test]
    fn short_list_is_comma_joined() {
        let value = Value::text_list(["DEU", "BRA"]);
        assert_eq!(encode_token(&value), "DEU,BRA");
    }

    #[test]
    fn list_items_with_separators_are_escaped() {
        let value = Value::text_list(["a,b", "c d"]);
        let token = encode_token(&value);
        assert_eq!(token, "a%2Cb,c%20d");
        assert_eq!(try_decode(&token, ValueKind::TextList).unwrap(), value);
    }

    #[test]
    fn twenty_items_stay_inline() {
        let token = encode_token(&codes(20));
        assert!(!token.starts_with(LIST_B64_PREFIX));
        assert_eq!(token.split(',').count(), 20);
        assert_eq!(try_decode(&token, ValueKind::TextList).unwrap(), codes(20));
    }

    #[test]
    fn twenty_one_items_are_packed() {
        let token = encode_token(&codes(21));
        assert!(token.starts_with(LIST_B64_PREFIX));
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert_eq!(try_decode(&token, ValueKind::TextList).unwrap(), codes(21));
    }

    #[test]
    fn padded_token_is_accepted() {
        let token = encode_token(&codes(25));
        let mut padded = token.clone();
        while (padded.len() - LIST_B64_PREFIX.len()) % 4 != 0 {
            padded.push('=');
        }
        assert_eq!(try_decode(&padded, ValueKind::TextList).unwrap(), codes(25));
    }

    #[test]
    fn malformed_packed_list_decodes_empty() {
        let default = Value::text_list(["DEU"]);
        assert_eq!(
            decode("b64:!!!not-base64", ValueKind::TextList, &default),
            Value::List(vec![])
        );
        // Valid base64, invalid JSON.
        let token = format!("{}{}", LIST_B64_PREFIX, PACKED.encode("{oops"));
        assert_eq!(
            decode(&token, ValueKind::TextList, &default),
            Value::List(vec![])
        );
    }

    #[test]
    fn malformed_scalar_falls_back_to_default() {
        let default = Value::Number(2024.0);
        assert_eq!(decode("soon", ValueKind::Number, &default), default);
        assert_eq!(decode("NaN", ValueKind::Number, &default), default);
        assert_eq!(
            decode("maybe", ValueKind::Bool, &Value::Bool(true)),
            Value::Bool(true)
        );
    }

    #[test]
    fn empty_token_is_empty_list() {
        assert_eq!(
            try_decode("", ValueKind::TextList).unwrap(),
            Value::List(vec![])
        );
        let token = encode(&Value::List(vec![]), &Value::text_list(["DEU"])).unwrap();
        assert_eq!(token, "");
    }

    #[test]
    fn lone_empty_item_survives() {
        let value = Value::text_list([""]);
        let token = encode_token(&value);
        assert!(token.starts_with(LIST_B64_PREFIX));
        assert_eq!(try_decode(&token, ValueKind::TextList).unwrap(), value);
    }

    #[test]
    fn number_list_skips_garbage() {
        assert_eq!(
            try_decode("1,x,2.5", ValueKind::NumberList).unwrap(),
            Value::number_list([1.0, 2.5])
        );
    }

    #[test]
    fn packed_numbers_read_as_text_list() {
        let token = encode_token(&Value::number_list((0..21).map(f64::from)));
        let decoded = try_decode(&token, ValueKind::TextList).unwrap();
        assert_eq!(decoded.as_list().unwrap()[3], Item::Text("3".into()));
    }

    #[test]
    fn bool_accepts_words() {
        assert_eq!(try_decode("true", ValueKind::Bool).unwrap(), Value::Bool(true));
        assert_eq!(try_decode("0", ValueKind::Bool).unwrap(), Value::Bool(false));
        assert!(try_decode("yes", ValueKind::Bool).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_text_list() -> impl Strategy<Value = Vec<String>> {
            prop::collection::vec("\\PC{0,12}", 0..40)
        }

        proptest! {
            #[test]
            fn prop_text_roundtrip(text in "\\PC*") {
                let value = Value::Text(text);
                if let Some(token) = encode(&value, &Value::Text("dashboard".into())) {
                    prop_assert_eq!(try_decode(&token, ValueKind::Text).unwrap(), value);
                }
            }

            #[test]
            fn prop_number_roundtrip(n in -1.0e12f64..1.0e12) {
                let value = Value::Number(n);
                if let Some(token) = encode(&value, &Value::Number(0.0)) {
                    prop_assert_eq!(try_decode(&token, ValueKind::Number).unwrap(), value);
                }
            }

            #[test]
            fn prop_text_list_roundtrip(items in arb_text_list()) {
                let value = Value::text_list(items);
                if let Some(token) = encode(&value, &Value::List(vec![])) {
                    prop_assert_eq!(try_decode(&token, ValueKind::TextList).unwrap(), value);
                }
            }

            #[test]
            fn prop_number_list_roundtrip(items in prop::collection::vec(-1.0e9f64..1.0e9, 0..40)) {
                let value = Value::number_list(items);
                if let Some(token) = encode(&value, &Value::List(vec![])) {
                    prop_assert_eq!(try_decode(&token, ValueKind::NumberList).unwrap(), value);
                }
            }

            #[test]
            fn prop_decode_never_panics(token in "\\PC*") {
                let _ = decode(&token, ValueKind::TextList, &Value::List(vec![]));
                let _ = decode(&token, ValueKind::NumberList, &Value::List(vec![]));
                let _ = decode(&token, ValueKind::Number, &Value::Number(0.0));
            }
        }
    }
}
