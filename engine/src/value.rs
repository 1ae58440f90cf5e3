//! Typed values exchanged between stores and the query string.
//!
//! Every query parameter is a string at the wire level. The registry declares
//! a [`ValueKind`] per key so the codec knows how to read a token back, and
//! the [`UrlValue`] trait maps ordinary Rust types onto [`Value`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a bound query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    Bool,
    Number,
    Text,
    TextList,
    NumberList,
}

impl ValueKind {
    /// Whether values of this kind are ordered sequences.
    pub fn is_list(self) -> bool {
        matches!(self, ValueKind::TextList | ValueKind::NumberList)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Number => write!(f, "number"),
            ValueKind::Text => write!(f, "text"),
            ValueKind::TextList => write!(f, "text list"),
            ValueKind::NumberList => write!(f, "number list"),
        }
    }
}

/// A single element of a list value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Item {
    Number(f64),
    Text(String),
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Number(n) => write!(f, "{}", n),
            Item::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Item::Text(s.to_string())
    }
}

impl From<String> for Item {
    fn from(s: String) -> Self {
        Item::Text(s)
    }
}

impl From<f64> for Item {
    fn from(n: f64) -> Self {
        Item::Number(n)
    }
}

/// A value held by a store and mirrored into the query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Item>),
}

impl Value {
    /// The empty value of a kind: `false`, `0`, `""` or `[]`.
    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Number => Value::Number(0.0),
            ValueKind::Text => Value::Text(String::new()),
            ValueKind::TextList | ValueKind::NumberList => Value::List(Vec::new()),
        }
    }

    /// Build a list of text items.
    pub fn text_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Item::Text(s.into())).collect())
    }

    /// Build a list of numeric items.
    pub fn number_list(items: impl IntoIterator<Item = f64>) -> Self {
        Value::List(items.into_iter().map(Item::Number).collect())
    }

    /// Check whether this value can be held by a parameter of `kind`.
    ///
    /// An empty list matches both list kinds.
    pub fn matches(&self, kind: ValueKind) -> bool {
        match (self, kind) {
            (Value::Bool(_), ValueKind::Bool) => true,
            (Value::Number(_), ValueKind::Number) => true,
            (Value::Text(_), ValueKind::Text) => true,
            (Value::List(items), ValueKind::TextList) => {
                items.iter().all(|i| matches!(i, Item::Text(_)))
            }
            (Value::List(items), ValueKind::NumberList) => {
                items.iter().all(|i| matches!(i, Item::Number(_)))
            }
            _ => false,
        }
    }

    /// Best-effort name of this value's shape, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::List(items) if items.iter().all(|i| matches!(i, Item::Number(_))) => {
                if items.is_empty() {
                    "list"
                } else {
                    "number list"
                }
            }
            Value::List(items) if items.iter().all(|i| matches!(i, Item::Text(_))) => {
                "text list"
            }
            Value::List(_) => "mixed list",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Item]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Rust types that can be bound to a query parameter.
pub trait UrlValue: Clone + PartialEq + 'static {
    /// Kind declared to the registry for this type.
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    /// Convert back from a decoded value. `None` if the shape does not fit.
    fn from_value(value: Value) -> Option<Self>;
}

impl UrlValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl UrlValue for f64 {
    const KIND: ValueKind = ValueKind::Number;

    fn to_value(&self) -> Value {
        Value::Number(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_number()
    }
}

impl UrlValue for i64 {
    const KIND: ValueKind = ValueKind::Number;

    fn to_value(&self) -> Value {
        Value::Number(*self as f64)
    }

    fn from_value(value: Value) -> Option<Self> {
        let n = value.as_number()?;
        if n.fract() != 0.0 || n < i64::MIN as f64 || n > i64::MAX as f64 {
            return None;
        }
        Some(n as i64)
    }
}

impl UrlValue for u32 {
    const KIND: ValueKind = ValueKind::Number;

    fn to_value(&self) -> Value {
        Value::Number(f64::from(*self))
    }

    fn from_value(value: Value) -> Option<Self> {
        let n = value.as_number()?;
        if n.fract() != 0.0 || n < 0.0 || n > f64::from(u32::MAX) {
            return None;
        }
        Some(n as u32)
    }
}

impl UrlValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl UrlValue for Vec<String> {
    const KIND: ValueKind = ValueKind::TextList;

    fn to_value(&self) -> Value {
        Value::text_list(self.iter().cloned())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| match item {
                    Item::Text(s) => Some(s),
                    Item::Number(_) => None,
                })
                .collect(),
            _ => None,
        }
    }
}

impl UrlValue for Vec<f64> {
    const KIND: ValueKind = ValueKind::NumberList;

    fn to_value(&self) -> Value {
        Value::number_list(self.iter().copied())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| match item {
                    Item::Number(n) => Some(n),
                    Item::Text(_) => None,
                })
                .collect(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_matches_both_list_kinds() {
        let empty = Value::List(vec![]);
        assert!(empty.matches(ValueKind::TextList));
        assert!(empty.matches(ValueKind::NumberList));
        assert!(!empty.matches(ValueKind::Text));
    }

    #[test]
    fn mixed_list_matches_neither() {
        let mixed = Value::List(vec![Item::from("DEU"), Item::from(3.0)]);
        assert!(!mixed.matches(ValueKind::TextList));
        assert!(!mixed.matches(ValueKind::NumberList));
        assert_eq!(mixed.type_name(), "mixed list");
    }

    #[test]
    fn integer_conversion_rejects_fractions() {
        assert_eq!(i64::from_value(Value::Number(2022.0)), Some(2022));
        assert_eq!(i64::from_value(Value::Number(2022.5)), None);
        assert_eq!(u32::from_value(Value::Number(-1.0)), None);
        assert_eq!(u32::from_value(Value::Number(35.0)), Some(35));
    }

    #[test]
    fn text_list_conversion() {
        let countries = vec!["DEU".to_string(), "BRA".to_string()];
        let value = countries.to_value();
        assert_eq!(value, Value::text_list(["DEU", "BRA"]));
        assert_eq!(Vec::<String>::from_value(value), Some(countries));
        assert_eq!(
            Vec::<String>::from_value(Value::number_list([1.0])),
            None
        );
    }

    #[test]
    fn display_formats() {
        assert_eq!(Value::Number(2022.0).to_string(), "2022");
        assert_eq!(Value::text_list(["Wheat", "Rice"]).to_string(), "[Wheat, Rice]");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    #[test]
    fn json_shape_is_untagged() {
        let value = Value::List(vec![Item::from("DEU"), Item::from(2.5)]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"["DEU",2.5]"#);

        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }
}
