//! Query representation and the query-string layer.
//!
//! A [`Query`] maps parameter keys to already-encoded tokens. Keys are kept
//! sorted, so rendering the same state always yields the same string.

use crate::QueryKey;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Characters escaped in keys and values. `,` and `:` stay literal so list
/// tokens such as `DEU,BRA` and `b64:...` remain readable.
const COMPONENT_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b',')
    .remove(b':');

/// Serialized URL query: key → token. Absent keys mean "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    params: BTreeMap<QueryKey, String>,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self {
            params: BTreeMap::new(),
        }
    }

    /// Parse a query string. A leading `?` is ignored, `+` reads as a space,
    /// and on repeated keys the last occurrence wins.
    pub fn parse(input: &str) -> Self {
        let input = input.strip_prefix('?').unwrap_or(input);
        let mut query = Self::new();

        for pair in input.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key);
            if key.is_empty() {
                continue;
            }
            query.insert(key, decode_component(value));
        }

        query
    }

    /// Render as `key=value&...` without a leading `?`.
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, COMPONENT_ESCAPE),
                    utf8_percent_encode(v, COMPONENT_ESCAPE)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<QueryKey>, token: impl Into<String>) {
        self.params.insert(key.into(), token.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<QueryKey>, token: impl Into<String>) -> Self {
        self.insert(key, token);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.params.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Iterate parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&QueryKey, &String)> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, "?{}", self.to_query_string())
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<QueryKey>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Self::new();
        for (k, v) in iter {
            query.insert(k, v);
        }
        query
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic() {
        let query = Query::parse("?dark=1&cty=DEU,BRA&pnl=simulation");
        assert_eq!(query.get("dark"), Some("1"));
        assert_eq!(query.get("cty"), Some("DEU,BRA"));
        assert_eq!(query.get("pnl"), Some("simulation"));
        assert_eq!(query.len(), 3);
    }

    #[test]
    fn parse_tolerates_junk() {
        let query = Query::parse("&&=orphan&flag&a=1&a=2");
        assert_eq!(query.get("flag"), Some(""));
        assert_eq!(query.get("a"), Some("2"));
        assert_eq!(query.len(), 2);
    }

    #[test]
    fn render_is_sorted_and_keeps_commas() {
        let query = Query::new().with("yr", "2022").with("cty", "DEU,BRA");
        assert_eq!(query.to_query_string(), "cty=DEU,BRA&yr=2022");
        assert_eq!(query.to_string(), "?cty=DEU,BRA&yr=2022");
        assert_eq!(Query::new().to_string(), "");
    }

    #[test]
    fn escapes_round_trip() {
        let query = Query::new()
            .with("pr", "Wheat & Rice")
            .with("cty", "a%2Cb,c")
            .with("q", "x+y=z");
        let rendered = query.to_query_string();
        assert!(!rendered.contains(' '));
        assert_eq!(Query::parse(&rendered), query);
    }

    #[test]
    fn plus_reads_as_space() {
        assert_eq!(Query::parse("pr=Sweet+potatoes").get("pr"), Some("Sweet potatoes"));
    }
}
