//! Line protocol for the interactive host.
//!
//! Each stdin line is one command, either as words (`set dark 1`) or as a
//! JSON object tagged with `type` (`{"type":"set","key":"dark","value":"1"}`).

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Commands read from stdin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Change a store as the user would, using the key's token syntax.
    Set { key: String, value: String },
    /// Simulate the user editing the address bar or stepping through history.
    Navigate { query: String },
    /// Signal readiness before the configured delay elapses.
    Ready,
    /// Push the stores to the URL immediately.
    Sync,
    Pause,
    Resume,
    Reset,
    /// Print the current URL and store values.
    Show,
    /// Print the sync state with the conflict log.
    Conflicts,
    /// Mark a conflict as handled.
    Resolve { id: u64, resolution: String },
    /// Print the shareable query string.
    Share,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if line.starts_with('{') {
            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| AppError::BadCommand(e.to_string()));
        }

        let mut words = line.splitn(3, char::is_whitespace);
        let name = words.next().unwrap_or_default().to_ascii_lowercase();
        let first = words.next().map(str::trim);
        let rest = words.next().map(str::trim);

        let command = match (name.as_str(), first, rest) {
            ("set", Some(key), value) => Command::Set {
                key: key.to_string(),
                value: value.unwrap_or_default().to_string(),
            },
            ("nav" | "navigate", query, _) => Command::Navigate {
                query: query.unwrap_or_default().to_string(),
            },
            ("resolve", Some(id), resolution) => Command::Resolve {
                id: id
                    .parse()
                    .map_err(|_| AppError::BadCommand(format!("not a conflict id: {}", id)))?,
                resolution: resolution.unwrap_or("resolved").to_string(),
            },
            ("ready", None, _) => Command::Ready,
            ("sync", None, _) => Command::Sync,
            ("pause", None, _) => Command::Pause,
            ("resume", None, _) => Command::Resume,
            ("reset", None, _) => Command::Reset,
            ("show" | "url", None, _) => Command::Show,
            ("conflicts" | "state", None, _) => Command::Conflicts,
            ("share", None, _) => Command::Share,
            ("help" | "?", None, _) => Command::Help,
            ("quit" | "exit", None, _) => Command::Quit,
            _ => return Err(AppError::BadCommand(line.to_string())),
        };
        Ok(Some(command))
    }
}

/// Results written to stdout, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Ok,
    Url { url: String },
    Stores { url: String, stores: serde_json::Value },
    State { state: serde_json::Value },
    Error { message: String },
}

pub const HELP: &str = "\
commands:
  set <key> <token>     change a store (e.g. set cty DEU,BRA)
  nav <query>           simulate address bar navigation (e.g. nav ?dark=1)
  ready                 signal readiness now
  sync                  push stores to the URL without waiting
  pause | resume        stop or restart synchronization
  reset                 restore every store to its default
  show                  print the URL and store values
  conflicts             print the sync state and conflict log
  resolve <id> [note]   mark a conflict as handled
  share                 print the shareable query string
  quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_words() {
        assert_eq!(
            Command::parse("set cty DEU,BRA").unwrap(),
            Some(Command::Set {
                key: "cty".into(),
                value: "DEU,BRA".into()
            })
        );
        assert_eq!(
            Command::parse("  nav ?dark=1&yr=2020 ").unwrap(),
            Some(Command::Navigate {
                query: "?dark=1&yr=2020".into()
            })
        );
        assert_eq!(Command::parse("QUIT").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("").unwrap(), None);
    }

    #[test]
    fn set_keeps_spaces_in_the_value() {
        assert_eq!(
            Command::parse("set pnl trade flows").unwrap(),
            Some(Command::Set {
                key: "pnl".into(),
                value: "trade flows".into()
            })
        );
    }

    #[test]
    fn nav_without_query_clears_the_url() {
        assert_eq!(
            Command::parse("nav").unwrap(),
            Some(Command::Navigate {
                query: String::new()
            })
        );
    }

    #[test]
    fn parses_json() {
        assert_eq!(
            Command::parse(r#"{"type":"resolve","id":3,"resolution":"retried"}"#).unwrap(),
            Some(Command::Resolve {
                id: 3,
                resolution: "retried".into()
            })
        );
        assert_eq!(
            Command::parse(r#"{"type":"ready"}"#).unwrap(),
            Some(Command::Ready)
        );
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(
            Command::parse("launch"),
            Err(AppError::BadCommand(_))
        ));
        assert!(matches!(
            Command::parse("resolve seven"),
            Err(AppError::BadCommand(_))
        ));
        assert!(matches!(
            Command::parse("ready now"),
            Err(AppError::BadCommand(_))
        ));
        assert!(matches!(
            Command::parse(r#"{"type":"set"}"#),
            Err(AppError::BadCommand(_))
        ));
    }

    #[test]
    fn replies_are_tagged() {
        let json = serde_json::to_string(&Reply::Url { url: "?dark=1".into() }).unwrap();
        assert_eq!(json, r#"{"type":"url","url":"?dark=1"}"#);
    }
}
