//! Configuration management for the host.

use std::env;

use urlsync_engine::SyncConfig;

/// Host configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Outbound debounce window in milliseconds
    pub debounce_ms: u64,
    /// Cascade debounce window in milliseconds
    pub cascade_debounce_ms: u64,
    /// Query the simulated address bar starts with
    pub initial_query: String,
    /// Simulated store loading time before the ready signal
    pub ready_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = SyncConfig::default();

        let debounce_ms = parse_ms(&lookup, "URLSYNC_DEBOUNCE_MS", defaults.debounce_ms)?;
        let cascade_debounce_ms = parse_ms(
            &lookup,
            "URLSYNC_CASCADE_DEBOUNCE_MS",
            defaults.cascade_debounce_ms,
        )?;
        let initial_query = lookup("URLSYNC_INITIAL_QUERY").unwrap_or_default();
        let ready_delay_ms = parse_ms(&lookup, "URLSYNC_READY_DELAY_MS", 500)?;

        Ok(Self {
            debounce_ms,
            cascade_debounce_ms,
            initial_query,
            ready_delay_ms,
        })
    }

    /// Engine settings derived from this configuration.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            debounce_ms: self.debounce_ms,
            cascade_debounce_ms: self.cascade_debounce_ms,
            ..SyncConfig::default()
        }
    }
}

fn parse_ms(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidMillis { name, value: raw }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number of milliseconds, got {value:?}")]
    InvalidMillis { name: &'static str, value: String },
}
