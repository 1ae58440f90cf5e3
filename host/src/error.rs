//! Unified error handling for the host.

use crate::config::ConfigError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] urlsync_engine::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid command: {0}")]
    BadCommand(String),

    #[error("Unknown key: {0}")]
    UnknownKey(String),
}

/// Result type alias for the host.
pub type Result<T> = std::result::Result<T, AppError>;
