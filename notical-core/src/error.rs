//! Error types for the notical ecosystem.

use thiserror::Error;

/// Errors that can occur in notical operations.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source fetch failed: {0}")]
    SourceFetch(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid event time in item '{0}'")]
    InvalidEventTime(String),

    #[error("State store error: {0}")]
    State(String),

    #[error("Another sync run holds the state store lock")]
    StoreLocked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for notical operations.
pub type SyncResult<T> = Result<T, SyncError>;
