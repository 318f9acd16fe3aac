//! Error types for linrelay-core

use thiserror::Error;

/// Main error type for the linrelay-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Tracker/API error
    #[error("tracker error: {0}")]
    Tracker(String),

    /// Session lock error
    #[error("lock error: {0}")]
    Lock(String),
}

/// Result type alias for linrelay-core
pub type Result<T> = std::result::Result<T, Error>;
