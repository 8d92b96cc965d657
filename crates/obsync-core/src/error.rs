//! Error types for obsync-core

use thiserror::Error;

/// Result type alias using obsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in obsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested state, conflict or history entry is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote metadata lookup failed
    #[error("Remote error: {0}")]
    Remote(String),

    /// Task was never started because the batch was cancelled
    #[error("Task cancelled")]
    Cancelled,

    /// Caller-supplied task failed
    #[error("Task failed: {0}")]
    Task(String),
}

impl Error {
    /// Whether this error means "nothing there" rather than a real failure.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
