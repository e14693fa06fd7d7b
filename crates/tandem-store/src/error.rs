//! Error types for the store crates.

use thiserror::Error;

use tandem_core::{CoreError, PatchError};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A blocking database task failed to run to completion.
    #[error("database task failed: {0}")]
    TaskFailed(String),

    /// Row contained data the domain types reject.
    #[error("invalid data: {0}")]
    InvalidData(#[from] CoreError),

    /// A batch of edits addressed a range outside the document.
    #[error("patch rejected: {0}")]
    Patch(#[from] PatchError),

    /// Lookup for a game that is not in the store.
    #[error("unknown game: {0}")]
    UnknownGame(String),

    /// Lookup for a stream that is not in its game.
    #[error("unknown stream {stream} in game {game}")]
    UnknownStream { game: String, stream: u32 },

    /// Account row rejected before it reached persistence.
    #[error("invalid account: {0}")]
    InvalidAccount(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
