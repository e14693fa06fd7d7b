//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur during sync server operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] tandem_store::StoreError),

    /// Accepting or binding the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
