//! Error types for the Tandem facade.

use thiserror::Error;

/// Errors surfaced by the engine lifecycle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] tandem_store::StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] tandem_sync::SyncError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
