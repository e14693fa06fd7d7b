//! # Tandem
//!
//! Collaborative editing of text streams grouped into games, with live
//! updates pushed to every subscriber.
//!
//! This crate is the facade: it wires the document store and the
//! synchronization server into an [`Engine`] with an explicit lifecycle.
//! Nothing here is a process-wide singleton; construct an engine, `init`
//! it, serve it, and shut it down.
//!
//! ```rust,no_run
//! use tandem::{Engine, EngineConfig};
//! use tandem_store::SqliteBackend;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::open("tandem.db")?;
//!     let engine = Engine::init(backend, EngineConfig::default()).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:9030").await?;
//!     engine.serve(listener).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};

pub use tandem_core::{
    apply_patch, ChangeRecord, ConnectionId, GameGuid, Language, RangeEdit, StreamId,
};
pub use tandem_store::{DocumentStore, Persistence, SqliteBackend, StreamSpec};
pub use tandem_sync::{ServerConfig, SyncServer};
