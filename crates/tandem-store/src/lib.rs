//! # Tandem Store
//!
//! Persistence abstraction and the in-memory document store for Tandem.
//!
//! ## Overview
//!
//! Durable rows live behind the [`Persistence`] trait, with a SQLite
//! implementation ([`SqliteBackend`]) and an in-memory one
//! ([`MemoryBackend`]) for tests. On top of it sits the
//! [`DocumentStore`]: the authoritative in-memory mirror of every game's
//! streams plus the table of active subscriptions. During the process
//! lifetime the mirror is the source of truth; persistence writes are
//! asynchronous and best-effort.
//!
//! ## Key Types
//!
//! - [`Persistence`] - Async trait for durable game/stream/account rows
//! - [`SqliteBackend`] - SQLite-based persistence
//! - [`MemoryBackend`] - In-memory persistence for tests
//! - [`DocumentStore`] - The live document and subscription registry
//!
//! ## Design Notes
//!
//! - **Existence is the guard**: absence of a (game, stream) pair is a
//!   normal condition, never an exception.
//! - **Fire-and-forget durability**: value writes never block or roll
//!   back an accepted in-memory change.
//! - **Compensating rollback**: a failed stream insert during game
//!   creation deletes the game row and the optimistic in-memory entry.

pub mod documents;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use documents::{DocumentStore, Game, StreamDoc, StreamSpec, ValueSnapshot};
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use traits::{Account, AccountRef, GameRow, Persistence, StreamRow};
