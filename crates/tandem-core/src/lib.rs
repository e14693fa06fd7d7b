//! # Tandem Core
//!
//! Pure primitives for Tandem: range edits, identifiers, and change records.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over collaboratively edited text.
//!
//! ## Key Types
//!
//! - [`RangeEdit`] - A single line/column-addressed text replacement
//! - [`ChangeRecord`] - The result of applying edits, tagged with a sequence number
//! - [`GameGuid`] - URL-safe identifier for a game of streams
//! - [`StreamId`] - Small integer identifying a stream within its game
//! - [`ConnectionId`] - Transport-assigned identifier for a live connection
//! - [`Language`] - Stream language, resolved against a static table
//!
//! ## Patching
//!
//! Edits apply in order against the evolving buffer. See [`patch`] module.

pub mod change;
pub mod error;
pub mod ids;
pub mod language;
pub mod patch;

pub use change::ChangeRecord;
pub use error::{CoreError, PatchError};
pub use ids::{AccountId, ConnectionId, GameGuid, StreamId};
pub use language::Language;
pub use patch::{apply_patch, RangeEdit};
