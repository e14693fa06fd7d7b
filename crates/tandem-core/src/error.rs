//! Error types for Tandem Core.

use thiserror::Error;

/// Core errors for identifier and language handling.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid game guid {0:?}: only a-z, 0-9, '_' and '-' are allowed")]
    InvalidGuid(String),

    #[error("unknown language id: {0}")]
    UnknownLanguage(u16),
}

/// Errors raised while applying a batch of range edits.
///
/// A range that falls outside the document fails the whole batch loudly;
/// the buffer is never left half-edited.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("edit {index}: line {line} outside document of {line_count} lines")]
    LineOutOfRange {
        index: usize,
        line: u32,
        line_count: usize,
    },

    #[error("edit {index}: column {column} outside line {line} of {length} characters")]
    ColumnOutOfRange {
        index: usize,
        line: u32,
        column: u32,
        length: usize,
    },

    #[error("edit {index}: range start {start_line}:{start_column} is after end {end_line}:{end_column}")]
    InvertedRange {
        index: usize,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    },
}
