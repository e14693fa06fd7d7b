//! The patch engine: ordered range replacement over line-addressed text.
//!
//! A [`RangeEdit`] addresses a region by 1-indexed start/end line and
//! column, start inclusive and end exclusive, the convention editors use
//! for replace-range payloads. Each edit in a batch applies against the
//! result of the previous edit, so callers supply coordinates already
//! adjusted for earlier edits in the same batch.

use serde::{Deserialize, Serialize};

use crate::error::PatchError;

/// One line/column-addressed text replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeEdit {
    /// First line of the replaced region, 1-indexed.
    pub start_line: u32,
    /// First column of the replaced region, 1-indexed, inclusive.
    pub start_column: u32,
    /// Last line of the replaced region, 1-indexed.
    pub end_line: u32,
    /// Column just past the replaced region on `end_line`, 1-indexed.
    pub end_column: u32,
    /// Replacement text; may itself contain newlines.
    pub text: String,
}

impl RangeEdit {
    /// An insertion at a single position (empty replaced region).
    pub fn insert(line: u32, column: u32, text: impl Into<String>) -> Self {
        Self {
            start_line: line,
            start_column: column,
            end_line: line,
            end_column: column,
            text: text.into(),
        }
    }

    /// A replacement of the region from start to end.
    pub fn replace(
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
            text: text.into(),
        }
    }
}

/// Apply an ordered batch of edits to a text buffer.
///
/// The empty value is treated as a single empty line. An empty batch
/// returns the value unchanged. A range outside the buffer fails the
/// batch with [`PatchError`] and leaves nothing applied; silent
/// corruption is never an acceptable outcome.
pub fn apply_patch(value: &str, edits: &[RangeEdit]) -> Result<String, PatchError> {
    if edits.is_empty() {
        return Ok(value.to_string());
    }

    let mut lines: Vec<String> = value.split('\n').map(str::to_string).collect();

    for (index, edit) in edits.iter().enumerate() {
        apply_one(&mut lines, index, edit)?;
    }

    Ok(lines.join("\n"))
}

fn apply_one(lines: &mut Vec<String>, index: usize, edit: &RangeEdit) -> Result<(), PatchError> {
    let line_count = lines.len();

    for line in [edit.start_line, edit.end_line] {
        if line < 1 || line as usize > line_count {
            return Err(PatchError::LineOutOfRange {
                index,
                line,
                line_count,
            });
        }
    }

    if (edit.end_line, edit.end_column) < (edit.start_line, edit.start_column) {
        return Err(PatchError::InvertedRange {
            index,
            start_line: edit.start_line,
            start_column: edit.start_column,
            end_line: edit.end_line,
            end_column: edit.end_column,
        });
    }

    let first = &lines[edit.start_line as usize - 1];
    let last = &lines[edit.end_line as usize - 1];

    let prefix = slice_to(first, index, edit.start_line, edit.start_column)?;
    let suffix = slice_from(last, index, edit.end_line, edit.end_column)?;

    let merged = format!("{prefix}{}{suffix}", edit.text);
    let replacement: Vec<String> = merged.split('\n').map(str::to_string).collect();

    lines.splice(edit.start_line as usize - 1..edit.end_line as usize, replacement);
    Ok(())
}

/// The part of `line` before 1-indexed `column`.
fn slice_to(line: &str, index: usize, line_no: u32, column: u32) -> Result<String, PatchError> {
    let length = line.chars().count();
    if column < 1 || column as usize - 1 > length {
        return Err(PatchError::ColumnOutOfRange {
            index,
            line: line_no,
            column,
            length,
        });
    }
    Ok(line.chars().take(column as usize - 1).collect())
}

/// The part of `line` from 1-indexed `column` on.
fn slice_from(line: &str, index: usize, line_no: u32, column: u32) -> Result<String, PatchError> {
    let length = line.chars().count();
    if column < 1 || column as usize - 1 > length {
        return Err(PatchError::ColumnOutOfRange {
            index,
            line: line_no,
            column,
            length,
        });
    }
    Ok(line.chars().skip(column as usize - 1).collect())
}
