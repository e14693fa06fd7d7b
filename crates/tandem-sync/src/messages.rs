//! Wire protocol frame types.
//!
//! Every frame is one JSON object. Inbound frames carry a `type`
//! discriminator; parsing separates "not JSON at all", "a kind we do not
//! know", and "a known kind missing required fields", because all three
//! are logged differently and all three leave the connection open.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tandem_core::{ConnectionId, GameGuid, RangeEdit, StreamId};

/// The frame kinds a client may send.
const CLIENT_KINDS: &[&str] = &["subscribe", "fetch", "latest", "change"];

/// Client-to-server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Register for pushes on the given streams of a game. Replaces any
    /// previous subscription of this connection.
    Subscribe {
        game: GameGuid,
        streams: Vec<StreamId>,
    },
    /// Ask for one stream's full value, regardless of subscription state.
    Fetch { game: GameGuid, stream: StreamId },
    /// Ask for the most recent change record in patch form.
    Latest { game: GameGuid, stream: StreamId },
    /// Apply edits to a stream and broadcast the result.
    Change {
        game: GameGuid,
        stream: StreamId,
        changes: Vec<RangeEdit>,
    },
}

impl ClientFrame {
    /// Parse one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(FrameError::MissingKind)?
            .to_string();

        if !CLIENT_KINDS.contains(&kind.as_str()) {
            return Err(FrameError::UnknownKind(kind));
        }

        serde_json::from_value(value).map_err(|e| FrameError::MissingField {
            kind,
            detail: e.to_string(),
        })
    }
}

/// Server-to-client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A full-value push: the current text plus the sequence number the
    /// next change will receive. Sent only to the requesting connection.
    Value {
        game: GameGuid,
        stream: StreamId,
        value: String,
        sequence: u64,
    },
    /// A change push: the applied edits, the assigned sequence number,
    /// and the originating connection.
    Change {
        game: GameGuid,
        stream: StreamId,
        operations: Vec<RangeEdit>,
        sequence: u64,
        origin: ConnectionId,
    },
}

/// Why an inbound frame was rejected. Every variant is handled by
/// logging and ignoring; none closes the connection.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame has no string 'type' field")]
    MissingKind,

    #[error("unknown frame kind {0:?}")]
    UnknownKind(String),

    #[error("frame of kind {kind:?} is missing required fields: {detail}")]
    MissingField { kind: String, detail: String },
}
