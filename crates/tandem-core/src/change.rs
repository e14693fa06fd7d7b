//! Change records: one accepted value update on a stream.

use serde::{Deserialize, Serialize};

use crate::ids::{ConnectionId, GameGuid, StreamId};
use crate::patch::RangeEdit;

/// The record of one accepted change to a stream.
///
/// Sequence numbers are assigned per (game, stream) and increase by
/// exactly 1 per accepted change. The origin id exists only so the
/// originating connection is never sent its own echo; it carries no
/// authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// The game the changed stream belongs to.
    pub game: GameGuid,
    /// The changed stream.
    pub stream: StreamId,
    /// The edits that were applied, in application order.
    pub operations: Vec<RangeEdit>,
    /// The sequence number assigned to this change.
    pub sequence: u64,
    /// The connection that submitted the change.
    pub origin: ConnectionId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_record_serde_roundtrip() {
        let record = ChangeRecord {
            game: GameGuid::parse("abc-123").unwrap(),
            stream: StreamId(1),
            operations: vec![RangeEdit::insert(1, 1, "hi")],
            sequence: 7,
            origin: ConnectionId::new(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ChangeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
