//! Identifiers for games, streams, connections, and accounts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Characters allowed in a game guid. The guid doubles as a URL path
/// segment, so the alphabet is restricted to unreserved characters.
const GUID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz1234567890_-";

/// An opaque, URL-safe identifier for a game.
///
/// Guids are generated randomly; uniqueness is guaranteed by checking
/// against persistence before use, not by the generator itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameGuid(String);

impl GameGuid {
    /// Generate a random guid of `length` characters.
    pub fn generate(length: usize) -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let guid: String = (0..length)
            .map(|_| GUID_ALPHABET[rng.gen_range(0..GUID_ALPHABET.len())] as char)
            .collect();
        Self(guid)
    }

    /// Parse a guid, validating the alphabet.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() || !s.bytes().all(|b| GUID_ALPHABET.contains(&b)) {
            return Err(CoreError::InvalidGuid(s));
        }
        Ok(Self(s))
    }

    /// The guid as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stream identifier, unique within its game.
///
/// Assigned sequentially starting at 1 as streams are created for a game.
/// Never unique across games; all lookups are keyed by (game, stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transport-assigned identifier for one live connection.
///
/// Never chosen by the client. Used for self-echo suppression during
/// broadcast, never for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Assign a fresh connection id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row id in the external account table.
pub type AccountId = i64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_generation_length_and_alphabet() {
        let guid = GameGuid::generate(12);
        assert_eq!(guid.as_str().len(), 12);
        assert!(guid
            .as_str()
            .bytes()
            .all(|b| GUID_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_guid_parse_rejects_bad_characters() {
        assert!(GameGuid::parse("ok_guid-123").is_ok());
        assert!(GameGuid::parse("").is_err());
        assert!(GameGuid::parse("No/Slashes").is_err());
        assert!(GameGuid::parse("UPPER").is_err());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_stream_id_serde_transparent() {
        let id = StreamId(3);
        assert_eq!(serde_json::to_string(&id).unwrap(), "3");
        let back: StreamId = serde_json::from_str("3").unwrap();
        assert_eq!(back, id);
    }
}
