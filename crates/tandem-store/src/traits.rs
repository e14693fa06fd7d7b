//! Persistence trait: the abstract interface for durable rows.
//!
//! This trait is the seam between the live document store and whatever
//! holds the game/stream/account tables. Implementations include SQLite
//! (primary) and in-memory (for tests). Every call is async and
//! individually fallible; the caller decides whether a failure is
//! log-only or must abort an operation.

use async_trait::async_trait;
use tandem_core::{AccountId, GameGuid, Language, StreamId};

use crate::error::Result;

/// One game+stream join row, as loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRow {
    /// Database id of the owning game row.
    pub game_id: i64,
    /// The game's public guid.
    pub guid: GameGuid,
    /// The stream's per-game id.
    pub stream_id: StreamId,
    /// Owning account, if the game is not anonymous.
    pub owner: Option<AccountId>,
    pub language: Language,
    pub active: bool,
    /// Current text value at the time of the last durable write.
    pub value: String,
}

/// The persisted identity of a game row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRow {
    pub id: i64,
    pub guid: GameGuid,
}

/// A stored account. The credential is an opaque hash; hashing itself
/// happens outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub password_hash: String,
}

/// Account lookup key: by name (case-insensitive) or by row id.
#[derive(Debug, Clone, Copy)]
pub enum AccountRef<'a> {
    Username(&'a str),
    Id(AccountId),
}

/// The async interface for durable game, stream, and account rows.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Load every stream joined with its game, for startup reconstruction.
    async fn fetch_games_with_streams(&self) -> Result<Vec<StreamRow>>;

    /// Insert a game row. The guid must already be known to be unused.
    async fn insert_game(&self, guid: &GameGuid, owner: Option<AccountId>) -> Result<GameRow>;

    /// Delete a game row (and its streams). Used as the compensating
    /// action when stream creation fails part-way.
    async fn delete_game(&self, game_id: i64) -> Result<()>;

    /// Insert a stream row with an already-assigned per-game id.
    async fn insert_stream(
        &self,
        game_id: i64,
        stream_id: StreamId,
        language: Language,
        active: bool,
        value: &str,
    ) -> Result<()>;

    /// Overwrite a stream's durable value.
    async fn update_stream_value(
        &self,
        game_id: i64,
        stream_id: StreamId,
        value: &str,
    ) -> Result<()>;

    /// Whether a guid is already taken by any game row.
    async fn is_guid_used(&self, guid: &GameGuid) -> Result<bool>;

    /// Record which account plays a stream.
    async fn update_stream_player(
        &self,
        game_id: i64,
        stream_id: StreamId,
        player: Option<AccountId>,
    ) -> Result<()>;

    /// Look up an account by name or id.
    async fn find_account(&self, who: AccountRef<'_>) -> Result<Option<Account>>;

    /// Insert an account row with an already-hashed credential.
    async fn insert_account(&self, username: &str, password_hash: &str) -> Result<AccountId>;
}
