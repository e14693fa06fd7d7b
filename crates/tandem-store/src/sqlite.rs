//! SQLite implementation of the Persistence trait.
//!
//! This is the primary durable backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use tandem_core::{AccountId, GameGuid, Language, StreamId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Account, AccountRef, GameRow, Persistence, StreamRow};

/// SQLite-based persistence.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(MutexGuard<'_, Connection>) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| StoreError::TaskFailed(format!("connection mutex poisoned: {e}")))?;
            f(guard)
        })
        .await
        .map_err(|e| StoreError::TaskFailed(format!("spawn_blocking failed: {e}")))?
    }
}

#[async_trait]
impl Persistence for SqliteBackend {
    async fn fetch_games_with_streams(&self) -> Result<Vec<StreamRow>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT streams.game, games.guid, games.owner, streams.id,
                        streams.language, streams.active, streams.value
                 FROM streams
                 JOIN games ON streams.game = games.id
                 ORDER BY streams.game, streams.id",
            )?;

            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, bool>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            raw.into_iter()
                .map(|(game_id, guid, owner, stream_id, language, active, value)| {
                    Ok(StreamRow {
                        game_id,
                        guid: GameGuid::parse(guid)?,
                        stream_id: StreamId(stream_id as u32),
                        owner,
                        language: Language::try_from(language as u16)?,
                        active,
                        value,
                    })
                })
                .collect()
        })
        .await
    }

    async fn insert_game(&self, guid: &GameGuid, owner: Option<AccountId>) -> Result<GameRow> {
        let guid = guid.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO games (guid, owner, created_at) VALUES (?1, ?2, ?3)",
                params![guid.as_str(), owner, now_millis()],
            )?;
            Ok(GameRow {
                id: conn.last_insert_rowid(),
                guid,
            })
        })
        .await
    }

    async fn delete_game(&self, game_id: i64) -> Result<()> {
        self.blocking(move |conn| {
            // ON DELETE CASCADE removes the game's streams with it.
            conn.execute("DELETE FROM games WHERE id = ?1", params![game_id])?;
            Ok(())
        })
        .await
    }

    async fn insert_stream(
        &self,
        game_id: i64,
        stream_id: StreamId,
        language: Language,
        active: bool,
        value: &str,
    ) -> Result<()> {
        let value = value.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO streams (game, id, language, active, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![game_id, stream_id.0, language.id(), active, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_stream_value(
        &self,
        game_id: i64,
        stream_id: StreamId,
        value: &str,
    ) -> Result<()> {
        let value = value.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "UPDATE streams SET value = ?1 WHERE game = ?2 AND id = ?3",
                params![value, game_id, stream_id.0],
            )?;
            Ok(())
        })
        .await
    }

    async fn is_guid_used(&self, guid: &GameGuid) -> Result<bool> {
        let guid = guid.clone();
        self.blocking(move |conn| {
            let used: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM games WHERE guid = ?1)",
                params![guid.as_str()],
                |row| row.get(0),
            )?;
            Ok(used)
        })
        .await
    }

    async fn update_stream_player(
        &self,
        game_id: i64,
        stream_id: StreamId,
        player: Option<AccountId>,
    ) -> Result<()> {
        self.blocking(move |conn| {
            conn.execute(
                "UPDATE streams SET player = ?1 WHERE game = ?2 AND id = ?3",
                params![player, game_id, stream_id.0],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_account(&self, who: AccountRef<'_>) -> Result<Option<Account>> {
        let (by_name, by_id) = match who {
            AccountRef::Username(name) => (Some(name.to_string()), None),
            AccountRef::Id(id) => (None, Some(id)),
        };
        self.blocking(move |conn| {
            let map = |row: &rusqlite::Row<'_>| {
                Ok(Account {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                })
            };
            let account = match (by_name, by_id) {
                (Some(name), _) => conn
                    .query_row(
                        "SELECT id, username, password FROM accounts
                         WHERE username = ?1 COLLATE NOCASE",
                        params![name],
                        map,
                    )
                    .optional()?,
                (_, Some(id)) => conn
                    .query_row(
                        "SELECT id, username, password FROM accounts WHERE id = ?1",
                        params![id],
                        map,
                    )
                    .optional()?,
                _ => unreachable!("AccountRef always carries a key"),
            };
            Ok(account)
        })
        .await
    }

    async fn insert_account(&self, username: &str, password_hash: &str) -> Result<AccountId> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO accounts (username, password, created_at) VALUES (?1, ?2, ?3)",
                params![username, password_hash, now_millis()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_fetch_roundtrip() {
        let backend = SqliteBackend::open_memory().unwrap();

        let guid = GameGuid::parse("roundtrip-1").unwrap();
        let game = backend.insert_game(&guid, Some(7)).await.unwrap();
        backend
            .insert_stream(game.id, StreamId(1), Language::Rust, true, "fn main() {}")
            .await
            .unwrap();
        backend
            .insert_stream(game.id, StreamId(2), Language::Python, false, "")
            .await
            .unwrap();

        let rows = backend.fetch_games_with_streams().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].guid, guid);
        assert_eq!(rows[0].stream_id, StreamId(1));
        assert_eq!(rows[0].owner, Some(7));
        assert_eq!(rows[0].language, Language::Rust);
        assert_eq!(rows[0].value, "fn main() {}");
        assert_eq!(rows[1].stream_id, StreamId(2));
        assert!(!rows[1].active);
    }

    #[tokio::test]
    async fn test_guid_usage_check() {
        let backend = SqliteBackend::open_memory().unwrap();
        let guid = GameGuid::parse("taken").unwrap();

        assert!(!backend.is_guid_used(&guid).await.unwrap());
        backend.insert_game(&guid, None).await.unwrap();
        assert!(backend.is_guid_used(&guid).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_game_removes_streams() {
        let backend = SqliteBackend::open_memory().unwrap();
        let guid = GameGuid::parse("doomed").unwrap();
        let game = backend.insert_game(&guid, None).await.unwrap();
        backend
            .insert_stream(game.id, StreamId(1), Language::PlainText, true, "x")
            .await
            .unwrap();

        backend.delete_game(game.id).await.unwrap();

        assert!(!backend.is_guid_used(&guid).await.unwrap());
        assert!(backend.fetch_games_with_streams().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_stream_value() {
        let backend = SqliteBackend::open_memory().unwrap();
        let game = backend
            .insert_game(&GameGuid::parse("update").unwrap(), None)
            .await
            .unwrap();
        backend
            .insert_stream(game.id, StreamId(1), Language::PlainText, true, "before")
            .await
            .unwrap();

        backend
            .update_stream_value(game.id, StreamId(1), "after")
            .await
            .unwrap();

        let rows = backend.fetch_games_with_streams().await.unwrap();
        assert_eq!(rows[0].value, "after");
    }

    #[tokio::test]
    async fn test_account_lookup_by_name_and_id() {
        let backend = SqliteBackend::open_memory().unwrap();
        let id = backend.insert_account("Player_One", "$hash$").await.unwrap();

        let by_name = backend
            .find_account(AccountRef::Username("player_one"))
            .await
            .unwrap()
            .expect("case-insensitive match");
        assert_eq!(by_name.id, id);
        assert_eq!(by_name.password_hash, "$hash$");

        let by_id = backend.find_account(AccountRef::Id(id)).await.unwrap();
        assert_eq!(by_id.unwrap().username, "Player_One");

        let missing = backend
            .find_account(AccountRef::Username("nobody"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tandem.db");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend
                .insert_game(&GameGuid::parse("persisted").unwrap(), None)
                .await
                .unwrap();
        }

        let reopened = SqliteBackend::open(&path).unwrap();
        assert!(reopened
            .is_guid_used(&GameGuid::parse("persisted").unwrap())
            .await
            .unwrap());
    }
}
