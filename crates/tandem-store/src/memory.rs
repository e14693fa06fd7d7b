//! In-memory implementation of the Persistence trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no durability.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use tandem_core::{AccountId, GameGuid, Language, StreamId};

use crate::error::{Result, StoreError};
use crate::traits::{Account, AccountRef, GameRow, Persistence, StreamRow};

/// In-memory persistence.
///
/// All data is lost when the backend is dropped. Thread-safe via RwLock.
pub struct MemoryBackend {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_game_id: i64,
    next_account_id: i64,
    /// game row id -> (guid, owner)
    games: HashMap<i64, (GameGuid, Option<AccountId>)>,
    /// (game row id, stream id) -> row
    streams: HashMap<(i64, StreamId), StreamRecord>,
    accounts: Vec<Account>,
}

struct StreamRecord {
    language: Language,
    active: bool,
    value: String,
    player: Option<AccountId>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Persistence for MemoryBackend {
    async fn fetch_games_with_streams(&self) -> Result<Vec<StreamRow>> {
        let inner = self.inner.read().unwrap();

        let mut rows: Vec<StreamRow> = inner
            .streams
            .iter()
            .filter_map(|((game_id, stream_id), record)| {
                let (guid, owner) = inner.games.get(game_id)?;
                Some(StreamRow {
                    game_id: *game_id,
                    guid: guid.clone(),
                    stream_id: *stream_id,
                    owner: *owner,
                    language: record.language,
                    active: record.active,
                    value: record.value.clone(),
                })
            })
            .collect();

        rows.sort_by_key(|row| (row.game_id, row.stream_id));
        Ok(rows)
    }

    async fn insert_game(&self, guid: &GameGuid, owner: Option<AccountId>) -> Result<GameRow> {
        let mut inner = self.inner.write().unwrap();
        inner.next_game_id += 1;
        let id = inner.next_game_id;
        inner.games.insert(id, (guid.clone(), owner));
        Ok(GameRow {
            id,
            guid: guid.clone(),
        })
    }

    async fn delete_game(&self, game_id: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.games.remove(&game_id);
        inner.streams.retain(|(game, _), _| *game != game_id);
        Ok(())
    }

    async fn insert_stream(
        &self,
        game_id: i64,
        stream_id: StreamId,
        language: Language,
        active: bool,
        value: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.games.contains_key(&game_id) {
            return Err(StoreError::UnknownGame(game_id.to_string()));
        }
        inner.streams.insert(
            (game_id, stream_id),
            StreamRecord {
                language,
                active,
                value: value.to_string(),
                player: None,
            },
        );
        Ok(())
    }

    async fn update_stream_value(
        &self,
        game_id: i64,
        stream_id: StreamId,
        value: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(record) = inner.streams.get_mut(&(game_id, stream_id)) {
            record.value = value.to_string();
        }
        Ok(())
    }

    async fn is_guid_used(&self, guid: &GameGuid) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner.games.values().any(|(g, _)| g == guid))
    }

    async fn update_stream_player(
        &self,
        game_id: i64,
        stream_id: StreamId,
        player: Option<AccountId>,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(record) = inner.streams.get_mut(&(game_id, stream_id)) {
            record.player = player;
        }
        Ok(())
    }

    async fn find_account(&self, who: AccountRef<'_>) -> Result<Option<Account>> {
        let inner = self.inner.read().unwrap();
        let account = match who {
            AccountRef::Username(name) => inner
                .accounts
                .iter()
                .find(|a| a.username.eq_ignore_ascii_case(name)),
            AccountRef::Id(id) => inner.accounts.iter().find(|a| a.id == id),
        };
        Ok(account.cloned())
    }

    async fn insert_account(&self, username: &str, password_hash: &str) -> Result<AccountId> {
        let mut inner = self.inner.write().unwrap();
        inner.next_account_id += 1;
        let id = inner.next_account_id;
        inner.accounts.push(Account {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        let guid = GameGuid::parse("mem-game").unwrap();

        let game = backend.insert_game(&guid, Some(1)).await.unwrap();
        backend
            .insert_stream(game.id, StreamId(1), Language::Go, true, "package main")
            .await
            .unwrap();

        let rows = backend.fetch_games_with_streams().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].guid, guid);
        assert_eq!(rows[0].value, "package main");
    }

    #[tokio::test]
    async fn test_delete_game_cascades() {
        let backend = MemoryBackend::new();
        let game = backend
            .insert_game(&GameGuid::parse("gone").unwrap(), None)
            .await
            .unwrap();
        backend
            .insert_stream(game.id, StreamId(1), Language::PlainText, true, "")
            .await
            .unwrap();

        backend.delete_game(game.id).await.unwrap();
        assert!(backend.fetch_games_with_streams().await.unwrap().is_empty());
        assert!(!backend
            .is_guid_used(&GameGuid::parse("gone").unwrap())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_insert_stream_requires_game_row() {
        let backend = MemoryBackend::new();
        let result = backend
            .insert_stream(99, StreamId(1), Language::PlainText, true, "")
            .await;
        assert!(result.is_err());
    }
}
