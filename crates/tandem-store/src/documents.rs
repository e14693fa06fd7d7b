//! The live document store: the in-memory mirror of every game's streams
//! plus the table of active subscriptions.
//!
//! During the process lifetime this mirror is the single source of truth
//! for current values. Persistence is asynchronous and best-effort; a
//! crash may lose the most recent unpersisted change(s).
//!
//! Both maps are only ever touched inside this module, under locks that
//! are released before any await. The per-game stream counter is bumped
//! under the same lock that owns the game entry, before the persistence
//! insert is awaited, which keeps id assignment sequential even when
//! inserts complete out of order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tandem_core::{
    apply_patch, AccountId, ChangeRecord, ConnectionId, GameGuid, Language, RangeEdit, StreamId,
};

use crate::error::{Result, StoreError};
use crate::traits::Persistence;

/// Everything needed to create one stream of a new game.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub language: Language,
    pub active: bool,
    pub value: String,
}

/// One live stream document.
#[derive(Debug, Clone)]
pub struct StreamDoc {
    pub language: Language,
    pub active: bool,
    /// Authoritative current text.
    pub value: String,
    /// Strictly increases by 1 per accepted change; never reset.
    pub change_count: u64,
    /// The most recently applied change, if any.
    pub last_change: Option<ChangeRecord>,
    /// The account playing this stream, settable after creation.
    pub player: Option<AccountId>,
}

impl StreamDoc {
    fn from_spec(spec: &StreamSpec) -> Self {
        Self {
            language: spec.language,
            active: spec.active,
            value: spec.value.clone(),
            change_count: 0,
            last_change: None,
            player: None,
        }
    }
}

/// A created game, as returned by [`DocumentStore::create_game`].
#[derive(Debug, Clone)]
pub struct Game {
    pub guid: GameGuid,
    pub owner: Option<AccountId>,
    /// Stream ids in creation order: 1, 2, ...
    pub stream_ids: Vec<StreamId>,
}

/// A full-value snapshot for pushes: the current text plus the sequence
/// number the next accepted change will receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSnapshot {
    pub value: String,
    pub sequence: u64,
}

struct GameEntry {
    db_id: i64,
    owner: Option<AccountId>,
    /// Last assigned stream id; the next stream gets this + 1.
    next_stream_id: u32,
    streams: HashMap<StreamId, StreamDoc>,
}

struct Subscription {
    game: GameGuid,
    streams: HashSet<StreamId>,
}

/// Default guid length; long enough that collisions are improbable,
/// short enough to share by hand.
pub const DEFAULT_GUID_LENGTH: usize = 12;

/// The in-memory document and subscription registry.
///
/// Explicitly constructed and dependency-injected; there is one per
/// engine, not one per process.
pub struct DocumentStore<P> {
    persistence: Arc<P>,
    games: RwLock<HashMap<GameGuid, GameEntry>>,
    subscriptions: RwLock<HashMap<ConnectionId, Subscription>>,
    guid_length: usize,
}

impl<P: Persistence + 'static> DocumentStore<P> {
    /// Create an empty store over the given persistence backend.
    pub fn new(persistence: P) -> Self {
        Self::with_guid_length(persistence, DEFAULT_GUID_LENGTH)
    }

    /// Create a store that generates guids of the given length.
    pub fn with_guid_length(persistence: P, guid_length: usize) -> Self {
        Self {
            persistence: Arc::new(persistence),
            games: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            guid_length,
        }
    }

    /// The persistence backend.
    pub fn persistence(&self) -> &Arc<P> {
        &self.persistence
    }

    /// Load every existing game and stream from persistence.
    ///
    /// Change history is not persisted, so every stream comes back with
    /// `change_count = 0` and no last change, and each game's stream
    /// counter resumes at its loaded stream count. An empty result is a
    /// fresh deployment, not an error. Returns the number of streams.
    pub async fn load(&self) -> Result<usize> {
        let rows = self.persistence.fetch_games_with_streams().await?;
        let count = rows.len();

        let mut games = self.games.write().unwrap();
        games.clear();
        for row in rows {
            let entry = games.entry(row.guid.clone()).or_insert_with(|| GameEntry {
                db_id: row.game_id,
                owner: row.owner,
                next_stream_id: 0,
                streams: HashMap::new(),
            });
            entry.streams.insert(
                row.stream_id,
                StreamDoc {
                    language: row.language,
                    active: row.active,
                    value: row.value,
                    change_count: 0,
                    last_change: None,
                    player: None,
                },
            );
            entry.next_stream_id = entry.streams.len() as u32;
        }

        tracing::info!("loaded {} games, {count} streams", games.len());
        Ok(count)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Game Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a game with the given streams.
    ///
    /// The guid is drawn repeatedly until persistence confirms it unused;
    /// the alphabet and length make collisions improbable, so there is no
    /// retry cap. Streams are created in order with sequentially assigned
    /// ids. If any stream insert fails, the game row is deleted again,
    /// the optimistic in-memory entry is removed, and the error is
    /// re-raised to the caller.
    pub async fn create_game(
        &self,
        owner: Option<AccountId>,
        specs: Vec<StreamSpec>,
    ) -> Result<Game> {
        let guid = loop {
            let candidate = GameGuid::generate(self.guid_length);
            if !self.persistence.is_guid_used(&candidate).await? {
                break candidate;
            }
            tracing::warn!("guid collision on {candidate}, drawing again");
        };

        let row = self.persistence.insert_game(&guid, owner).await?;

        {
            let mut games = self.games.write().unwrap();
            games.insert(
                guid.clone(),
                GameEntry {
                    db_id: row.id,
                    owner,
                    next_stream_id: 0,
                    streams: HashMap::new(),
                },
            );
        }

        let mut stream_ids = Vec::with_capacity(specs.len());
        for spec in &specs {
            // The id is claimed synchronously under the map lock before the
            // insert is awaited, so ids stay sequential regardless of how
            // the persistence writes complete.
            let stream_id = {
                let mut games = self.games.write().unwrap();
                let entry = games
                    .get_mut(&guid)
                    .ok_or_else(|| StoreError::UnknownGame(guid.to_string()))?;
                entry.next_stream_id += 1;
                StreamId(entry.next_stream_id)
            };

            let inserted = self
                .persistence
                .insert_stream(row.id, stream_id, spec.language, spec.active, &spec.value)
                .await;

            if let Err(error) = inserted {
                self.games.write().unwrap().remove(&guid);
                if let Err(delete_error) = self.persistence.delete_game(row.id).await {
                    tracing::error!(
                        "compensating delete of game {guid} failed: {delete_error}"
                    );
                }
                return Err(error);
            }

            let mut games = self.games.write().unwrap();
            if let Some(entry) = games.get_mut(&guid) {
                entry.streams.insert(stream_id, StreamDoc::from_spec(spec));
            }
            stream_ids.push(stream_id);
            tracing::info!("stream {stream_id} for game {guid} created");
        }

        tracing::info!("created game {guid}");
        Ok(Game {
            guid,
            owner,
            stream_ids,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stream Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether the game, or a specific stream of it, exists.
    ///
    /// This is the universal guard before any mutation; absence is a
    /// normal condition (stale message, race with removal).
    pub fn stream_exists(&self, game: &GameGuid, stream: Option<StreamId>) -> bool {
        let games = self.games.read().unwrap();
        match (games.get(game), stream) {
            (Some(entry), Some(id)) => entry.streams.contains_key(&id),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// A copy of one stream document.
    pub fn get_stream(&self, game: &GameGuid, stream: StreamId) -> Option<StreamDoc> {
        let games = self.games.read().unwrap();
        games.get(game)?.streams.get(&stream).cloned()
    }

    /// The current value plus the sequence number the next change will
    /// receive; what a full-value push carries.
    pub fn snapshot(&self, game: &GameGuid, stream: StreamId) -> Option<ValueSnapshot> {
        let games = self.games.read().unwrap();
        let doc = games.get(game)?.streams.get(&stream)?;
        Some(ValueSnapshot {
            value: doc.value.clone(),
            sequence: doc.change_count + 1,
        })
    }

    /// The most recently applied change, if any.
    pub fn last_change(&self, game: &GameGuid, stream: StreamId) -> Option<ChangeRecord> {
        let games = self.games.read().unwrap();
        games.get(game)?.streams.get(&stream)?.last_change.clone()
    }

    /// The sequence number a pending change would receive.
    pub fn next_sequence(&self, game: &GameGuid, stream: StreamId) -> Option<u64> {
        let games = self.games.read().unwrap();
        Some(games.get(game)?.streams.get(&stream)?.change_count + 1)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a batch of edits to a stream.
    ///
    /// A missing (game, stream) pair is a normal race: logged, `Ok(None)`.
    /// A range outside the document fails loudly without mutating
    /// anything. On success the change counter bumps by exactly 1, the
    /// change record is kept, and the new value is written to persistence
    /// fire-and-forget; a failed write is logged and never rolls back the
    /// in-memory state.
    pub fn apply_change(
        &self,
        game: &GameGuid,
        stream: StreamId,
        operations: Vec<RangeEdit>,
        origin: ConnectionId,
    ) -> Result<Option<ChangeRecord>> {
        let (record, db_id, new_value) = {
            let mut games = self.games.write().unwrap();
            let Some(entry) = games.get_mut(game) else {
                tracing::debug!("change for unknown game {game} ignored");
                return Ok(None);
            };
            let db_id = entry.db_id;
            let Some(doc) = entry.streams.get_mut(&stream) else {
                tracing::debug!("change for unknown stream {stream} in game {game} ignored");
                return Ok(None);
            };

            let new_value = apply_patch(&doc.value, &operations)?;

            doc.value = new_value.clone();
            doc.change_count += 1;
            let record = ChangeRecord {
                game: game.clone(),
                stream,
                operations,
                sequence: doc.change_count,
                origin,
            };
            doc.last_change = Some(record.clone());
            (record, db_id, new_value)
        };

        tracing::debug!("stream {stream} of game {game} now at change {}", record.sequence);

        let persistence = Arc::clone(&self.persistence);
        let (game, value) = (game.clone(), new_value);
        tokio::spawn(async move {
            if let Err(error) = persistence
                .update_stream_value(db_id, stream, &value)
                .await
            {
                tracing::warn!(
                    "failed to persist value of stream {stream} in game {game}: {error}"
                );
            }
        });

        Ok(Some(record))
    }

    /// Record which account plays a stream, in memory and durably.
    pub async fn assign_player(
        &self,
        game: &GameGuid,
        stream: StreamId,
        player: Option<AccountId>,
    ) -> Result<()> {
        let db_id = {
            let mut games = self.games.write().unwrap();
            let entry = games
                .get_mut(game)
                .ok_or_else(|| StoreError::UnknownGame(game.to_string()))?;
            let doc = entry
                .streams
                .get_mut(&stream)
                .ok_or_else(|| StoreError::UnknownStream {
                    game: game.to_string(),
                    stream: stream.0,
                })?;
            doc.player = player;
            entry.db_id
        };

        self.persistence
            .update_stream_player(db_id, stream, player)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────────

    /// Register which streams of a game a connection listens to.
    ///
    /// Stream ids that do not exist at subscribe time are dropped.
    /// Re-subscribing replaces the previous set. Returns the ids that
    /// were kept, in the order they were requested.
    pub fn add_subscription(
        &self,
        connection: ConnectionId,
        game: GameGuid,
        streams: Vec<StreamId>,
    ) -> Vec<StreamId> {
        let kept: Vec<StreamId> = {
            let games = self.games.read().unwrap();
            match games.get(&game) {
                Some(entry) => streams
                    .into_iter()
                    .filter(|id| entry.streams.contains_key(id))
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut subscriptions = self.subscriptions.write().unwrap();
        subscriptions.insert(
            connection,
            Subscription {
                game: game.clone(),
                streams: kept.iter().copied().collect(),
            },
        );
        tracing::info!(
            "connection {connection} subscribed on game {game} to streams: {}",
            kept.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        kept
    }

    /// Drop a connection's subscription. Removing an id that is not
    /// present is a no-op.
    pub fn remove_subscription(&self, connection: ConnectionId) {
        self.subscriptions.write().unwrap().remove(&connection);
    }

    /// Every connection currently subscribed to the exact (game, stream)
    /// pair. The only sanctioned read of the subscription table.
    pub fn subscribers_of(&self, game: &GameGuid, stream: StreamId) -> Vec<ConnectionId> {
        let subscriptions = self.subscriptions.read().unwrap();
        subscriptions
            .iter()
            .filter(|(_, sub)| sub.game == *game && sub.streams.contains(&stream))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().unwrap().len()
    }

    /// Number of games in the mirror.
    pub fn game_count(&self) -> usize {
        self.games.read().unwrap().len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a new account. The credential must already be hashed by the
    /// calling layer; this store never sees plaintext.
    pub async fn create_account(&self, username: &str, password_hash: &str) -> Result<AccountId> {
        if username.is_empty() || password_hash.is_empty() {
            return Err(StoreError::InvalidAccount(
                "missing username or credential".into(),
            ));
        }
        self.persistence.insert_account(username, password_hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn spec(language: Language, value: &str) -> StreamSpec {
        StreamSpec {
            language,
            active: true,
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_game_assigns_sequential_stream_ids() {
        let store = DocumentStore::new(MemoryBackend::new());
        let game = store
            .create_game(
                Some(7),
                vec![spec(Language::Rust, "a"), spec(Language::Python, "b")],
            )
            .await
            .unwrap();

        assert_eq!(game.stream_ids, vec![StreamId(1), StreamId(2)]);
        assert_eq!(game.owner, Some(7));
        assert!(store.stream_exists(&game.guid, Some(StreamId(1))));
        assert!(store.stream_exists(&game.guid, Some(StreamId(2))));
        assert!(!store.stream_exists(&game.guid, Some(StreamId(3))));
    }

    #[tokio::test]
    async fn test_load_reconstructs_streams_and_counters() {
        let backend = MemoryBackend::new();
        let guid = GameGuid::parse("loaded-game").unwrap();
        let row = backend.insert_game(&guid, None).await.unwrap();
        backend
            .insert_stream(row.id, StreamId(1), Language::Rust, true, "one")
            .await
            .unwrap();
        backend
            .insert_stream(row.id, StreamId(2), Language::Rust, true, "two")
            .await
            .unwrap();

        let store = DocumentStore::new(backend);
        assert_eq!(store.load().await.unwrap(), 2);

        let doc = store.get_stream(&guid, StreamId(2)).unwrap();
        assert_eq!(doc.value, "two");
        assert_eq!(doc.change_count, 0);
        assert!(doc.last_change.is_none());
        assert_eq!(store.next_sequence(&guid, StreamId(1)), Some(1));
    }

    #[tokio::test]
    async fn test_load_empty_is_a_fresh_deployment() {
        let store = DocumentStore::new(MemoryBackend::new());
        assert_eq!(store.load().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_next_sequence_tracks_change_count() {
        let store = DocumentStore::new(MemoryBackend::new());
        let game = store
            .create_game(None, vec![spec(Language::PlainText, "")])
            .await
            .unwrap();
        let origin = ConnectionId::new();

        assert_eq!(store.next_sequence(&game.guid, StreamId(1)), Some(1));

        let record = store
            .apply_change(
                &game.guid,
                StreamId(1),
                vec![RangeEdit::insert(1, 1, "x")],
                origin,
            )
            .unwrap()
            .unwrap();
        assert_eq!(record.sequence, 1);
        assert_eq!(store.next_sequence(&game.guid, StreamId(1)), Some(2));

        let record = store
            .apply_change(
                &game.guid,
                StreamId(1),
                vec![RangeEdit::insert(1, 1, "y")],
                origin,
            )
            .unwrap()
            .unwrap();
        assert_eq!(record.sequence, 2);
        assert_eq!(
            store.get_stream(&game.guid, StreamId(1)).unwrap().change_count,
            2
        );
    }

    #[tokio::test]
    async fn test_apply_change_updates_value_and_last_change() {
        let store = DocumentStore::new(MemoryBackend::new());
        let game = store
            .create_game(None, vec![spec(Language::PlainText, "world")])
            .await
            .unwrap();
        let origin = ConnectionId::new();

        let record = store
            .apply_change(
                &game.guid,
                StreamId(1),
                vec![RangeEdit::insert(1, 1, "hello ")],
                origin,
            )
            .unwrap()
            .unwrap();

        let doc = store.get_stream(&game.guid, StreamId(1)).unwrap();
        assert_eq!(doc.value, "hello world");
        assert_eq!(doc.last_change, Some(record));
    }

    #[tokio::test]
    async fn test_apply_change_to_missing_stream_is_a_noop() {
        let store = DocumentStore::new(MemoryBackend::new());
        let game = store
            .create_game(None, vec![spec(Language::PlainText, "")])
            .await
            .unwrap();

        let result = store
            .apply_change(
                &game.guid,
                StreamId(9),
                vec![RangeEdit::insert(1, 1, "x")],
                ConnectionId::new(),
            )
            .unwrap();
        assert!(result.is_none());

        let missing_game = GameGuid::parse("no-such-game").unwrap();
        let result = store
            .apply_change(
                &missing_game,
                StreamId(1),
                vec![RangeEdit::insert(1, 1, "x")],
                ConnectionId::new(),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_invalid_range_fails_without_mutating() {
        let store = DocumentStore::new(MemoryBackend::new());
        let game = store
            .create_game(None, vec![spec(Language::PlainText, "short")])
            .await
            .unwrap();

        let result = store.apply_change(
            &game.guid,
            StreamId(1),
            vec![RangeEdit::insert(99, 1, "x")],
            ConnectionId::new(),
        );
        assert!(matches!(result, Err(StoreError::Patch(_))));

        let doc = store.get_stream(&game.guid, StreamId(1)).unwrap();
        assert_eq!(doc.value, "short");
        assert_eq!(doc.change_count, 0);
    }

    #[tokio::test]
    async fn test_change_value_reaches_persistence() {
        let backend = MemoryBackend::new();
        let store = DocumentStore::new(backend);
        let game = store
            .create_game(None, vec![spec(Language::PlainText, "")])
            .await
            .unwrap();

        store
            .apply_change(
                &game.guid,
                StreamId(1),
                vec![RangeEdit::insert(1, 1, "durable")],
                ConnectionId::new(),
            )
            .unwrap()
            .unwrap();

        // The write is fire-and-forget; give the spawned task a tick.
        tokio::task::yield_now().await;

        let rows = store
            .persistence()
            .fetch_games_with_streams()
            .await
            .unwrap();
        assert_eq!(rows[0].value, "durable");
    }

    #[tokio::test]
    async fn test_subscription_filters_missing_streams() {
        let store = DocumentStore::new(MemoryBackend::new());
        let game = store
            .create_game(None, vec![spec(Language::PlainText, "")])
            .await
            .unwrap();
        let conn = ConnectionId::new();

        let kept = store.add_subscription(
            conn,
            game.guid.clone(),
            vec![StreamId(1), StreamId(5)],
        );
        assert_eq!(kept, vec![StreamId(1)]);
        assert_eq!(store.subscribers_of(&game.guid, StreamId(1)), vec![conn]);
        assert!(store.subscribers_of(&game.guid, StreamId(5)).is_empty());
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_the_set() {
        let store = DocumentStore::new(MemoryBackend::new());
        let game = store
            .create_game(
                None,
                vec![spec(Language::PlainText, ""), spec(Language::PlainText, "")],
            )
            .await
            .unwrap();
        let conn = ConnectionId::new();

        store.add_subscription(conn, game.guid.clone(), vec![StreamId(1)]);
        store.add_subscription(conn, game.guid.clone(), vec![StreamId(2)]);

        assert!(store.subscribers_of(&game.guid, StreamId(1)).is_empty());
        assert_eq!(store.subscribers_of(&game.guid, StreamId(2)), vec![conn]);
        assert_eq!(store.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_subscription_is_idempotent() {
        let store = DocumentStore::new(MemoryBackend::new());
        let conn = ConnectionId::new();
        store.remove_subscription(conn);
        store.remove_subscription(conn);
        assert_eq!(store.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_assign_player() {
        let store = DocumentStore::new(MemoryBackend::new());
        let game = store
            .create_game(None, vec![spec(Language::PlainText, "")])
            .await
            .unwrap();

        store
            .assign_player(&game.guid, StreamId(1), Some(42))
            .await
            .unwrap();
        assert_eq!(
            store.get_stream(&game.guid, StreamId(1)).unwrap().player,
            Some(42)
        );

        let err = store
            .assign_player(&game.guid, StreamId(9), Some(42))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownStream { .. }));
    }
}
