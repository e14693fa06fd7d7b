//! Failure-injecting persistence wrapper.
//!
//! Delegates every call to an inner backend, but can be told to fail
//! specific operations: stream inserts after the Nth success (for
//! compensating-rollback tests) and the first K guid checks reporting
//! "used" (for allocation-retry tests).

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use tandem_core::{AccountId, GameGuid, Language, StreamId};
use tandem_store::{
    Account, AccountRef, GameRow, Persistence, StoreError, StreamRow,
};

/// A persistence wrapper with injectable failures.
pub struct FlakyPersistence<P> {
    inner: P,
    /// Stream inserts still allowed to succeed; usize::MAX means never fail.
    insert_stream_allowance: AtomicUsize,
    /// How many guid checks still report the guid as taken.
    guid_collisions: AtomicUsize,
}

impl<P> FlakyPersistence<P> {
    /// Wrap a backend with no failures armed.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            insert_stream_allowance: AtomicUsize::new(usize::MAX),
            guid_collisions: AtomicUsize::new(0),
        }
    }

    /// Let `allowance` stream inserts succeed, then fail every one after.
    pub fn fail_insert_stream_after(&self, allowance: usize) {
        self.insert_stream_allowance.store(allowance, Ordering::SeqCst);
    }

    /// Report the next `count` guid checks as collisions.
    pub fn report_guid_collisions(&self, count: usize) {
        self.guid_collisions.store(count, Ordering::SeqCst);
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: Persistence> Persistence for FlakyPersistence<P> {
    async fn fetch_games_with_streams(&self) -> Result<Vec<StreamRow>, StoreError> {
        self.inner.fetch_games_with_streams().await
    }

    async fn insert_game(
        &self,
        guid: &GameGuid,
        owner: Option<AccountId>,
    ) -> Result<GameRow, StoreError> {
        self.inner.insert_game(guid, owner).await
    }

    async fn delete_game(&self, game_id: i64) -> Result<(), StoreError> {
        self.inner.delete_game(game_id).await
    }

    async fn insert_stream(
        &self,
        game_id: i64,
        stream_id: StreamId,
        language: Language,
        active: bool,
        value: &str,
    ) -> Result<(), StoreError> {
        let remaining = self
            .insert_stream_allowance
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |allowance| {
                (allowance != usize::MAX).then(|| allowance.saturating_sub(1))
            });
        if remaining == Ok(0) {
            return Err(StoreError::TaskFailed("injected insert failure".into()));
        }
        self.inner
            .insert_stream(game_id, stream_id, language, active, value)
            .await
    }

    async fn update_stream_value(
        &self,
        game_id: i64,
        stream_id: StreamId,
        value: &str,
    ) -> Result<(), StoreError> {
        self.inner.update_stream_value(game_id, stream_id, value).await
    }

    async fn is_guid_used(&self, guid: &GameGuid) -> Result<bool, StoreError> {
        let collide = self
            .guid_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                (left > 0).then(|| left - 1)
            })
            .is_ok();
        if collide {
            return Ok(true);
        }
        self.inner.is_guid_used(guid).await
    }

    async fn update_stream_player(
        &self,
        game_id: i64,
        stream_id: StreamId,
        player: Option<AccountId>,
    ) -> Result<(), StoreError> {
        self.inner
            .update_stream_player(game_id, stream_id, player)
            .await
    }

    async fn find_account(&self, who: AccountRef<'_>) -> Result<Option<Account>, StoreError> {
        self.inner.find_account(who).await
    }

    async fn insert_account(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<AccountId, StoreError> {
        self.inner.insert_account(username, password_hash).await
    }
}
