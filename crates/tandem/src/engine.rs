//! The engine: store + sync server with an explicit lifecycle.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tandem_store::{DocumentStore, Persistence};
use tandem_sync::{self as sync, ServerConfig, SyncServer};

use crate::config::EngineConfig;
use crate::error::Result;

/// The assembled engine.
///
/// Owns the document store, the synchronization server, and the
/// heartbeat task. Built with [`init`](Self::init), torn down with
/// [`shutdown`](Self::shutdown); it is passed around explicitly, never
/// reached through ambient global state.
pub struct Engine<P: Persistence + 'static> {
    store: Arc<DocumentStore<P>>,
    server: Arc<SyncServer<P>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl<P: Persistence + 'static> Engine<P> {
    /// Construct the engine and load existing games from persistence.
    ///
    /// Loading completes before this returns, so the server never
    /// accepts a connection that could race the initial load.
    pub async fn init(persistence: P, config: EngineConfig) -> Result<Self> {
        let store = Arc::new(DocumentStore::with_guid_length(
            persistence,
            config.guid_length,
        ));
        let streams = store.load().await?;
        tracing::info!("engine initialized with {streams} streams");

        let server = Arc::new(SyncServer::new(
            Arc::clone(&store),
            ServerConfig {
                heartbeat_interval: config.heartbeat_interval,
            },
        ));
        let heartbeat = server.run_heartbeat();

        Ok(Self {
            store,
            server,
            heartbeat: Some(heartbeat),
        })
    }

    /// The document store.
    pub fn store(&self) -> &Arc<DocumentStore<P>> {
        &self.store
    }

    /// The synchronization server.
    pub fn server(&self) -> &Arc<SyncServer<P>> {
        &self.server
    }

    /// Accept WebSocket connections until the process ends.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        sync::serve(listener, Arc::clone(&self.server)).await?;
        Ok(())
    }

    /// Stop the heartbeat and close every connection.
    pub async fn shutdown(mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        self.server.shutdown().await;
        tracing::info!("engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::{GameGuid, Language, StreamId};
    use tandem_store::{MemoryBackend, Persistence as _};

    #[tokio::test]
    async fn test_init_loads_existing_games() {
        let backend = MemoryBackend::new();
        let guid = GameGuid::parse("seeded-game").unwrap();
        let row = backend.insert_game(&guid, None).await.unwrap();
        backend
            .insert_stream(row.id, StreamId(1), Language::Rust, true, "seeded")
            .await
            .unwrap();

        let engine = Engine::init(backend, crate::EngineConfig::default())
            .await
            .unwrap();
        assert!(engine.store().stream_exists(&guid, Some(StreamId(1))));
        assert_eq!(
            engine.store().get_stream(&guid, StreamId(1)).unwrap().value,
            "seeded"
        );
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_clean_on_fresh_engine() {
        let engine = Engine::init(MemoryBackend::new(), crate::EngineConfig::default())
            .await
            .unwrap();
        engine.shutdown().await;
    }
}
