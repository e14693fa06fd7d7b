//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use tandem_core::{ConnectionId, GameGuid, Language, StreamId};
use tandem_store::{DocumentStore, MemoryBackend, StreamSpec};
use tandem_sync::{MemoryPeer, Outbound, ServerConfig, ServerFrame, SyncServer};

/// A plaintext stream spec with the given initial value.
pub fn plain_spec(value: &str) -> StreamSpec {
    StreamSpec {
        language: Language::PlainText,
        active: true,
        value: value.to_string(),
    }
}

/// An in-memory store holding one game with `streams` empty streams.
pub async fn store_with_game(
    streams: usize,
) -> (Arc<DocumentStore<MemoryBackend>>, GameGuid) {
    let store = Arc::new(DocumentStore::new(MemoryBackend::new()));
    let specs = (0..streams).map(|_| plain_spec("")).collect();
    let game = store
        .create_game(None, specs)
        .await
        .expect("fixture game creation");
    (store, game.guid)
}

/// A sync server over an in-memory store with one game, plus helpers to
/// attach in-memory clients.
pub struct ServerFixture {
    pub server: Arc<SyncServer<MemoryBackend>>,
    pub game: GameGuid,
}

impl ServerFixture {
    /// Attach a fresh in-memory client.
    pub fn client(
        &self,
    ) -> (
        ConnectionId,
        Arc<MemoryPeer>,
        UnboundedReceiver<ServerFrame>,
    ) {
        let (peer, rx) = MemoryPeer::create();
        let id = self.server.connect(Arc::clone(&peer) as Arc<dyn Outbound>);
        (id, peer, rx)
    }

    /// Subscribe a connection to streams of the fixture game.
    pub async fn subscribe(&self, connection: ConnectionId, streams: &[u32]) {
        let frame = serde_json::to_string(&serde_json::json!({
            "type": "subscribe",
            "game": self.game.as_str(),
            "streams": streams,
        }))
        .expect("fixture frame");
        self.server.handle_frame(connection, &frame).await;
    }

    /// Send a single-insert change from a connection.
    pub async fn change(&self, connection: ConnectionId, stream: u32, text: &str) {
        let frame = serde_json::to_string(&serde_json::json!({
            "type": "change",
            "game": self.game.as_str(),
            "stream": stream,
            "changes": [{
                "startLine": 1, "startColumn": 1,
                "endLine": 1, "endColumn": 1,
                "text": text,
            }],
        }))
        .expect("fixture frame");
        self.server.handle_frame(connection, &frame).await;
    }

    /// The fixture game's stream 1 value.
    pub fn value_of(&self, stream: u32) -> Option<String> {
        self.server
            .store()
            .get_stream(&self.game, StreamId(stream))
            .map(|doc| doc.value)
    }
}

/// Build a [`ServerFixture`] with one game of `streams` empty streams.
pub async fn server_fixture(streams: usize) -> ServerFixture {
    let (store, game) = store_with_game(streams).await;
    let server = Arc::new(SyncServer::new(store, ServerConfig::default()));
    ServerFixture { server, game }
}
