//! The synchronization server.
//!
//! Owns the registry of open connections and drives the protocol: every
//! inbound frame is dispatched against the document store, and accepted
//! changes fan out to every other connection subscribed to the same
//! (game, stream) pair. The store is the only holder of document and
//! subscription state; this module never reaches into its maps.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tandem_core::{ChangeRecord, ConnectionId, GameGuid, StreamId};
use tandem_store::{DocumentStore, Persistence};

use crate::messages::{ClientFrame, ServerFrame};
use crate::transport::Outbound;

/// Sync server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interval between liveness sweeps. A connection that misses two
    /// consecutive sweeps is forcibly closed.
    pub heartbeat_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

struct Peer {
    outbound: Arc<dyn Outbound>,
    /// Cleared at each sweep, set again by a probe acknowledgment.
    alive: AtomicBool,
}

/// The synchronization server.
///
/// Explicitly constructed around a store; one per engine.
pub struct SyncServer<P> {
    store: Arc<DocumentStore<P>>,
    peers: RwLock<HashMap<ConnectionId, Peer>>,
    config: ServerConfig,
}

impl<P: Persistence + 'static> SyncServer<P> {
    /// Create a server over the given store.
    pub fn new(store: Arc<DocumentStore<P>>, config: ServerConfig) -> Self {
        Self {
            store,
            peers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// The store this server dispatches against.
    pub fn store(&self) -> &Arc<DocumentStore<P>> {
        &self.store
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.peers.read().unwrap().len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connection Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a freshly accepted transport and assign its id.
    pub fn connect(&self, outbound: Arc<dyn Outbound>) -> ConnectionId {
        let id = ConnectionId::new();
        self.peers.write().unwrap().insert(
            id,
            Peer {
                outbound,
                alive: AtomicBool::new(true),
            },
        );
        tracing::info!("connection {id} connected");
        id
    }

    /// Drop a connection and its subscription. Idempotent.
    pub fn disconnect(&self, connection: ConnectionId) {
        let removed = self.peers.write().unwrap().remove(&connection);
        self.store.remove_subscription(connection);
        if removed.is_some() {
            tracing::info!("connection {connection} disconnected");
        }
    }

    /// Record a probe acknowledgment from a connection.
    pub fn mark_alive(&self, connection: ConnectionId) {
        if let Some(peer) = self.peers.read().unwrap().get(&connection) {
            peer.alive.store(true, Ordering::SeqCst);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Frame Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle one inbound text frame from a connection.
    ///
    /// Every failure here is connection-local: malformed frames, unknown
    /// kinds, unknown (game, stream) pairs, and rejected patches are all
    /// logged and ignored, and the connection stays open.
    pub async fn handle_frame(&self, connection: ConnectionId, text: &str) {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!("connection {connection} sent bad frame: {error}");
                return;
            }
        };

        match frame {
            ClientFrame::Subscribe { game, streams } => {
                let kept = self
                    .store
                    .add_subscription(connection, game.clone(), streams);
                for stream in kept {
                    self.push_value(connection, &game, stream).await;
                }
            }
            ClientFrame::Fetch { game, stream } => {
                self.push_value(connection, &game, stream).await;
            }
            ClientFrame::Latest { game, stream } => {
                match self.store.last_change(&game, stream) {
                    Some(record) => self.send_to(connection, change_frame(&record)).await,
                    None => tracing::debug!(
                        "no change to replay for stream {stream} of game {game}"
                    ),
                }
            }
            ClientFrame::Change {
                game,
                stream,
                changes,
            } => match self.store.apply_change(&game, stream, changes, connection) {
                Ok(Some(record)) => self.broadcast(&record).await,
                Ok(None) => {
                    // Stale target; a normal race, not a client error.
                }
                Err(error) => {
                    tracing::warn!(
                        "connection {connection} change on stream {stream} of game {game} rejected: {error}"
                    );
                }
            },
        }
    }

    /// Push one stream's full value to one connection.
    async fn push_value(&self, connection: ConnectionId, game: &GameGuid, stream: StreamId) {
        let Some(snapshot) = self.store.snapshot(game, stream) else {
            tracing::debug!("fetch of unknown stream {stream} in game {game} ignored");
            return;
        };
        self.send_to(
            connection,
            ServerFrame::Value {
                game: game.clone(),
                stream,
                value: snapshot.value,
                sequence: snapshot.sequence,
            },
        )
        .await;
    }

    /// Send a change record to every other subscriber of its pair.
    async fn broadcast(&self, record: &ChangeRecord) {
        let subscribers = self.store.subscribers_of(&record.game, record.stream);

        let targets: Vec<(ConnectionId, Arc<dyn Outbound>)> = {
            let peers = self.peers.read().unwrap();
            subscribers
                .into_iter()
                .filter(|id| *id != record.origin)
                .filter_map(|id| {
                    peers
                        .get(&id)
                        .map(|peer| (id, Arc::clone(&peer.outbound)))
                })
                .collect()
        };

        for (id, outbound) in targets {
            if let Err(error) = outbound.send(change_frame(record)).await {
                tracing::warn!("failed to push change to connection {id}: {error}");
            } else {
                tracing::debug!(
                    "sent change {} of stream {} to connection {id}",
                    record.sequence,
                    record.stream
                );
            }
        }
    }

    async fn send_to(&self, connection: ConnectionId, frame: ServerFrame) {
        let outbound = {
            let peers = self.peers.read().unwrap();
            peers.get(&connection).map(|peer| Arc::clone(&peer.outbound))
        };
        match outbound {
            Some(outbound) => {
                if let Err(error) = outbound.send(frame).await {
                    tracing::warn!("failed to send to connection {connection}: {error}");
                }
            }
            None => tracing::debug!("send to closed connection {connection} dropped"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Liveness
    // ─────────────────────────────────────────────────────────────────────────

    /// One liveness sweep over every open connection.
    ///
    /// Each sweep clears the alive flag and probes the transport; the
    /// flag comes back through [`mark_alive`](Self::mark_alive) when the
    /// probe is acknowledged. A connection found not-alive missed the
    /// whole previous interval and is closed; a probe that errors means
    /// the transport is already dead, closed immediately.
    pub async fn sweep(&self) {
        let snapshot: Vec<(ConnectionId, Arc<dyn Outbound>, bool)> = {
            let peers = self.peers.read().unwrap();
            peers
                .iter()
                .map(|(id, peer)| {
                    (
                        *id,
                        Arc::clone(&peer.outbound),
                        peer.alive.swap(false, Ordering::SeqCst),
                    )
                })
                .collect()
        };

        for (id, outbound, was_alive) in snapshot {
            if !was_alive {
                tracing::warn!("lost connection to {id}");
                self.disconnect(id);
                outbound.close().await;
            } else if let Err(error) = outbound.ping().await {
                tracing::warn!("probe of connection {id} failed: {error}");
                self.disconnect(id);
                outbound.close().await;
            }
        }
    }

    /// Spawn the periodic liveness sweep.
    pub fn run_heartbeat(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let server = Arc::clone(self);
        let period = self.config.heartbeat_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so connections
            // accepted before the loop get a full interval to ack.
            interval.tick().await;
            loop {
                interval.tick().await;
                server.sweep().await;
            }
        })
    }

    /// Close every connection and drop their subscriptions.
    pub async fn shutdown(&self) {
        let drained: Vec<(ConnectionId, Peer)> =
            self.peers.write().unwrap().drain().collect();
        for (id, peer) in drained {
            self.store.remove_subscription(id);
            peer.outbound.close().await;
        }
        tracing::info!("sync server shut down");
    }
}

fn change_frame(record: &ChangeRecord) -> ServerFrame {
    ServerFrame::Change {
        game: record.game.clone(),
        stream: record.stream,
        operations: record.operations.clone(),
        sequence: record.sequence,
        origin: record.origin,
    }
}
