//! Transport abstraction for the sync server.
//!
//! The server never touches sockets directly; it talks to each connection
//! through [`Outbound`]: send a frame, probe liveness, close. The
//! WebSocket implementation lives in [`crate::ws`]; an in-memory
//! implementation lives here for tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::ServerFrame;

/// The server's handle on one connected transport.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send one frame to this connection.
    async fn send(&self, frame: ServerFrame) -> Result<()>;

    /// Probe liveness. An error means the transport is already dead.
    async fn ping(&self) -> Result<()>;

    /// Release the transport. Must be safe to call more than once.
    async fn close(&self);
}

/// A simple in-memory peer for testing.
///
/// Frames are delivered on a channel; liveness probes can be made to
/// fail on demand.
pub mod memory {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::error::SyncError;

    /// In-memory transport peer.
    pub struct MemoryPeer {
        tx: mpsc::UnboundedSender<ServerFrame>,
        fail_ping: AtomicBool,
        ping_count: AtomicUsize,
        closed: AtomicBool,
    }

    impl MemoryPeer {
        /// Create a peer and the receiving end of its frame channel.
        pub fn create() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerFrame>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    tx,
                    fail_ping: AtomicBool::new(false),
                    ping_count: AtomicUsize::new(0),
                    closed: AtomicBool::new(false),
                }),
                rx,
            )
        }

        /// Make subsequent probes fail, as a dead transport would.
        pub fn set_fail_ping(&self, fail: bool) {
            self.fail_ping.store(fail, Ordering::SeqCst);
        }

        /// How many probes this peer has received.
        pub fn ping_count(&self) -> usize {
            self.ping_count.load(Ordering::SeqCst)
        }

        /// Whether the server closed this peer.
        pub fn was_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Outbound for MemoryPeer {
        async fn send(&self, frame: ServerFrame) -> Result<()> {
            self.tx
                .send(frame)
                .map_err(|_| SyncError::Transport("peer channel closed".into()))
        }

        async fn ping(&self) -> Result<()> {
            self.ping_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_ping.load(Ordering::SeqCst) {
                return Err(SyncError::Transport("peer transport dead".into()));
            }
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryPeer;
    use super::*;
    use tandem_core::{GameGuid, StreamId};

    #[tokio::test]
    async fn test_memory_peer_delivers_frames() {
        let (peer, mut rx) = MemoryPeer::create();
        let frame = ServerFrame::Value {
            game: GameGuid::parse("abc").unwrap(),
            stream: StreamId(1),
            value: "v".into(),
            sequence: 1,
        };

        peer.send(frame.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), frame);
    }

    #[tokio::test]
    async fn test_memory_peer_ping_failure() {
        let (peer, _rx) = MemoryPeer::create();
        assert!(peer.ping().await.is_ok());

        peer.set_fail_ping(true);
        assert!(peer.ping().await.is_err());
        assert_eq!(peer.ping_count(), 2);
    }
}
