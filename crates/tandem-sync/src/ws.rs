//! WebSocket transport.
//!
//! One task per connection reads inbound frames and feeds them to the
//! server; a writer task owns the sink half and drains an outbound
//! channel. The server's [`Outbound`] handle sends into that channel, so
//! a dead socket surfaces as a closed channel on the next send or probe.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use async_trait::async_trait;

use tandem_store::Persistence;

use crate::error::{Result, SyncError};
use crate::messages::ServerFrame;
use crate::server::SyncServer;
use crate::transport::Outbound;

/// What the writer task can be asked to put on the socket.
enum Command {
    Frame(ServerFrame),
    Ping,
    Pong(Vec<u8>),
    Close,
}

/// The server's outbound handle for one WebSocket connection.
struct WsPeer {
    tx: mpsc::Sender<Command>,
}

#[async_trait]
impl Outbound for WsPeer {
    async fn send(&self, frame: ServerFrame) -> Result<()> {
        self.tx
            .send(Command::Frame(frame))
            .await
            .map_err(|_| SyncError::Transport("connection writer gone".into()))
    }

    async fn ping(&self) -> Result<()> {
        self.tx
            .send(Command::Ping)
            .await
            .map_err(|_| SyncError::Transport("connection writer gone".into()))
    }

    async fn close(&self) {
        let _ = self.tx.send(Command::Close).await;
    }
}

/// Accept connections forever, one handler task each.
pub async fn serve<P: Persistence + 'static>(
    listener: TcpListener,
    server: Arc<SyncServer<P>>,
) -> Result<()> {
    tracing::info!(
        "listening on ws://{}",
        listener.local_addr().map_err(SyncError::Io)?
    );
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::debug!("accepted connection from {addr}");
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    handle_socket(stream, server).await;
                });
            }
            Err(error) => {
                tracing::error!("failed to accept connection: {error}");
            }
        }
    }
}

/// Drive one socket from handshake to disconnect.
async fn handle_socket<P: Persistence + 'static>(stream: TcpStream, server: Arc<SyncServer<P>>) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(error) => {
            tracing::warn!("websocket handshake failed: {error}");
            return;
        }
    };

    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::channel::<Command>(64);
    let reply = tx.clone();
    let id = server.connect(Arc::new(WsPeer { tx }));

    let writer = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let sent = match command {
                Command::Frame(frame) => match serde_json::to_string(&frame) {
                    Ok(json) => sink.send(Message::Text(json)).await,
                    Err(error) => {
                        tracing::error!("frame serialization failed: {error}");
                        continue;
                    }
                },
                Command::Ping => sink.send(Message::Ping(Vec::new())).await,
                Command::Pong(payload) => sink.send(Message::Pong(payload)).await,
                Command::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };
            if sent.is_err() {
                break;
            }
        }
    });

    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => server.handle_frame(id, &text).await,
            Ok(Message::Pong(_)) => server.mark_alive(id),
            Ok(Message::Ping(payload)) => {
                // Reply through the writer; the sink lives there. A
                // client ping also proves liveness.
                let _ = reply.send(Command::Pong(payload)).await;
                server.mark_alive(id);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!("connection {id} read error: {error}");
                break;
            }
        }
    }

    server.disconnect(id);
    writer.abort();
}
