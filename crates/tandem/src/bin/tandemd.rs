//! Tandem daemon binary.
//!
//! Serves the synchronization protocol over WebSocket, backed by SQLite.
//!
//! # Usage
//!
//! ```bash
//! tandemd --port 9030
//! tandemd --port 9030 --host 127.0.0.1 --db tandem.db
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use tandem::{Engine, EngineConfig};
use tandem_store::SqliteBackend;

/// Tandem synchronization daemon.
#[derive(Parser, Debug)]
#[command(name = "tandemd")]
#[command(about = "Collaborative stream synchronization daemon")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9030")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// SQLite database path
    #[arg(long, default_value = "tandem.db")]
    db: PathBuf,

    /// Seconds between liveness sweeps
    #[arg(long, default_value = "30")]
    heartbeat: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tandem=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let backend = SqliteBackend::open(&args.db)?;
    let engine = Engine::init(
        backend,
        EngineConfig {
            heartbeat_interval: Duration::from_secs(args.heartbeat),
            ..EngineConfig::default()
        },
    )
    .await?;

    let listener = TcpListener::bind(&addr).await?;
    engine.serve(listener).await?;
    Ok(())
}
