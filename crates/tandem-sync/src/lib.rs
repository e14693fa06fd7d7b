//! # Tandem Sync
//!
//! The synchronization server: accepts socket connections, parses inbound
//! protocol frames, dispatches them against the document store, and fans
//! accepted changes out to every other subscribed connection.
//!
//! ## Key Properties
//!
//! - **Origin exclusion**: a change is never echoed to the connection
//!   that sent it.
//! - **Connection-local errors**: one connection's bad frame never
//!   affects another connection or the server process.
//! - **Two-strike liveness**: a connection survives one missed heartbeat
//!   but not two; a probe against a dead transport removes it at once.
//!
//! ## Frame Flow
//!
//! ```text
//! Client                               Server
//!   |-------- subscribe -------------->|  registers, pushes full values
//!   |<------- value -------------------|
//!   |-------- change ----------------->|  applies patch, bumps sequence
//!   |                                  |--- change ---> other subscribers
//!   |-------- fetch ------------------>|
//!   |<------- value -------------------|
//! ```

pub mod error;
pub mod messages;
pub mod server;
pub mod transport;
pub mod ws;

pub use error::{Result, SyncError};
pub use messages::{ClientFrame, FrameError, ServerFrame};
pub use server::{ServerConfig, SyncServer};
pub use transport::{memory::MemoryPeer, Outbound};
pub use ws::serve;
