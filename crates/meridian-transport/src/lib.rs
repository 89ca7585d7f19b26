//! Transport abstraction layer for Meridian.
//!
//! Provides the [`Connection`] trait the session coordinator talks to,
//! plus the implementations a client needs:
//!
//! - [`WebSocketConnection`]: a live link to a remote game server
//! - [`MemoryConnection`]: an in-process pair, used when the client hosts
//!   its own single-player server (and by tests as a fake server)
//! - [`ClientConnection`]: a tagged enum over the two, so one session type
//!   can switch between them on reconnect
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod any;
mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use any::ClientConnection;
pub use error::TransportError;
pub use memory::MemoryConnection;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs across all transports.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
///
/// The coordinator uses it to tell the current connection apart from one
/// it already replaced: events tagged with a stale id are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh, process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single connection to the server that can send and receive bytes.
///
/// The futures are declared `Send` explicitly because the coordinator
/// drives them from spawned Tokio tasks (the session actor and the
/// inbound pump).
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends data to the server.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next message from the server.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection. For WebSocket this waits for the close
    /// handshake to be flushed, so callers should bound it with a timeout.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns `false` once the connection is known to be closed.
    fn is_alive(&self) -> bool;
}
