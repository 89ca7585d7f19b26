//! A connection that is either remote or in-process.

use crate::{Connection, ConnectionId, MemoryConnection, TransportError};
#[cfg(feature = "websocket")]
use crate::WebSocketConnection;

/// The transport a client session actually runs over.
///
/// A session is generic over one connection type, but a player can host
/// a local game and later join a remote one (or the reverse) without
/// restarting the client. This enum lets both live behind one type.
pub enum ClientConnection {
    /// A remote server reached over WebSocket.
    #[cfg(feature = "websocket")]
    WebSocket(WebSocketConnection),
    /// An embedded server in the same process.
    Local(MemoryConnection),
}

#[cfg(feature = "websocket")]
impl From<WebSocketConnection> for ClientConnection {
    fn from(conn: WebSocketConnection) -> Self {
        Self::WebSocket(conn)
    }
}

impl From<MemoryConnection> for ClientConnection {
    fn from(conn: MemoryConnection) -> Self {
        Self::Local(conn)
    }
}

impl ClientConnection {
    /// Returns `true` for the in-process variant.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl Connection for ClientConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(conn) => conn.send(data).await,
            Self::Local(conn) => conn.send(data).await,
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(conn) => conn.recv().await,
            Self::Local(conn) => conn.recv().await,
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(conn) => conn.close().await,
            Self::Local(conn) => conn.close().await,
        }
    }

    fn id(&self) -> ConnectionId {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(conn) => conn.id(),
            Self::Local(conn) => conn.id(),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(conn) => conn.is_alive(),
            Self::Local(conn) => conn.is_alive(),
        }
    }
}
