//! Error types for the session layer.

use std::time::Duration;

use meridian_frontend::DisplayError;
use meridian_protocol::ProtocolError;
use meridian_transport::{ConnectionId, TransportError};

/// Errors that can occur while coordinating a client session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// An operation was called in a state that does not allow it.
    /// The session is left untouched.
    #[error("precondition violated: {0}")]
    Precondition(&'static str),

    /// A model update arrived but no game-state root is assigned.
    #[error("no game state root assigned")]
    NoGameState,

    /// The server answered the login with an error.
    #[error("login rejected ({code}): {message}")]
    LoginRejected { code: u16, message: String },

    /// The server did not acknowledge the login in time.
    #[error("login handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The connection closed before the handshake finished.
    #[error("connection closed during login")]
    ClosedDuringLogin,

    /// The connection was replaced or dropped while this operation was
    /// in flight; its late result is discarded.
    #[error("connection {0} is no longer current")]
    StaleConnection(ConnectionId),

    /// The coordinator task has stopped (after quit, or it panicked).
    #[error("session coordinator is not running")]
    Unavailable,

    /// No presentation surface could be created at start.
    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
