//! Core protocol types for Meridian's wire format.
//!
//! Only the envelope and the handful of system messages the client
//! itself must understand (login, logout, errors) live here. Game
//! messages travel as opaque bytes inside [`Payload::Game`]: the session
//! routes them by phase and never looks inside.

use serde::{Deserialize, Serialize};

use std::fmt;

/// The protocol version this client speaks. Sent in
/// [`SystemMessage::Login`]; servers reject mismatches.
pub const PROTOCOL_VERSION: u32 = 1;

// ===========================================================================
// Identity
// ===========================================================================

/// A unique identifier for a player, assigned by the server at login.
///
/// Serialized as a plain number (`#[serde(transparent)]`), so
/// `PlayerId(42)` is `42` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ===========================================================================
// SystemMessage
// ===========================================================================

/// Messages the client's session layer handles itself.
///
/// Internally tagged: `{ "type": "Login", "version": 1, ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: start the login handshake.
    Login {
        version: u32,
        username: String,
        token: Option<String>,
    },

    /// Server → Client: login accepted. `administrator` is set when this
    /// player controls the game (the host of a lobby, usually).
    LoginAck {
        player_id: PlayerId,
        name: String,
        #[serde(default)]
        administrator: bool,
    },

    /// Client → Server: "I'm leaving." Sent best-effort on quit.
    Logout { reason: String },

    /// Server → Client: something went wrong. `code` follows HTTP-style
    /// conventions (400 bad request, 401 unauthorized, 409 conflict).
    Error { code: u16, message: String },
}

// ===========================================================================
// Payload
// ===========================================================================

/// The content of a message: either a system message or game data.
///
/// Adjacently tagged: `{ "type": "Game", "data": [1, 2, 3] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// A session-level message (login, logout, error).
    System(SystemMessage),

    /// Game-specific data, opaque to the session. Phase handlers decode it.
    Game(Vec<u8>),
}

// ===========================================================================
// Envelope
// ===========================================================================

/// The top-level message wrapper. Every message on the wire is an Envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number.
    pub seq: u64,

    /// Milliseconds since the sender started.
    pub timestamp: u64,

    /// The actual message content.
    pub payload: Payload,
}

impl Envelope {
    /// Wraps a system message.
    pub fn system(seq: u64, timestamp: u64, msg: SystemMessage) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::System(msg),
        }
    }

    /// Wraps already-encoded game bytes.
    pub fn game(seq: u64, timestamp: u64, data: Vec<u8>) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::Game(data),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
