//! The login handshake.
//!
//! ```text
//! client                                  server
//!   │ ── Login { version, username, token } ──→ │
//!   │ ←── LoginAck { player_id, name, admin } ── │   → LoggedIn
//!   │ ←── Error { code, message } ────────────── │   → rejected
//! ```
//!
//! The handshake runs in the caller's task, not in the coordinator, so a
//! slow server never blocks other commands. Its result is handed back
//! tagged with the connection id; if the connection was replaced in the
//! meantime the coordinator discards it.

use std::sync::Arc;

use meridian_protocol::{Codec, Envelope, JsonCodec, PROTOCOL_VERSION, Payload, SystemMessage};
use meridian_transport::{Connection, TransportError};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::{GameModel, Player, SessionError, SessionHandle};

/// What the client presents at login.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl<M: GameModel, C: Connection<Error = TransportError>> SessionHandle<M, C> {
    /// Installs `connection` and logs in over it.
    ///
    /// Only legal while the session is not logged in: a live session is
    /// left untouched and `connection` is dropped. The session is
    /// `Connecting` while this runs. On success it is
    /// `LoggedIn` with the acknowledged identity and administrator flag.
    /// On failure the connection is closed and the session goes back to
    /// `LoggedOut`, or to `Disconnected` when this was a reconnect.
    ///
    /// # Errors
    /// - [`SessionError::Precondition`]: already logged in
    /// - [`SessionError::LoginRejected`]: the server refused
    /// - [`SessionError::HandshakeTimeout`]: no answer in time
    /// - [`SessionError::ClosedDuringLogin`] or a transport error
    /// - [`SessionError::StaleConnection`]: another connection was
    ///   installed while this one was logging in
    pub async fn login(
        &self,
        connection: C,
        credentials: &Credentials,
    ) -> Result<Player, SessionError> {
        let connection = Arc::new(connection);
        let conn_id = self.begin_login(Arc::clone(&connection)).await?;
        tracing::info!(%conn_id, username = %credentials.username, "login handshake started");

        let limit = self.config.handshake_timeout();
        let result = match timeout(limit, handshake(connection.as_ref(), credentials)).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::HandshakeTimeout(limit)),
        };

        match result {
            Ok((player, administrator)) => {
                self.complete_login(conn_id, player.clone(), administrator)
                    .await?;
                Ok(player)
            }
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "login failed");
                self.abandon_login(conn_id).await;
                Err(e)
            }
        }
    }
}

async fn handshake<C: Connection<Error = TransportError>>(
    connection: &C,
    credentials: &Credentials,
) -> Result<(Player, bool), SessionError> {
    let codec = JsonCodec;
    let login = Envelope::system(
        0,
        0,
        SystemMessage::Login {
            version: PROTOCOL_VERSION,
            username: credentials.username.clone(),
            token: credentials.token.clone(),
        },
    );
    connection.send(&codec.encode(&login)?).await?;

    loop {
        let Some(frame) = connection.recv().await? else {
            return Err(SessionError::ClosedDuringLogin);
        };
        let envelope: Envelope = match codec.decode(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring undecodable frame during login");
                continue;
            }
        };
        match envelope.payload {
            Payload::System(SystemMessage::LoginAck {
                player_id,
                name,
                administrator,
            }) => {
                return Ok((
                    Player {
                        id: player_id,
                        name,
                    },
                    administrator,
                ));
            }
            Payload::System(SystemMessage::Error { code, message }) => {
                return Err(SessionError::LoginRejected { code, message });
            }
            _ => tracing::debug!("ignoring message received before login acknowledgement"),
        }
    }
}
