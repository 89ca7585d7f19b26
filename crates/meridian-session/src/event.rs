//! Session events broadcast to observers (the UI, reconnect loops).

use meridian_frontend::DisplayPreferences;
use meridian_transport::ConnectionId;

use crate::{Phase, Player};

/// A state change observers may want to react to.
///
/// Delivered over a `tokio::sync::broadcast` channel; a slow receiver
/// may miss events (it sees `RecvError::Lagged`) and should fall back to
/// a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server acknowledged a login. `reconnected` is set when the
    /// session came back from `Disconnected`.
    LoggedIn { player: Player, reconnected: bool },

    /// The transport failed. `can_reconnect` is set when the session kept
    /// its identity and is now `Disconnected`.
    ConnectionLost {
        connection: ConnectionId,
        can_reconnect: bool,
    },

    /// The active handler pair changed.
    PhaseChanged { from: Phase, to: Phase },

    /// Identity cleared and game state released.
    LoggedOut,

    /// A fullscreen request was downgraded to a window.
    DisplayFallback { preferences: DisplayPreferences },
}
