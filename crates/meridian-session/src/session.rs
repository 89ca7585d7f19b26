//! The session state machine.
//!
//! [`Session`] is the synchronous core of the coordinator: it holds the
//! identity, connection, phase, flags, and the game-state root, and it
//! checks every transition. It does no I/O. The coordinator actor owns
//! one and drives it from its event loop, which is what makes all of
//! these fields change in a single order.
//!
//! ```text
//!            set_connection            complete_login / set_logged_in(true)
//! LoggedOut ───────────────→ Connecting ─────────────────────→ LoggedIn
//!     ↑                        │  ↑                               │
//!     │     connection lost    │  │ set_connection                │ connection lost
//!     ├────────────────────────┘  │                               ▼
//!     │                           └───────────────────────── Disconnected
//!     │                                                           │
//!     └──────────────── set_logged_in(false) (from any state) ────┘
//! ```
//!
//! A failed reconnect (`Connecting` entered from `Disconnected`) goes back
//! to `Disconnected`, not `LoggedOut`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use meridian_protocol::PlayerId;
use meridian_transport::{Connection, ConnectionId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{
    Action, GameModel, GameRoot, ModelGateway, PhaseHandlers, SessionConfig, SessionError,
    SessionEvent, SessionView,
};

const EVENT_CAPACITY: usize = 64;

// ===========================================================================
// Types
// ===========================================================================

/// Which handler pair is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Lobby: choosing or creating a game.
    PreGame,
    /// A game is running.
    InGame,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreGame => write!(f, "pre-game"),
            Self::InGame => write!(f, "in-game"),
        }
    }
}

/// Connection and authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    LoggedOut,
    /// A connection is set and the login handshake is running.
    Connecting,
    LoggedIn,
    /// The transport failed while logged in. Identity and game state are
    /// kept for a reconnect.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged-out"),
            Self::Connecting => write!(f, "connecting"),
            Self::LoggedIn => write!(f, "logged-in"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// The player this client acts for, as acknowledged by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

/// Session fields read together in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub identity: Option<Player>,
    pub state: ConnectionState,
    pub phase: Phase,
    pub administrator: bool,
    pub single_player: bool,
    pub connection: Option<ConnectionId>,
    pub has_game_root: bool,
}

/// Something the session cannot do itself because it involves I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(Vec<u8>),
    PlaySound(meridian_frontend::SoundId),
    PlayMusic(meridian_frontend::SoundId),
    Logout,
}

// ===========================================================================
// Session
// ===========================================================================

/// Synchronous session core. See the module docs for the state machine.
pub struct Session<M: GameModel, C> {
    state: ConnectionState,
    identity: Option<Player>,
    phase: Phase,
    administrator: bool,
    single_player: bool,
    /// Set while a `Connecting` state was entered from `Disconnected`.
    reconnecting: bool,
    connection: Option<Arc<C>>,
    gateway: ModelGateway<M>,
    handlers: PhaseHandlers<M>,
    /// Accepted inbound payloads, stamped with the phase that was active
    /// when they were accepted.
    pending: VecDeque<(Phase, Vec<u8>)>,
    events: broadcast::Sender<SessionEvent>,
}

impl<M: GameModel, C: Connection> Session<M, C> {
    /// Creates a logged-out session with `PreGame` active.
    pub fn new(config: &SessionConfig, handlers: PhaseHandlers<M>) -> Self {
        let config = config.clone().validated();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut session = Self {
            state: ConnectionState::LoggedOut,
            identity: None,
            phase: Phase::PreGame,
            administrator: config.administrator,
            single_player: config.single_player,
            reconnecting: false,
            connection: None,
            gateway: ModelGateway::new(),
            handlers,
            pending: VecDeque::new(),
            events,
        };
        let view = session.view();
        session
            .handlers
            .pair_mut(Phase::PreGame)
            .controller
            .on_activate(&view);
        tracing::info!(
            single_player = session.single_player,
            "session started in pre-game"
        );
        session
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    // -- Accessors --------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == ConnectionState::LoggedIn
    }

    /// The player, visible only while logged in or disconnected.
    pub fn identity(&self) -> Option<&Player> {
        match self.state {
            ConnectionState::LoggedIn | ConnectionState::Disconnected => self.identity.as_ref(),
            ConnectionState::LoggedOut | ConnectionState::Connecting => None,
        }
    }

    pub fn game_root(&self) -> Option<&GameRoot<M::State>> {
        self.gateway.root()
    }

    pub fn connection(&self) -> Option<&Arc<C>> {
        self.connection.as_ref()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(|c| c.id())
    }

    pub fn is_administrator(&self) -> bool {
        self.administrator
    }

    pub fn is_single_player(&self) -> bool {
        self.single_player
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.identity().cloned(),
            state: self.state,
            phase: self.phase,
            administrator: self.administrator,
            single_player: self.single_player,
            connection: self.connection_id(),
            has_game_root: self.gateway.root().is_some(),
        }
    }

    fn view(&self) -> SessionView<M> {
        SessionView {
            identity: self.identity().cloned(),
            state: self.state,
            phase: self.phase,
            administrator: self.administrator,
            single_player: self.single_player,
            root: self.gateway.root().cloned(),
        }
    }

    // -- Mutators ---------------------------------------------------------

    /// Stages the player identity.
    ///
    /// # Errors
    /// [`SessionError::Precondition`] while logged out.
    pub fn set_identity(&mut self, player: Player) -> Result<(), SessionError> {
        if self.state == ConnectionState::LoggedOut {
            return Err(SessionError::Precondition(
                "identity cannot be set while logged out",
            ));
        }
        tracing::debug!(player_id = %player.id, "identity set");
        self.identity = Some(player);
        Ok(())
    }

    /// Replaces the game-state root. Returns the previous one.
    pub fn set_game_root(&mut self, root: GameRoot<M::State>) -> Option<GameRoot<M::State>> {
        let previous = self.gateway.assign(root);
        tracing::info!(replaced = previous.is_some(), "game state root assigned");
        previous
    }

    pub fn set_administrator(&mut self, administrator: bool) {
        self.administrator = administrator;
    }

    pub fn set_single_player(&mut self, single_player: bool) {
        self.single_player = single_player;
    }

    /// Installs a new connection and returns the one it replaced, which
    /// the caller must close.
    ///
    /// `LoggedOut` and `Disconnected` move to `Connecting`; `Connecting`
    /// and `LoggedIn` keep their state and only swap the transport.
    pub fn set_connection(&mut self, connection: Arc<C>) -> Option<Arc<C>> {
        let conn_id = connection.id();
        let previous = self.connection.replace(connection);
        match self.state {
            ConnectionState::LoggedOut => {
                self.reconnecting = false;
                self.transition(ConnectionState::Connecting);
            }
            ConnectionState::Disconnected => {
                self.reconnecting = true;
                self.transition(ConnectionState::Connecting);
            }
            ConnectionState::Connecting | ConnectionState::LoggedIn => {}
        }
        tracing::info!(
            %conn_id,
            replaced = previous.is_some(),
            state = %self.state,
            "connection set"
        );
        previous
    }

    /// Marks the session logged in or out.
    ///
    /// `true` needs a staged identity and a `Connecting` session (or is a
    /// no-op when already logged in). `false` always succeeds: it clears
    /// the identity and administrator flag, releases the game-state root,
    /// returns to `PreGame`, and hands back the connection for closing.
    ///
    /// # Errors
    /// [`SessionError::Precondition`] for a `true` that is not allowed;
    /// the session is left untouched.
    pub fn set_logged_in(&mut self, logged_in: bool) -> Result<Option<Arc<C>>, SessionError> {
        if !logged_in {
            return Ok(self.log_out());
        }
        match self.state {
            ConnectionState::LoggedIn => return Ok(None),
            ConnectionState::Connecting => {}
            ConnectionState::LoggedOut | ConnectionState::Disconnected => {
                return Err(SessionError::Precondition(
                    "login requires a connection in the connecting state",
                ));
            }
        }
        let Some(player) = self.identity.clone() else {
            return Err(SessionError::Precondition("login requires an identity"));
        };

        let reconnected = self.reconnecting;
        self.reconnecting = false;
        self.transition(ConnectionState::LoggedIn);
        tracing::info!(player_id = %player.id, name = %player.name, reconnected, "logged in");
        self.emit(SessionEvent::LoggedIn {
            player,
            reconnected,
        });
        Ok(None)
    }

    fn log_out(&mut self) -> Option<Arc<C>> {
        let was = self.state;
        self.switch_phase(Phase::PreGame);
        self.identity = None;
        self.administrator = false;
        self.reconnecting = false;
        self.pending.clear();
        self.gateway.release();
        let connection = self.connection.take();
        self.transition(ConnectionState::LoggedOut);
        if was != ConnectionState::LoggedOut {
            tracing::info!(from = %was, "logged out");
            self.emit(SessionEvent::LoggedOut);
        }
        connection
    }

    /// Finishes a login handshake on `conn_id`.
    ///
    /// # Errors
    /// [`SessionError::StaleConnection`] when `conn_id` is no longer the
    /// current connection or the session left `Connecting` meanwhile.
    pub fn complete_login(
        &mut self,
        conn_id: ConnectionId,
        player: Player,
        administrator: bool,
    ) -> Result<(), SessionError> {
        if self.connection_id() != Some(conn_id) || self.state != ConnectionState::Connecting {
            tracing::debug!(%conn_id, "discarding late login acknowledgement");
            return Err(SessionError::StaleConnection(conn_id));
        }
        self.set_identity(player)?;
        self.set_logged_in(true)?;
        self.administrator = administrator;
        Ok(())
    }

    /// Handles transport failure on `conn_id` and returns the dead
    /// connection. Stale ids are ignored.
    pub fn connection_lost(&mut self, conn_id: ConnectionId) -> Option<Arc<C>> {
        if self.connection_id() != Some(conn_id) {
            tracing::debug!(%conn_id, "ignoring loss of a replaced connection");
            return None;
        }
        let connection = self.connection.take();
        self.pending.clear();

        let can_reconnect = match self.state {
            ConnectionState::LoggedIn => true,
            ConnectionState::Connecting => self.reconnecting,
            ConnectionState::LoggedOut | ConnectionState::Disconnected => false,
        };
        if can_reconnect {
            self.reconnecting = false;
            self.transition(ConnectionState::Disconnected);
        } else if self.state == ConnectionState::Connecting {
            self.identity = None;
            self.transition(ConnectionState::LoggedOut);
        }
        tracing::warn!(%conn_id, state = %self.state, can_reconnect, "connection lost");
        self.emit(SessionEvent::ConnectionLost {
            connection: conn_id,
            can_reconnect,
        });
        connection
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state != to {
            tracing::debug!(from = %self.state, %to, "connection state changed");
            self.state = to;
        }
    }

    // -- Routing ----------------------------------------------------------

    /// Deactivates the active pair and activates the one for `target`.
    pub fn switch_phase(&mut self, target: Phase) {
        let from = self.phase;
        if from == target {
            return;
        }
        let view = self.view();
        self.handlers.pair_mut(from).controller.on_deactivate(&view);
        self.phase = target;
        let view = self.view();
        self.handlers.pair_mut(target).controller.on_activate(&view);
        tracing::info!(%from, to = %target, "phase switched");
        self.emit(SessionEvent::PhaseChanged { from, to: target });
    }

    /// Queues a game payload received on `conn_id`, stamped with the
    /// current phase. Returns `false` when it was dropped (stale
    /// connection, or not logged in).
    pub fn accept_inbound(&mut self, conn_id: ConnectionId, data: Vec<u8>) -> bool {
        if self.connection_id() != Some(conn_id) {
            tracing::debug!(%conn_id, "dropping message from a replaced connection");
            return false;
        }
        if self.state != ConnectionState::LoggedIn {
            tracing::debug!(state = %self.state, "dropping message received while not logged in");
            return false;
        }
        self.pending.push_back((self.phase, data));
        true
    }

    /// Delivers queued payloads, each to the input handler of the phase it
    /// was accepted under, and returns the effects they produced.
    pub fn dispatch_pending(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        while let Some((phase, data)) = self.pending.pop_front() {
            tracing::debug!(%phase, len = data.len(), "routing inbound message");
            let view = self.view();
            let actions = self.handlers.pair_mut(phase).input.handle_message(&view, &data);
            effects.extend(self.run_actions(actions));
        }
        effects
    }

    /// Hands a user intent to the active controller.
    pub fn submit_intent(&mut self, intent: M::Intent) -> Vec<Effect> {
        let view = self.view();
        let actions = self
            .handlers
            .pair_mut(self.phase)
            .controller
            .handle_intent(&view, intent);
        self.run_actions(actions)
    }

    fn run_actions(&mut self, actions: Vec<Action<M>>) -> Vec<Effect> {
        let mut effects = Vec::new();
        for action in actions {
            match action {
                Action::Apply(update) => {
                    if let Err(e) = self.gateway.apply(update) {
                        tracing::warn!(error = %e, "model update dropped");
                    }
                }
                Action::AssignRoot(root) => {
                    self.set_game_root(root);
                }
                Action::SwitchPhase(phase) => self.switch_phase(phase),
                Action::Send(data) => effects.push(Effect::Send(data)),
                Action::PlaySound(sound) => effects.push(Effect::PlaySound(sound)),
                Action::PlayMusic(track) => effects.push(Effect::PlayMusic(track)),
                Action::Logout => effects.push(Effect::Logout),
            }
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use meridian_transport::MemoryConnection;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::{Controller, HandlerPair, InputHandler};

    // -- Helpers ----------------------------------------------------------

    struct Log;

    impl GameModel for Log {
        type State = Vec<String>;
        type Update = String;
        type Intent = String;

        fn apply(state: &mut Vec<String>, update: String) {
            state.push(update);
        }
    }

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Records every call as `"<phase>:<what>"` and turns a few magic
    /// payloads into actions.
    struct Recorder {
        phase: &'static str,
        journal: Journal,
    }

    impl Recorder {
        fn actions(&self, text: &str) -> Vec<Action<Log>> {
            match text {
                "switch-in-game" => vec![Action::SwitchPhase(Phase::InGame)],
                "switch-pre-game" => vec![Action::SwitchPhase(Phase::PreGame)],
                "send" => vec![Action::Send(b"out".to_vec())],
                "beep" => vec![Action::PlaySound(meridian_frontend::SoundId(1))],
                "music" => vec![Action::PlayMusic(meridian_frontend::SoundId(2))],
                "logout" => vec![Action::Logout],
                other => vec![Action::Apply(format!("{}:{other}", self.phase))],
            }
        }
    }

    impl Controller<Log> for Recorder {
        fn handle_intent(&mut self, _view: &SessionView<Log>, intent: String) -> Vec<Action<Log>> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:intent:{intent}", self.phase));
            self.actions(&intent)
        }

        fn on_activate(&mut self, _view: &SessionView<Log>) {
            self.journal.lock().unwrap().push(format!("{}:activate", self.phase));
        }

        fn on_deactivate(&mut self, _view: &SessionView<Log>) {
            self.journal.lock().unwrap().push(format!("{}:deactivate", self.phase));
        }
    }

    impl InputHandler<Log> for Recorder {
        fn handle_message(&mut self, _view: &SessionView<Log>, data: &[u8]) -> Vec<Action<Log>> {
            let text = String::from_utf8_lossy(data).into_owned();
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:message:{text}", self.phase));
            self.actions(&text)
        }
    }

    fn pair(phase: &'static str, journal: &Journal) -> HandlerPair<Log> {
        HandlerPair::new(
            Recorder {
                phase,
                journal: Arc::clone(journal),
            },
            Recorder {
                phase,
                journal: Arc::clone(journal),
            },
        )
    }

    fn session() -> (Session<Log, MemoryConnection>, Journal) {
        let journal: Journal = Arc::default();
        let handlers = PhaseHandlers::new(pair("pre", &journal), pair("in", &journal));
        (Session::new(&SessionConfig::default(), handlers), journal)
    }

    fn conn() -> Arc<MemoryConnection> {
        Arc::new(MemoryConnection::pair().0)
    }

    fn player(id: u64) -> Player {
        Player {
            id: PlayerId(id),
            name: format!("player-{id}"),
        }
    }

    /// A session logged in as player 1 on a fresh connection.
    fn logged_in() -> (Session<Log, MemoryConnection>, Journal, ConnectionId) {
        let (mut s, journal) = session();
        let c = conn();
        let id = c.id();
        s.set_connection(c);
        s.complete_login(id, player(1), false).unwrap();
        (s, journal, id)
    }

    fn journal_entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    // =====================================================================
    // new()
    // =====================================================================

    #[test]
    fn test_new_starts_logged_out_with_pre_game_active() {
        let (s, journal) = session();

        assert_eq!(s.state(), ConnectionState::LoggedOut);
        assert_eq!(s.phase(), Phase::PreGame);
        assert!(s.identity().is_none());
        assert_eq!(journal_entries(&journal), vec!["pre:activate"]);
    }

    #[test]
    fn test_new_administrator_flag_is_cleared() {
        let journal: Journal = Arc::default();
        let config = SessionConfig {
            administrator: true,
            single_player: true,
            ..SessionConfig::default()
        };
        let s: Session<Log, MemoryConnection> = Session::new(
            &config,
            PhaseHandlers::new(pair("pre", &journal), pair("in", &journal)),
        );

        assert!(!s.is_administrator());
        assert!(s.is_single_player());
    }

    // =====================================================================
    // set_identity() / set_logged_in()
    // =====================================================================

    #[test]
    fn test_set_identity_while_logged_out_rejected() {
        let (mut s, _) = session();

        let result = s.set_identity(player(1));

        assert!(matches!(result, Err(SessionError::Precondition(_))));
        assert_eq!(s.state(), ConnectionState::LoggedOut);
    }

    #[test]
    fn test_set_logged_in_without_identity_rejected() {
        let (mut s, _) = session();
        s.set_connection(conn());

        let result = s.set_logged_in(true);

        assert!(matches!(result, Err(SessionError::Precondition(_))));
        assert_eq!(s.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_identity_hidden_until_logged_in() {
        let (mut s, _) = session();
        s.set_connection(conn());
        s.set_identity(player(1)).unwrap();

        assert!(s.identity().is_none(), "staged identity is not observable");

        s.set_logged_in(true).unwrap();
        assert_eq!(s.identity(), Some(&player(1)));
    }

    #[test]
    fn test_set_logged_in_false_clears_identity_root_and_connection() {
        let (mut s, _, id) = logged_in();
        s.set_game_root(GameRoot::new(Vec::new()));
        s.set_administrator(true);

        let released = s.set_logged_in(false).unwrap();

        assert_eq!(released.map(|c| c.id()), Some(id));
        assert_eq!(s.state(), ConnectionState::LoggedOut);
        assert!(s.identity().is_none());
        assert!(s.game_root().is_none());
        assert!(!s.is_administrator());
    }

    #[test]
    fn test_set_logged_in_false_returns_to_pre_game() {
        let (mut s, journal, _) = logged_in();
        s.switch_phase(Phase::InGame);

        s.set_logged_in(false).unwrap();

        assert_eq!(s.phase(), Phase::PreGame);
        let entries = journal_entries(&journal);
        assert_eq!(&entries[entries.len() - 2..], ["in:deactivate", "pre:activate"]);
    }

    #[test]
    fn test_identity_tracks_most_recent_set_logged_in() {
        // Random sequences of login-related calls; identity must be present
        // exactly when the last set_logged_in call was a successful `true`.
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let (mut s, _) = session();
            let mut expect_identity = false;

            for _ in 0..30 {
                match rng.random_range(0..4) {
                    0 => {
                        s.set_connection(conn());
                    }
                    1 => {
                        let _ = s.set_identity(player(rng.random_range(1..4)));
                    }
                    2 => {
                        let ok = s.set_logged_in(true).is_ok();
                        expect_identity = ok;
                    }
                    _ => {
                        s.set_logged_in(false).unwrap();
                        expect_identity = false;
                    }
                }
                assert_eq!(
                    s.identity().is_some(),
                    expect_identity,
                    "state {} phase {}",
                    s.state(),
                    s.phase()
                );
            }
        }
    }

    // =====================================================================
    // set_connection()
    // =====================================================================

    #[test]
    fn test_set_connection_from_logged_out_enters_connecting() {
        let (mut s, _) = session();

        let previous = s.set_connection(conn());

        assert!(previous.is_none());
        assert_eq!(s.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_set_connection_while_logged_in_swaps_and_returns_old() {
        let (mut s, _, old_id) = logged_in();
        let fresh = conn();
        let fresh_id = fresh.id();

        let previous = s.set_connection(fresh);

        assert_eq!(previous.map(|c| c.id()), Some(old_id));
        assert_eq!(s.connection_id(), Some(fresh_id));
        assert_eq!(s.state(), ConnectionState::LoggedIn);
    }

    // =====================================================================
    // complete_login()
    // =====================================================================

    #[test]
    fn test_complete_login_sets_admin_and_emits_event() {
        let (mut s, _) = session();
        let mut events = s.subscribe();
        let c = conn();
        let id = c.id();
        s.set_connection(c);

        s.complete_login(id, player(7), true).unwrap();

        assert!(s.is_logged_in());
        assert!(s.is_administrator());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedIn {
                player: player(7),
                reconnected: false
            }
        );
    }

    #[test]
    fn test_complete_login_for_replaced_connection_discarded() {
        let (mut s, _) = session();
        let first = conn();
        let first_id = first.id();
        s.set_connection(first);
        s.set_connection(conn());

        let result = s.complete_login(first_id, player(1), false);

        assert!(matches!(result, Err(SessionError::StaleConnection(id)) if id == first_id));
        assert_eq!(s.state(), ConnectionState::Connecting);
    }

    // =====================================================================
    // connection_lost()
    // =====================================================================

    #[test]
    fn test_connection_lost_while_logged_in_keeps_identity_and_root() {
        let (mut s, _, id) = logged_in();
        let root = GameRoot::new(vec!["turn-1".to_string()]);
        s.set_game_root(root.clone());

        let dead = s.connection_lost(id);

        assert!(dead.is_some());
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert_eq!(s.identity(), Some(&player(1)));
        assert_eq!(s.game_root(), Some(&root));
        assert!(s.connection().is_none());
    }

    #[test]
    fn test_connection_lost_while_connecting_returns_to_logged_out() {
        let (mut s, _) = session();
        let c = conn();
        let id = c.id();
        s.set_connection(c);
        s.set_identity(player(1)).unwrap();

        s.connection_lost(id);

        assert_eq!(s.state(), ConnectionState::LoggedOut);
        assert!(s.set_logged_in(true).is_err());
    }

    #[test]
    fn test_connection_lost_for_stale_id_ignored() {
        let (mut s, _, _) = logged_in();

        let dead = s.connection_lost(ConnectionId::new(u64::MAX));

        assert!(dead.is_none());
        assert_eq!(s.state(), ConnectionState::LoggedIn);
    }

    #[test]
    fn test_reconnect_restores_logged_in_with_same_identity() {
        let (mut s, _, id) = logged_in();
        let root = GameRoot::new(Vec::new());
        s.set_game_root(root.clone());
        s.connection_lost(id);
        let mut events = s.subscribe();

        let fresh = conn();
        let fresh_id = fresh.id();
        s.set_connection(fresh);
        assert_eq!(s.state(), ConnectionState::Connecting);
        s.complete_login(fresh_id, player(1), false).unwrap();

        assert_eq!(s.state(), ConnectionState::LoggedIn);
        assert_eq!(s.game_root(), Some(&root));
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedIn {
                player: player(1),
                reconnected: true
            }
        );
    }

    #[test]
    fn test_failed_reconnect_returns_to_disconnected() {
        let (mut s, _, id) = logged_in();
        s.connection_lost(id);
        let fresh = conn();
        let fresh_id = fresh.id();
        s.set_connection(fresh);

        s.connection_lost(fresh_id);

        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert_eq!(s.identity(), Some(&player(1)));
    }

    // =====================================================================
    // game root
    // =====================================================================

    #[test]
    fn test_set_game_root_round_trips_by_identity() {
        let (mut s, _, _) = logged_in();
        let root = GameRoot::new(Vec::new());

        s.set_game_root(root.clone());

        assert_eq!(s.game_root(), Some(&root));
    }

    // =====================================================================
    // Routing
    // =====================================================================

    #[test]
    fn test_message_accepted_before_switch_goes_to_accepting_phase() {
        let (mut s, journal, id) = logged_in();

        assert!(s.accept_inbound(id, b"hello".to_vec()));
        s.switch_phase(Phase::InGame);
        s.dispatch_pending();

        let entries = journal_entries(&journal);
        assert!(entries.contains(&"pre:message:hello".to_string()));
        assert!(!entries.iter().any(|e| e.starts_with("in:message")));
    }

    #[test]
    fn test_switch_requested_by_handler_does_not_reroute_queued_messages() {
        let (mut s, journal, id) = logged_in();

        s.accept_inbound(id, b"switch-in-game".to_vec());
        s.accept_inbound(id, b"second".to_vec());
        s.dispatch_pending();
        s.accept_inbound(id, b"third".to_vec());
        s.dispatch_pending();

        let messages: Vec<_> = journal_entries(&journal)
            .into_iter()
            .filter(|e| e.contains(":message:"))
            .collect();
        assert_eq!(
            messages,
            vec!["pre:message:switch-in-game", "pre:message:second", "in:message:third"]
        );
        assert_eq!(s.phase(), Phase::InGame);
    }

    #[test]
    fn test_accept_inbound_from_stale_connection_dropped() {
        let (mut s, journal, _) = logged_in();

        assert!(!s.accept_inbound(ConnectionId::new(u64::MAX), b"x".to_vec()));
        s.dispatch_pending();

        assert!(!journal_entries(&journal).iter().any(|e| e.contains(":message:")));
    }

    #[test]
    fn test_switch_phase_deactivates_then_activates_and_emits() {
        let (mut s, journal) = session();
        let mut events = s.subscribe();

        s.switch_phase(Phase::InGame);
        s.switch_phase(Phase::InGame);

        assert_eq!(
            journal_entries(&journal),
            vec!["pre:activate", "pre:deactivate", "in:activate"]
        );
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::PhaseChanged {
                from: Phase::PreGame,
                to: Phase::InGame
            }
        );
        assert!(events.try_recv().is_err(), "switching to the same phase is silent");
    }

    #[test]
    fn test_submit_intent_goes_to_active_controller() {
        let (mut s, journal, _) = logged_in();
        s.switch_phase(Phase::InGame);

        s.submit_intent("move".into());

        assert!(journal_entries(&journal).contains(&"in:intent:move".to_string()));
    }

    #[test]
    fn test_apply_action_updates_root_through_gateway() {
        let (mut s, _, id) = logged_in();
        let root = GameRoot::new(Vec::new());
        s.set_game_root(root.clone());

        s.accept_inbound(id, b"unit-moved".to_vec());
        s.dispatch_pending();

        assert_eq!(root.read(|log| log.clone()), vec!["pre:unit-moved".to_string()]);
    }

    #[test]
    fn test_io_actions_become_effects_in_order() {
        let (mut s, _, _) = logged_in();

        let mut effects = s.submit_intent("send".into());
        effects.extend(s.submit_intent("beep".into()));
        effects.extend(s.submit_intent("music".into()));
        effects.extend(s.submit_intent("logout".into()));

        assert_eq!(
            effects,
            vec![
                Effect::Send(b"out".to_vec()),
                Effect::PlaySound(meridian_frontend::SoundId(1)),
                Effect::PlayMusic(meridian_frontend::SoundId(2)),
                Effect::Logout,
            ]
        );
    }

    #[test]
    fn test_snapshot_reflects_current_fields() {
        let (mut s, _, id) = logged_in();
        s.set_single_player(true);

        let snap = s.snapshot();

        assert_eq!(snap.identity, Some(player(1)));
        assert_eq!(snap.state, ConnectionState::LoggedIn);
        assert_eq!(snap.connection, Some(id));
        assert!(snap.single_player);
        assert!(!snap.has_game_root);
    }
}
