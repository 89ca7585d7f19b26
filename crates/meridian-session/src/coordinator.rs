//! The session coordinator: an actor task that owns the [`Session`].
//!
//! Everything that changes session state arrives on one of two queues:
//!
//! ```text
//!  SessionHandle ──commands──┐
//!                            ├──→ actor task ──→ Session (sync core)
//!  pump task(s) ──inbound────┘        │
//!                                     ├──→ connection.send (bounded)
//!                                     ├──→ Audio
//!                                     └──→ DisplayAdapter
//! ```
//!
//! The actor handles one item at a time, so no reader ever sees a mix of
//! old and new connection, identity, phase, or root. Each connection gets
//! a pump task that forwards received frames tagged with the connection
//! id; frames from a connection that has since been replaced are dropped
//! by the session.

use std::ops::ControlFlow;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use meridian_frontend::{
    Audio, Bounds, DisplayAdapter, DisplayError, DisplayPreferences, DisplayResources,
    ModeSelection, SoundId,
};
use meridian_protocol::{Codec, Envelope, JsonCodec, Payload, SystemMessage};
use meridian_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, timeout};

use crate::{
    ConnectionState, Effect, GameModel, GameRoot, Phase, PhaseHandlers, Player, Session,
    SessionConfig, SessionError, SessionEvent, SessionSnapshot,
};

const COMMAND_CAPACITY: usize = 64;
const INBOUND_CAPACITY: usize = 256;

/// Extra time the handle grants the actor on top of the quit timeout
/// before aborting it.
const QUIT_MARGIN: Duration = Duration::from_millis(250);

// ===========================================================================
// Public types
// ===========================================================================

/// Result of [`SessionHandle::quit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuitOutcome {
    /// `true` when the logout notice and close completed in time.
    pub graceful: bool,
}

impl QuitOutcome {
    /// The status the process should exit with. Quitting always succeeds.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::SUCCESS
    }
}

/// Display state as the coordinator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayStatus {
    pub preferences: DisplayPreferences,
    /// Whether the most recent mode selection fell back to windowed.
    pub fallback_applied: bool,
    pub bounds: Option<Bounds>,
}

// ===========================================================================
// Commands
// ===========================================================================

pub(crate) enum Command<M: GameModel, C> {
    SetConnection {
        connection: Arc<C>,
        reply: oneshot::Sender<ConnectionId>,
    },
    BeginLogin {
        connection: Arc<C>,
        reply: oneshot::Sender<Result<ConnectionId, SessionError>>,
    },
    CompleteLogin {
        conn_id: ConnectionId,
        player: Player,
        administrator: bool,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    AbandonLogin {
        conn_id: ConnectionId,
    },
    SetIdentity {
        player: Player,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    SetLoggedIn {
        logged_in: bool,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    SetGameRoot {
        root: GameRoot<M::State>,
        reply: oneshot::Sender<()>,
    },
    GetGameRoot {
        reply: oneshot::Sender<Option<GameRoot<M::State>>>,
    },
    SetAdministrator(bool),
    SetSinglePlayer(bool),
    SwitchPhase {
        phase: Phase,
        reply: oneshot::Sender<()>,
    },
    Intent(M::Intent),
    PlaySound(SoundId),
    PlayMusic(SoundId),
    SelectDisplayMode {
        windowed: bool,
        reply: oneshot::Sender<Result<ModeSelection, DisplayError>>,
    },
    Display {
        reply: oneshot::Sender<DisplayStatus>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Quit {
        reply: oneshot::Sender<QuitOutcome>,
    },
}

enum Inbound {
    Frame { conn_id: ConnectionId, data: Vec<u8> },
    Closed { conn_id: ConnectionId },
}

// ===========================================================================
// SessionHandle
// ===========================================================================

/// Handle to a running coordinator. Cheap to clone.
pub struct SessionHandle<M: GameModel, C> {
    pub(crate) sender: mpsc::Sender<Command<M, C>>,
    events: broadcast::Sender<SessionEvent>,
    task: AbortHandle,
    pub(crate) config: Arc<SessionConfig>,
}

impl<M: GameModel, C> Clone for SessionHandle<M, C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            events: self.events.clone(),
            task: self.task.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<M: GameModel, C: Connection<Error = TransportError>> SessionHandle<M, C> {
    /// Starts a session: negotiates the display, wires both handler pairs
    /// with `PreGame` active, and spawns the coordinator task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`SessionError::Display`] if no presentation surface could be
    /// created at all.
    pub fn start(
        config: SessionConfig,
        preferences: DisplayPreferences,
        resources: DisplayResources,
        handlers: PhaseHandlers<M>,
    ) -> Result<Self, SessionError> {
        let config = config.validated();
        let display = DisplayAdapter::start(resources.presenter, preferences).map_err(|e| {
            tracing::error!(error = %e, "session start failed: no presentation surface");
            e
        })?;
        if display.fallback_applied() {
            tracing::info!("display preference downgraded to windowed for this and later runs");
        }

        let session = Session::new(&config, handlers);
        let events = session.event_sender();
        let (sender, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        let actor = Actor {
            session,
            config: config.clone(),
            display,
            audio: Audio::new(resources.music, resources.sfx),
            commands,
            inbound_tx,
            inbound_rx,
            pump: None,
            codec: JsonCodec,
            seq: 0,
            started: Instant::now(),
        };
        let task = tokio::spawn(actor.run()).abort_handle();

        Ok(Self {
            sender,
            events,
            task,
            config: Arc::new(config),
        })
    }
}

impl<M: GameModel, C: Connection> SessionHandle<M, C> {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command<M, C>,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::Unavailable)?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)
    }

    async fn tell(&self, command: Command<M, C>) -> Result<(), SessionError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| SessionError::Unavailable)
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The configuration the session was started with (after validation).
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns `true` while the coordinator task is running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    // -- Connection -------------------------------------------------------

    /// Installs a connection. The replaced one, if any, is closed.
    pub async fn set_connection(&self, connection: C) -> Result<ConnectionId, SessionError> {
        let connection = Arc::new(connection);
        self.request(|reply| Command::SetConnection { connection, reply })
            .await
    }

    pub(crate) async fn begin_login(
        &self,
        connection: Arc<C>,
    ) -> Result<ConnectionId, SessionError> {
        self.request(|reply| Command::BeginLogin { connection, reply })
            .await?
    }

    pub(crate) async fn complete_login(
        &self,
        conn_id: ConnectionId,
        player: Player,
        administrator: bool,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::CompleteLogin {
            conn_id,
            player,
            administrator,
            reply,
        })
        .await?
    }

    pub(crate) async fn abandon_login(&self, conn_id: ConnectionId) {
        let _ = self.tell(Command::AbandonLogin { conn_id }).await;
    }

    /// The id of the current connection.
    pub async fn connection_id(&self) -> Result<Option<ConnectionId>, SessionError> {
        Ok(self.snapshot().await?.connection)
    }

    // -- Identity and login -----------------------------------------------

    pub async fn set_identity(&self, player: Player) -> Result<(), SessionError> {
        self.request(|reply| Command::SetIdentity { player, reply })
            .await?
    }

    pub async fn identity(&self) -> Result<Option<Player>, SessionError> {
        Ok(self.snapshot().await?.identity)
    }

    /// See [`Session::set_logged_in`]. Logging out also closes the
    /// connection.
    pub async fn set_logged_in(&self, logged_in: bool) -> Result<(), SessionError> {
        self.request(|reply| Command::SetLoggedIn { logged_in, reply })
            .await?
    }

    pub async fn is_logged_in(&self) -> Result<bool, SessionError> {
        Ok(self.snapshot().await?.state == ConnectionState::LoggedIn)
    }

    pub async fn connection_state(&self) -> Result<ConnectionState, SessionError> {
        Ok(self.snapshot().await?.state)
    }

    // -- Flags ------------------------------------------------------------

    pub async fn set_administrator(&self, administrator: bool) -> Result<(), SessionError> {
        self.tell(Command::SetAdministrator(administrator)).await
    }

    pub async fn is_administrator(&self) -> Result<bool, SessionError> {
        Ok(self.snapshot().await?.administrator)
    }

    pub async fn set_single_player(&self, single_player: bool) -> Result<(), SessionError> {
        self.tell(Command::SetSinglePlayer(single_player)).await
    }

    pub async fn is_single_player(&self) -> Result<bool, SessionError> {
        Ok(self.snapshot().await?.single_player)
    }

    // -- Game state -------------------------------------------------------

    /// Replaces the game-state root.
    pub async fn set_game_root(&self, root: GameRoot<M::State>) -> Result<(), SessionError> {
        self.request(|reply| Command::SetGameRoot { root, reply })
            .await
    }

    pub async fn game_root(&self) -> Result<Option<GameRoot<M::State>>, SessionError> {
        self.request(|reply| Command::GetGameRoot { reply }).await
    }

    // -- Phases and input -------------------------------------------------

    pub async fn switch_phase(&self, phase: Phase) -> Result<(), SessionError> {
        self.request(|reply| Command::SwitchPhase { phase, reply })
            .await
    }

    pub async fn phase(&self) -> Result<Phase, SessionError> {
        Ok(self.snapshot().await?.phase)
    }

    /// Queues a user intent for the active controller.
    pub async fn submit_intent(&self, intent: M::Intent) -> Result<(), SessionError> {
        self.tell(Command::Intent(intent)).await
    }

    pub async fn play_sound(&self, sound: SoundId) -> Result<(), SessionError> {
        self.tell(Command::PlaySound(sound)).await
    }

    /// Starts a music track. Silently ignored without a music player.
    pub async fn play_music(&self, track: SoundId) -> Result<(), SessionError> {
        self.tell(Command::PlayMusic(track)).await
    }

    // -- Display ----------------------------------------------------------

    /// Re-runs display-mode selection. Every downgrade is announced with
    /// [`SessionEvent::DisplayFallback`].
    pub async fn select_display_mode(
        &self,
        windowed: bool,
    ) -> Result<ModeSelection, SessionError> {
        Ok(self
            .request(|reply| Command::SelectDisplayMode { windowed, reply })
            .await??)
    }

    pub async fn display(&self) -> Result<DisplayStatus, SessionError> {
        self.request(|reply| Command::Display { reply }).await
    }

    // -- Snapshot and quit ------------------------------------------------

    /// Reads identity, state, phase, and flags in one step.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Logs out, closes the connection, and stops the coordinator.
    ///
    /// Never fails and never waits longer than the quit timeout plus a
    /// small margin: if the coordinator does not answer in time it is
    /// aborted, which drops everything it owned.
    pub async fn quit(&self) -> QuitOutcome {
        let limit = self.config.quit_timeout() + QUIT_MARGIN;
        let answer = timeout(limit, self.request(|reply| Command::Quit { reply })).await;
        match answer {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => QuitOutcome { graceful: false },
            Err(_) => {
                tracing::warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "coordinator did not finish quitting in time; aborting it"
                );
                self.task.abort();
                QuitOutcome { graceful: false }
            }
        }
    }
}

// ===========================================================================
// Actor
// ===========================================================================

struct Actor<M: GameModel, C: Connection> {
    session: Session<M, C>,
    config: SessionConfig,
    display: DisplayAdapter,
    audio: Audio,
    commands: mpsc::Receiver<Command<M, C>>,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,
    pump: Option<JoinHandle<()>>,
    codec: JsonCodec,
    seq: u64,
    started: Instant,
}

impl<M: GameModel, C: Connection<Error = TransportError>> Actor<M, C> {
    async fn run(mut self) {
        tracing::info!("session coordinator started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("all session handles dropped");
                        self.release_connection();
                        break;
                    };
                    if self.handle_command(command).await.is_break() {
                        break;
                    }
                }
                Some(inbound) = self.inbound_rx.recv() => {
                    self.handle_inbound(inbound).await;
                }
            }
        }

        tracing::info!("session coordinator stopped");
    }

    async fn handle_command(&mut self, command: Command<M, C>) -> ControlFlow<()> {
        match command {
            Command::SetConnection { connection, reply } => {
                let conn_id = connection.id();
                if let Some(old) = self.session.set_connection(connection) {
                    self.stop_pump();
                    self.close_in_background(old);
                }
                if self.session.is_logged_in() {
                    self.start_pump();
                }
                let _ = reply.send(conn_id);
            }
            Command::BeginLogin { connection, reply } => {
                if self.session.is_logged_in() {
                    tracing::warn!(
                        conn_id = %connection.id(),
                        "login refused: session is already logged in"
                    );
                    let _ = reply.send(Err(SessionError::Precondition("already logged in")));
                } else {
                    let conn_id = connection.id();
                    if let Some(old) = self.session.set_connection(connection) {
                        self.stop_pump();
                        self.close_in_background(old);
                    }
                    let _ = reply.send(Ok(conn_id));
                }
            }
            Command::CompleteLogin {
                conn_id,
                player,
                administrator,
                reply,
            } => {
                let result = self.session.complete_login(conn_id, player, administrator);
                if result.is_ok() {
                    self.start_pump();
                }
                let _ = reply.send(result);
            }
            Command::AbandonLogin { conn_id } => self.lose_connection(conn_id),
            Command::SetIdentity { player, reply } => {
                let _ = reply.send(self.session.set_identity(player));
            }
            Command::SetLoggedIn { logged_in, reply } => {
                let result = self.session.set_logged_in(logged_in).map(|released| {
                    if let Some(old) = released {
                        self.stop_pump();
                        self.close_in_background(old);
                    }
                });
                if logged_in && result.is_ok() && self.pump.is_none() {
                    self.start_pump();
                }
                let _ = reply.send(result);
            }
            Command::SetGameRoot { root, reply } => {
                self.session.set_game_root(root);
                let _ = reply.send(());
            }
            Command::GetGameRoot { reply } => {
                let _ = reply.send(self.session.game_root().cloned());
            }
            Command::SetAdministrator(administrator) => {
                self.session.set_administrator(administrator);
            }
            Command::SetSinglePlayer(single_player) => {
                self.session.set_single_player(single_player);
            }
            Command::SwitchPhase { phase, reply } => {
                self.session.switch_phase(phase);
                let _ = reply.send(());
            }
            Command::Intent(intent) => {
                let effects = self.session.submit_intent(intent);
                self.run_effects(effects).await;
            }
            Command::PlaySound(sound) => self.audio.play_sound(sound),
            Command::PlayMusic(track) => self.audio.play_music(track),
            Command::SelectDisplayMode { windowed, reply } => {
                let result = self.display.select_mode(windowed);
                if matches!(result, Ok(ModeSelection { downgraded: true, .. })) {
                    let _ = self.session.event_sender().send(SessionEvent::DisplayFallback {
                        preferences: self.display.preferences(),
                    });
                }
                let _ = reply.send(result);
            }
            Command::Display { reply } => {
                let _ = reply.send(DisplayStatus {
                    preferences: self.display.preferences(),
                    fallback_applied: self.display.fallback_applied(),
                    bounds: self.display.surface_bounds(),
                });
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            Command::Quit { reply } => {
                let outcome = self.quit().await;
                let _ = reply.send(outcome);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Accepts `first` plus everything else already queued, then
    /// dispatches. Messages accepted together keep the phase they were
    /// accepted under even if an earlier one switches phase.
    async fn handle_inbound(&mut self, first: Inbound) {
        let mut next = Some(first);
        while let Some(inbound) = next {
            match inbound {
                Inbound::Frame { conn_id, data } => self.accept_frame(conn_id, &data).await,
                Inbound::Closed { conn_id } => self.lose_connection(conn_id),
            }
            next = self.inbound_rx.try_recv().ok();
        }
        let effects = self.session.dispatch_pending();
        self.run_effects(effects).await;
    }

    async fn accept_frame(&mut self, conn_id: ConnectionId, data: &[u8]) {
        let envelope: Envelope = match self.codec.decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "dropping undecodable frame");
                return;
            }
        };
        match envelope.payload {
            Payload::Game(bytes) => {
                self.session.accept_inbound(conn_id, bytes);
            }
            Payload::System(SystemMessage::Logout { reason }) => {
                if self.session.connection_id() == Some(conn_id) {
                    tracing::info!(%conn_id, %reason, "server ended the session");
                    self.log_out().await;
                }
            }
            Payload::System(SystemMessage::Error { code, message }) => {
                tracing::warn!(%conn_id, code, %message, "server reported an error");
            }
            Payload::System(other) => {
                tracing::debug!(%conn_id, ?other, "ignoring unexpected system message");
            }
        }
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(data) => self.send_game(data).await,
                Effect::PlaySound(sound) => self.audio.play_sound(sound),
                Effect::PlayMusic(track) => self.audio.play_music(track),
                Effect::Logout => self.log_out().await,
            }
        }
    }

    fn next_envelope_header(&mut self) -> (u64, u64) {
        self.seq += 1;
        (self.seq, self.started.elapsed().as_millis() as u64)
    }

    async fn send_game(&mut self, data: Vec<u8>) {
        let Some(connection) = self.session.connection().cloned() else {
            tracing::debug!("no connection; outbound message dropped");
            return;
        };
        let conn_id = connection.id();
        if !connection.is_alive() {
            tracing::warn!(%conn_id, "connection is dead; outbound message dropped");
            self.lose_connection(conn_id);
            return;
        }
        let (seq, ts) = self.next_envelope_header();
        let bytes = match self.codec.encode(&Envelope::game(seq, ts, data)) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "could not encode outbound message");
                return;
            }
        };
        match timeout(self.config.send_timeout(), connection.send(&bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(%conn_id, error = %e, "send failed");
                self.lose_connection(conn_id);
            }
            Err(_) => {
                tracing::warn!(
                    %conn_id,
                    timeout_ms = self.config.send_timeout_ms,
                    "send timed out"
                );
                self.lose_connection(conn_id);
            }
        }
    }

    fn encode_system(&mut self, message: SystemMessage) -> Option<Vec<u8>> {
        let (seq, ts) = self.next_envelope_header();
        self.codec
            .encode(&Envelope::system(seq, ts, message))
            .map_err(|e| tracing::warn!(error = %e, "could not encode system message"))
            .ok()
    }

    /// Sends a logout notice and closes the connection, bounded by the
    /// quit timeout. Returns `true` if both finished in time. A dead
    /// connection gets no notice.
    async fn disconnect_gracefully(&mut self, reason: &str) -> bool {
        let Some(connection) = self.session.connection().cloned() else {
            return true;
        };
        if !connection.is_alive() {
            tracing::debug!(
                conn_id = %connection.id(),
                "connection already dead; skipping logout notice"
            );
            return true;
        }
        let notice = self.encode_system(SystemMessage::Logout {
            reason: reason.to_string(),
        });
        let conn_id = connection.id();
        let limit = self.config.quit_timeout();
        let attempt = timeout(limit, async {
            if let Some(notice) = notice {
                connection.send(&notice).await?;
            }
            connection.close().await
        });
        match attempt.await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(%conn_id, error = %e, "graceful disconnect failed; tearing down");
                false
            }
            Err(_) => {
                tracing::warn!(
                    %conn_id,
                    timeout_ms = limit.as_millis() as u64,
                    "graceful disconnect timed out; forcing teardown"
                );
                false
            }
        }
    }

    async fn log_out(&mut self) {
        self.disconnect_gracefully("logout").await;
        self.stop_pump();
        // set_logged_in(false) cannot fail.
        let _ = self.session.set_logged_in(false);
    }

    async fn quit(&mut self) -> QuitOutcome {
        let graceful = self.disconnect_gracefully("quit").await;
        self.stop_pump();
        let _ = self.session.set_logged_in(false);
        self.display.close();
        tracing::info!(graceful, "session closed");
        QuitOutcome { graceful }
    }

    fn lose_connection(&mut self, conn_id: ConnectionId) {
        if let Some(dead) = self.session.connection_lost(conn_id) {
            self.stop_pump();
            self.close_in_background(dead);
        }
    }

    fn release_connection(&mut self) {
        self.stop_pump();
        if let Ok(Some(connection)) = self.session.set_logged_in(false) {
            self.close_in_background(connection);
        }
    }

    fn close_in_background(&self, connection: Arc<C>) {
        let limit = self.config.quit_timeout();
        tokio::spawn(async move {
            let conn_id = connection.id();
            match timeout(limit, connection.close()).await {
                Ok(Ok(())) => tracing::debug!(%conn_id, "connection closed"),
                Ok(Err(e)) => tracing::debug!(%conn_id, error = %e, "close failed"),
                Err(_) => tracing::debug!(%conn_id, "close timed out"),
            }
        });
    }

    /// Starts forwarding frames from the current connection.
    fn start_pump(&mut self) {
        self.stop_pump();
        let Some(connection) = self.session.connection().cloned() else {
            return;
        };
        let tx = self.inbound_tx.clone();
        let conn_id = connection.id();
        self.pump = Some(tokio::spawn(async move {
            loop {
                match connection.recv().await {
                    Ok(Some(data)) => {
                        if tx.send(Inbound::Frame { conn_id, data }).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(%conn_id, "connection closed by peer");
                        let _ = tx.send(Inbound::Closed { conn_id }).await;
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(%conn_id, error = %e, "receive failed");
                        let _ = tx.send(Inbound::Closed { conn_id }).await;
                        return;
                    }
                }
            }
        }));
    }
}

impl<M: GameModel, C: Connection> Actor<M, C> {
    fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl<M: GameModel, C: Connection> Drop for Actor<M, C> {
    fn drop(&mut self) {
        self.stop_pump();
    }
}
