//! Phase handler pairs.
//!
//! Each phase of play has one *controller* (turns user intents into
//! outbound messages and model changes) and one *input handler* (does the
//! same for server messages). Both pairs are built once, handed to the
//! session at start, and kept for its whole life; switching phase only
//! moves which pair is active.
//!
//! Handlers never touch the connection or the game state directly. They
//! read a [`SessionView`] and return [`Action`]s, which the session
//! carries out in order.

use meridian_frontend::SoundId;

use crate::{ConnectionState, GameModel, GameRoot, Phase, Player};

/// Something a handler asks the session to do.
pub enum Action<M: GameModel> {
    /// Send game bytes to the server.
    Send(Vec<u8>),
    /// Apply an update to the game state through the model gateway.
    Apply(M::Update),
    /// Replace the game-state root (joining or hosting a game).
    AssignRoot(GameRoot<M::State>),
    /// Switch the active phase.
    SwitchPhase(Phase),
    /// Play a sound effect.
    PlaySound(SoundId),
    /// Start a music track.
    PlayMusic(SoundId),
    /// Log out and close the connection.
    Logout,
}

/// Read-only view of the session handed to handlers.
pub struct SessionView<M: GameModel> {
    pub(crate) identity: Option<Player>,
    pub(crate) state: ConnectionState,
    pub(crate) phase: Phase,
    pub(crate) administrator: bool,
    pub(crate) single_player: bool,
    pub(crate) root: Option<GameRoot<M::State>>,
}

impl<M: GameModel> SessionView<M> {
    pub fn identity(&self) -> Option<&Player> {
        self.identity.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_administrator(&self) -> bool {
        self.administrator
    }

    pub fn is_single_player(&self) -> bool {
        self.single_player
    }

    pub fn game_root(&self) -> Option<&GameRoot<M::State>> {
        self.root.as_ref()
    }
}

/// Handles user intents for one phase.
pub trait Controller<M: GameModel>: Send + 'static {
    fn handle_intent(&mut self, view: &SessionView<M>, intent: M::Intent) -> Vec<Action<M>>;

    /// Called when this controller's phase becomes active.
    fn on_activate(&mut self, _view: &SessionView<M>) {}

    /// Called when this controller's phase stops being active.
    fn on_deactivate(&mut self, _view: &SessionView<M>) {}
}

/// Handles routed server messages for one phase.
///
/// `data` is the game payload exactly as the server sent it.
pub trait InputHandler<M: GameModel>: Send + 'static {
    fn handle_message(&mut self, view: &SessionView<M>, data: &[u8]) -> Vec<Action<M>>;
}

/// A controller and input handler that serve the same phase.
pub struct HandlerPair<M: GameModel> {
    pub(crate) controller: Box<dyn Controller<M>>,
    pub(crate) input: Box<dyn InputHandler<M>>,
}

impl<M: GameModel> HandlerPair<M> {
    pub fn new(controller: impl Controller<M>, input: impl InputHandler<M>) -> Self {
        Self {
            controller: Box::new(controller),
            input: Box::new(input),
        }
    }
}

/// The fixed phase → pair mapping.
pub struct PhaseHandlers<M: GameModel> {
    pre_game: HandlerPair<M>,
    in_game: HandlerPair<M>,
}

impl<M: GameModel> PhaseHandlers<M> {
    pub fn new(pre_game: HandlerPair<M>, in_game: HandlerPair<M>) -> Self {
        Self { pre_game, in_game }
    }

    pub(crate) fn pair_mut(&mut self, phase: Phase) -> &mut HandlerPair<M> {
        match phase {
            Phase::PreGame => &mut self.pre_game,
            Phase::InGame => &mut self.in_game,
        }
    }
}
