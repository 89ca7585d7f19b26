//! Headless console client.
//!
//! Loads `meridian.json` (or the path given as the first argument), logs
//! in to the configured server, prints session events, and quits on
//! Ctrl-C.

use std::process::ExitCode;

use meridian::prelude::*;
use serde::{Deserialize, Serialize};

// ===========================================================================
// Game types
// ===========================================================================

#[derive(Debug, Default)]
struct Board {
    turn: u32,
    log: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum ServerMsg {
    GameStarted { players: Vec<String> },
    Turn { number: u32, summary: String },
    GameOver,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum ClientMsg {
    Ready,
    EndTurn { turn: u32 },
}

enum BoardUpdate {
    Turn { number: u32, summary: String },
}

struct TurnGame;

impl GameModel for TurnGame {
    type State = Board;
    type Update = BoardUpdate;
    type Intent = ClientMsg;

    fn apply(state: &mut Board, update: BoardUpdate) {
        match update {
            BoardUpdate::Turn { number, summary } => {
                state.turn = number;
                state.log.push(summary);
            }
        }
    }
}

const TURN_SOUND: SoundId = SoundId(1);

// ===========================================================================
// Handlers
// ===========================================================================

/// Sends whatever the user asks for, as JSON.
struct Outbox;

impl Controller<TurnGame> for Outbox {
    fn handle_intent(
        &mut self,
        _view: &SessionView<TurnGame>,
        intent: ClientMsg,
    ) -> Vec<Action<TurnGame>> {
        match serde_json::to_vec(&intent) {
            Ok(bytes) => vec![Action::Send(bytes)],
            Err(e) => {
                tracing::warn!(error = %e, "could not encode intent");
                Vec::new()
            }
        }
    }
}

fn decode(data: &[u8]) -> Option<ServerMsg> {
    serde_json::from_slice(data)
        .map_err(|e| tracing::warn!(error = %e, "unrecognised server message"))
        .ok()
}

struct Lobby;

impl InputHandler<TurnGame> for Lobby {
    fn handle_message(
        &mut self,
        _view: &SessionView<TurnGame>,
        data: &[u8],
    ) -> Vec<Action<TurnGame>> {
        match decode(data) {
            Some(ServerMsg::GameStarted { players }) => {
                println!("game started with {}", players.join(", "));
                vec![
                    Action::AssignRoot(GameRoot::new(Board::default())),
                    Action::SwitchPhase(Phase::InGame),
                ]
            }
            _ => Vec::new(),
        }
    }
}

struct Table;

impl InputHandler<TurnGame> for Table {
    fn handle_message(
        &mut self,
        view: &SessionView<TurnGame>,
        data: &[u8],
    ) -> Vec<Action<TurnGame>> {
        match decode(data) {
            Some(ServerMsg::Turn { number, summary }) => {
                println!("turn {number}: {summary}");
                let mut actions = vec![
                    Action::Apply(BoardUpdate::Turn { number, summary }),
                    Action::PlaySound(TURN_SOUND),
                ];
                // This client has nothing to decide, so it ends every turn.
                if let Ok(bytes) = serde_json::to_vec(&ClientMsg::EndTurn { turn: number }) {
                    actions.push(Action::Send(bytes));
                }
                actions
            }
            Some(ServerMsg::GameOver) => {
                if let Some((turns, events)) = view
                    .game_root()
                    .map(|root| root.read(|board| (board.turn, board.log.len())))
                {
                    println!("game over after {turns} turns ({events} events)");
                }
                vec![Action::SwitchPhase(Phase::PreGame)]
            }
            _ => Vec::new(),
        }
    }
}

// ===========================================================================
// Main
// ===========================================================================

#[tokio::main]
async fn main() -> ExitCode {
    meridian::logging::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "meridian.json".to_string());
    let config = match ClientConfig::load_or_default(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "could not load config");
            return ExitCode::FAILURE;
        }
    };

    let handlers = PhaseHandlers::new(
        HandlerPair::new(Outbox, Lobby),
        HandlerPair::new(Outbox, Table),
    );
    let client = match MeridianClientBuilder::new()
        .config(config)
        .config_path(&path)
        .start(DisplayResources::new(HeadlessPresenter::windowed_only()), handlers)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "could not start session");
            return ExitCode::FAILURE;
        }
    };

    let mut events = client.session().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("event: {event:?}");
        }
    });

    match client.connect().await {
        Ok(player) => {
            println!("logged in as {} ({})", player.name, player.id);
            if let Err(e) = client.session().submit_intent(ClientMsg::Ready).await {
                tracing::warn!(error = %e, "could not announce readiness");
            }
        }
        Err(e) => tracing::error!(error = %e, "login failed"),
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for Ctrl-C");
    }
    client.quit().await.exit_code()
}
