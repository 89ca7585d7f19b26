//! Client session coordination for Meridian.
//!
//! This crate owns one player's connection to a turn-based game server:
//!
//! 1. **Session state**: who the player is, whether they are logged in,
//!    which phase of play is active ([`Session`])
//! 2. **Routing**: server messages and user intents go to the handler
//!    pair of the active phase ([`PhaseHandlers`])
//! 3. **Game state**: one shared root, mutated only through the
//!    [`ModelGateway`]
//! 4. **Coordination**: an actor task that serializes all of the above
//!    and owns the display, audio, and transport ([`SessionHandle`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)  ← supplies handlers, game model, presenter
//!     ↕
//! Session Layer (this crate)  ← identity, connection state, phase routing
//!     ↕
//! Protocol / Transport / Frontend (below)
//! ```

mod config;
mod connect;
mod coordinator;
mod error;
mod event;
mod gateway;
mod handlers;
mod session;

pub use config::{ReconnectPolicy, SessionConfig};
pub use connect::Credentials;
pub use coordinator::{DisplayStatus, QuitOutcome, SessionHandle};
pub use error::SessionError;
pub use event::SessionEvent;
pub use gateway::{GameModel, GameRoot, ModelGateway};
pub use handlers::{Action, Controller, HandlerPair, InputHandler, PhaseHandlers, SessionView};
pub use session::{ConnectionState, Effect, Phase, Player, Session, SessionSnapshot};
