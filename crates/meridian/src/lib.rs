//! # Meridian
//!
//! Client-side session coordination for multiplayer turn-based games.
//!
//! A Meridian client keeps one player's connection to a game server
//! consistent: login state, identity, the shared game state, which phase
//! of play is active, and the display mode, all changed in a single
//! order by one coordinator task.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meridian::prelude::*;
//!
//! // Implement GameModel, a Controller and an InputHandler per phase, then:
//! // meridian::logging::init();
//! // let client = MeridianClientBuilder::new()
//! //     .config(ClientConfig::load_or_default("meridian.json")?)
//! //     .config_path("meridian.json")
//! //     .start(DisplayResources::new(HeadlessPresenter::windowed_only()), handlers)
//! //     .await?;
//! // client.connect().await?;
//! // std::process::exit(...) with client.quit().await.exit_code()
//! ```

mod client;
mod config;
mod error;
mod hosted;
pub mod logging;

pub use client::{MeridianClient, MeridianClientBuilder};
pub use config::ClientConfig;
pub use error::MeridianError;
pub use hosted::{LocalServer, ShutdownSignal};

pub mod prelude {
    //! Everything an application needs to wire a client.

    pub use crate::{
        ClientConfig, LocalServer, MeridianClient, MeridianClientBuilder, MeridianError,
        ShutdownSignal,
    };
    pub use meridian_frontend::{
        Bounds, DisplayMode, DisplayPreferences, DisplayResources, HeadlessPresenter, ModeSelection,
        Presenter, SoundId, SoundPlayer,
    };
    pub use meridian_protocol::PlayerId;
    pub use meridian_session::{
        Action, ConnectionState, Controller, Credentials, GameModel, GameRoot, HandlerPair,
        InputHandler, Phase, PhaseHandlers, Player, QuitOutcome, ReconnectPolicy, SessionConfig,
        SessionError, SessionEvent, SessionHandle, SessionView,
    };
    pub use meridian_transport::{ClientConnection, MemoryConnection};
}
