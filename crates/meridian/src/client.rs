//! `MeridianClient`: a session wired to real transports and a config file.

use std::path::PathBuf;

use meridian_frontend::DisplayResources;
use meridian_session::{GameModel, PhaseHandlers, Player, QuitOutcome, SessionError, SessionHandle};
use meridian_transport::{ClientConnection, WebSocketConnection};

use crate::{ClientConfig, LocalServer, MeridianError};

/// Builder for a [`MeridianClient`].
///
/// ```rust,ignore
/// let client = MeridianClientBuilder::new()
///     .config(ClientConfig::load_or_default("meridian.json")?)
///     .config_path("meridian.json")
///     .start(resources, handlers)
///     .await?;
/// client.connect().await?;
/// ```
#[derive(Debug, Default)]
pub struct MeridianClientBuilder {
    config: ClientConfig,
    config_path: Option<PathBuf>,
}

impl MeridianClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Where to write the config back when the display preference
    /// changes. Without a path the change lives only in memory.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Starts the session coordinator.
    ///
    /// # Errors
    /// [`MeridianError::Session`] if no presentation surface could be
    /// created.
    pub async fn start<M: GameModel>(
        self,
        resources: DisplayResources,
        handlers: PhaseHandlers<M>,
    ) -> Result<MeridianClient<M>, MeridianError> {
        let Self {
            mut config,
            config_path,
        } = self;
        let handle = SessionHandle::start(
            config.session.clone(),
            config.display,
            resources,
            handlers,
        )?;

        let display = handle.display().await?;
        if display.preferences != config.display {
            config.display = display.preferences;
            if let Some(path) = &config_path {
                config.save(path)?;
                tracing::info!(path = %path.display(), "saved downgraded display preference");
            }
        }

        Ok(MeridianClient {
            handle,
            config,
            config_path,
            hosted: None,
        })
    }
}

/// A running client.
pub struct MeridianClient<M: GameModel> {
    handle: SessionHandle<M, ClientConnection>,
    config: ClientConfig,
    config_path: Option<PathBuf>,
    hosted: Option<LocalServer>,
}

impl<M: GameModel> MeridianClient<M> {
    /// The session handle, for everything the client does not wrap.
    pub fn session(&self) -> &SessionHandle<M, ClientConnection> {
        &self.handle
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Opens a WebSocket to the configured server and logs in.
    ///
    /// # Errors
    /// [`SessionError::Precondition`] if the session is already logged
    /// in; transport and login errors otherwise.
    pub async fn connect(&self) -> Result<Player, MeridianError> {
        if self.handle.is_logged_in().await? {
            return Err(SessionError::Precondition("already logged in").into());
        }
        let url = &self.config.server_url;
        tracing::info!(%url, "connecting");
        let connection = WebSocketConnection::connect(url).await?;
        self.handle.set_single_player(false).await?;
        Ok(self
            .handle
            .login(connection.into(), &self.config.credentials)
            .await?)
    }

    /// Takes ownership of a locally hosted server, logs in over its
    /// in-process link, and marks the session single-player.
    ///
    /// A server hosted earlier is shut down first. If the login fails
    /// the new server is shut down too, so nothing is left running.
    ///
    /// # Errors
    /// [`SessionError::Precondition`] if the session is already logged
    /// in or the server's link was already used, otherwise whatever
    /// [`SessionHandle::login`] reports.
    pub async fn connect_local(
        &mut self,
        mut server: LocalServer,
    ) -> Result<Player, MeridianError> {
        let limit = self.handle.config().quit_timeout();
        if self.handle.is_logged_in().await? {
            server.shutdown(limit).await;
            return Err(SessionError::Precondition("already logged in").into());
        }
        if let Some(previous) = self.hosted.take() {
            previous.shutdown(limit).await;
        }
        let Some(link) = server.take_link() else {
            return Err(SessionError::Precondition("local server link already used").into());
        };
        self.handle.set_single_player(true).await?;
        match self.handle.login(link.into(), &self.config.credentials).await {
            Ok(player) => {
                self.hosted = Some(server);
                Ok(player)
            }
            Err(e) => {
                server.shutdown(limit).await;
                Err(e.into())
            }
        }
    }

    /// The locally hosted server, if this is a single-player game.
    pub fn hosted_server(&self) -> Option<&LocalServer> {
        self.hosted.as_ref()
    }

    /// Retries [`connect`](Self::connect) with the configured backoff.
    ///
    /// # Errors
    /// [`MeridianError::ReconnectExhausted`] after the last attempt, or a
    /// session error if the session is in single-player mode (a local
    /// link cannot be redialled).
    pub async fn reconnect(&self) -> Result<Player, MeridianError> {
        if self.handle.is_single_player().await? {
            return Err(
                SessionError::Precondition("single-player sessions cannot reconnect").into(),
            );
        }
        let policy = &self.config.session.reconnect;
        for attempt in 0..policy.max_attempts {
            let delay = policy.delay_for(attempt);
            tracing::info!(
                attempt = attempt + 1,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );
            tokio::time::sleep(delay).await;
            match self.connect().await {
                Ok(player) => return Ok(player),
                Err(e @ MeridianError::Session(SessionError::Precondition(_))) => return Err(e),
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "reconnect attempt failed")
                }
            }
        }
        Err(MeridianError::ReconnectExhausted {
            attempts: policy.max_attempts,
        })
    }

    /// The config file this client writes back to, if any.
    pub fn config_path(&self) -> Option<&std::path::Path> {
        self.config_path.as_deref()
    }

    /// Quits the session, then stops the hosted server if there is one.
    /// Each step is bounded by the quit timeout. See
    /// [`SessionHandle::quit`].
    pub async fn quit(self) -> QuitOutcome {
        let mut outcome = self.handle.quit().await;
        if let Some(server) = self.hosted {
            let stopped = server.shutdown(self.handle.config().quit_timeout()).await;
            outcome.graceful &= stopped;
        }
        outcome
    }
}
