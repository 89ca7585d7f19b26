//! The client config file.
//!
//! One JSON document holding everything a client needs to start: where
//! the server is, who to log in as, the display preference, and the
//! session timeouts. Missing fields take their defaults, so an empty
//! `{}` is a valid file.

use std::fs;
use std::path::Path;

use meridian_frontend::DisplayPreferences;
use meridian_session::{Credentials, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::MeridianError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the game server.
    pub server_url: String,
    pub credentials: Credentials,
    /// Rewritten when a fullscreen request falls back to a window.
    pub display: DisplayPreferences,
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080".to_string(),
            credentials: Credentials::new("player"),
            display: DisplayPreferences::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Reads the config from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MeridianError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| MeridianError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| MeridianError::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, MeridianError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Writes the config to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MeridianError> {
        let path = path.as_ref();
        let text =
            serde_json::to_string_pretty(self).map_err(|source| MeridianError::ConfigFormat {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, text).map_err(|source| MeridianError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }
}
