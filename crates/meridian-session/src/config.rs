//! Configuration for the session coordinator.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ===========================================================================
// SessionConfig
// ===========================================================================

/// Timeouts and start-time flags for a session.
///
/// All durations are in milliseconds so the struct maps one-to-one onto
/// the client config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long to wait for the server to acknowledge a login.
    pub handshake_timeout_ms: u64,

    /// Upper bound for one outbound send. A send that takes longer is
    /// treated as a lost connection.
    pub send_timeout_ms: u64,

    /// Upper bound for the graceful part of `quit()`. After this the
    /// coordinator tears down without waiting for the server.
    pub quit_timeout_ms: u64,

    /// Start as administrator. Only meaningful after login, so a `true`
    /// here is rejected by [`validated`](Self::validated).
    pub administrator: bool,

    /// Start in single-player mode (the server runs in-process).
    pub single_player: bool,

    /// Backoff used by reconnect loops.
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 10_000,
            send_timeout_ms: 5_000,
            quit_timeout_ms: 2_000,
            administrator: false,
            single_player: false,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Returns a copy that is safe to start a session with.
    ///
    /// - zero timeouts are raised to 1 ms (a zero timeout would fail every
    ///   wait before it starts)
    /// - `administrator = true` is cleared with a warning, since the flag
    ///   implies a logged-in player and nobody is logged in at start
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("handshake_timeout_ms", &mut self.handshake_timeout_ms),
            ("send_timeout_ms", &mut self.send_timeout_ms),
            ("quit_timeout_ms", &mut self.quit_timeout_ms),
        ] {
            if *value == 0 {
                tracing::warn!(field = name, "zero timeout raised to 1ms");
                *value = 1;
            }
        }
        if self.administrator {
            tracing::warn!(
                "administrator flag set at session start; cleared until a login grants it"
            );
            self.administrator = false;
        }
        self.reconnect = self.reconnect.validated();
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }
}

// ===========================================================================
// ReconnectPolicy
// ===========================================================================

/// Exponential backoff with random jitter.
///
/// ```text
/// delay(n) = min(base * 2^n, max) + uniform(0..=jitter)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Attempts before giving up. 0 disables reconnecting.
    pub max_attempts: u32,
    pub jitter_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 15_000,
            max_attempts: 5,
            jitter_ms: 250,
        }
    }
}

impl ReconnectPolicy {
    /// Clamps `max_delay_ms` to at least `base_delay_ms`.
    pub fn validated(mut self) -> Self {
        if self.max_delay_ms < self.base_delay_ms {
            self.max_delay_ms = self.base_delay_ms;
        }
        self
    }

    /// Delay before attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let capped = exp.min(self.max_delay_ms);
        let jitter = if self.jitter_ms > 0 {
            rand::rng().random_range(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(capped.saturating_add(jitter))
    }
}
