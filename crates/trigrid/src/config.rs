//! Server configuration.
//!
//! All fields have defaults, so an empty JSON object (or no file at
//! all) yields a working local setup. Timings are kept in milliseconds
//! so tests can shrink them without touching the code.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ServerError;

/// Configuration for a [`Server`](crate::Server).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: String,
    /// Maximum number of logged-in players.
    pub max_clients: usize,
    /// Throttled failures a connection survives before being kicked.
    pub max_invalid_ops: u32,
    /// Expected heartbeat spacing; also the watchdog tick.
    pub ping_interval_ms: u64,
    /// Missed heartbeats before a player counts as disconnected.
    pub max_missed_pings: u32,
    /// Silence after which a disconnected player forfeits for good.
    pub disconnect_timeout_ms: u64,
    /// Side length of the game board.
    pub board_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_clients: 4,
            max_invalid_ops: 5,
            ping_interval_ms: 3_000,
            max_missed_pings: 3,
            disconnect_timeout_ms: 80_000,
            board_size: 3,
        }
    }
}

impl ServerConfig {
    /// Loads overrides from a JSON file on top of the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    /// Expected heartbeat spacing, as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Silence after which a connected player is considered lost.
    pub fn liveness_threshold(&self) -> Duration {
        self.ping_interval() * self.max_missed_pings
    }

    /// Silence after which a player is logged out and forfeits.
    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    /// [`ServerError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_clients == 0 {
            return Err(ServerError::Config("max_clients must be at least 1".into()));
        }
        if self.max_invalid_ops == 0 {
            return Err(ServerError::Config(
                "max_invalid_ops must be at least 1".into(),
            ));
        }
        if self.ping_interval_ms == 0 {
            return Err(ServerError::Config("ping_interval_ms must be non-zero".into()));
        }
        if self.board_size < 2 {
            return Err(ServerError::Config("board_size must be at least 2".into()));
        }
        if self.disconnect_timeout() <= self.liveness_threshold() {
            return Err(ServerError::Config(format!(
                "disconnect_timeout_ms ({}) must exceed ping_interval_ms x max_missed_pings ({})",
                self.disconnect_timeout_ms,
                self.liveness_threshold().as_millis(),
            )));
        }
        Ok(())
    }
}
