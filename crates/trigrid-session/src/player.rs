//! The player record: identity, status, and liveness bookkeeping.

use std::time::Instant;

use tokio::sync::watch;
use trigrid_protocol::PlayerId;

use crate::ConnectionHandle;

/// Where a player currently is, from the matchmaker's point of view.
///
/// ```text
/// InLobby ──(Join, no partner yet)──→ ReadyForGame ──(session starts)──→ InGame
///    ↑                                                                     │
///    └───────────────(ReturnToStart / session torn down)───────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Logged in, not matchmaking.
    InLobby,
    /// Waiting in a session for an opponent (or for a replay to start).
    ReadyForGame,
    /// Playing (or looking at a finished board, until they leave it).
    InGame,
}

/// One logged-in player's canonical record.
///
/// Owned exclusively by the [`PlayerRegistry`](crate::PlayerRegistry);
/// other tasks refer to it by [`PlayerId`] only.
#[derive(Debug)]
pub struct Player {
    /// Unique id, assigned sequentially starting at 1.
    pub id: PlayerId,
    /// Display name, unique among logged-in players.
    pub name: String,
    /// Handle to the current connection. Replaced in place on relogin.
    pub conn: Option<ConnectionHandle>,
    /// Lobby/game status.
    pub status: PlayerStatus,
    /// Liveness verdict, recomputed from the ping clock by the liveness
    /// watchdog and cleared on relogin until recovery completes.
    pub connected: bool,
    /// When the last ping (or other clock-stamping operation) arrived.
    pub last_ping: Instant,
    /// Cancellation sender for the liveness watchdog. Present iff a
    /// watchdog task is armed; dropping or replacing it cancels the task,
    /// so a relogin can never leave two watchdogs running.
    pub liveness_watchdog: Option<watch::Sender<()>>,
    /// Cancellation sender for the hard-timeout watchdog.
    pub timeout_watchdog: Option<watch::Sender<()>>,
}

impl Player {
    pub(crate) fn new(id: PlayerId, name: String, conn: ConnectionHandle) -> Self {
        Self {
            id,
            name,
            conn: Some(conn),
            status: PlayerStatus::InLobby,
            connected: true,
            last_ping: Instant::now(),
            liveness_watchdog: None,
            timeout_watchdog: None,
        }
    }

    /// Elapsed time since the ping clock was last stamped.
    pub fn ping_age(&self) -> std::time::Duration {
        self.last_ping.elapsed()
    }
}
