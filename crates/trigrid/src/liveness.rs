//! Watchdog tasks shadowing every logged-in player.
//!
//! Each player gets two: the liveness watchdog flips them to
//! disconnected when heartbeats stop and pauses their opponent; the
//! hard-timeout watchdog logs them out once the silence outlasts
//! `disconnect_timeout`. Both are cancellable through the `watch`
//! senders stored on the player record — arming a new watchdog drops
//! the old sender, which terminates the old task on its next tick, so
//! a reconnect can never leave two watchdogs running for one player.

use std::sync::Arc;

use trigrid_protocol::{Opcode, PlayerId};

use crate::handler::{disconnect_player, notify};
use crate::server::ServerState;

/// Spawns the liveness watchdog for a player.
///
/// Every `ping_interval` it recomputes the connected flag from the ping
/// clock. On the transition to disconnected it sends Pause to the
/// opponent and stops; the Recovery handler arms a replacement once the
/// player is back. The task also stops when the player record vanishes
/// or its connection is replaced by a relogin.
pub(crate) fn spawn_liveness_watchdog(state: Arc<ServerState>, player_id: PlayerId) {
    let Some(mut cancelled) = state.players.arm_liveness_watchdog(player_id) else {
        return;
    };
    let Some(conn_id) = state
        .players
        .connection_of(player_id)
        .map(|conn| conn.id())
    else {
        return;
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.ping_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancelled.changed() => return,
            }

            // A relogin swapped the connection out from under us; the
            // recovery flow owns the player now.
            let current = state.players.connection_of(player_id).map(|c| c.id());
            if current != Some(conn_id) {
                return;
            }

            let threshold = state.config.liveness_threshold();
            let Some(liveness) = state.players.recompute_connected(player_id, threshold)
            else {
                return;
            };
            if !liveness.connected {
                if liveness.changed {
                    tracing::info!(%player_id, "player stopped pinging, pausing game");
                    if let Some(session) = state.games.find(player_id) {
                        if let Some(opponent) = session.opponent_of(player_id) {
                            notify(&state, opponent, Opcode::Pause, "");
                        }
                    }
                }
                return;
            }
        }
    });
}

/// Spawns the hard-timeout watchdog for a player.
///
/// Runs for the whole lifetime of the record, across reconnects: once
/// the ping clock goes silent for longer than `disconnect_timeout`, the
/// player is logged out through the common disconnect path and forfeits
/// any running game.
pub(crate) fn spawn_timeout_watchdog(state: Arc<ServerState>, player_id: PlayerId) {
    let Some(mut cancelled) = state.players.arm_timeout_watchdog(player_id) else {
        return;
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.ping_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancelled.changed() => return,
            }

            match state.players.ping_age(player_id) {
                None => return,
                Some(age) if age > state.config.disconnect_timeout() => {
                    tracing::info!(%player_id, ?age, "player timed out, logging out");
                    disconnect_player(&state, player_id);
                    return;
                }
                Some(_) => {}
            }
        }
    });
}
