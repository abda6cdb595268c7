//! Per-connection dispatcher: gates, opcode routing, and the invalid-
//! operation throttle.
//!
//! Each accepted connection gets one task running [`handle_connection`].
//! The loop reads frames, routes them through the gate chain (logged in?
//! recovered? opponent reachable?), and runs the opcode handler. A
//! handler returns either a direct `ok` payload or an [`OpFailure`]
//! whose `throttle` flag decides both the wire marker and whether the
//! failure counts toward the kick limit. Side-band notifications
//! (GameStarted, YourTurn, Pause, ...) are pushed through [`notify`]
//! independently of the direct reply.

use std::sync::Arc;

use tokio::net::TcpStream;

use trigrid_game::{GameError, GameResult, GameSession, MoveOutcome, SessionState};
use trigrid_protocol::{
    Frame, GAME_GONE, Opcode, PlayerId, ProtocolError, RECOVERY_IN_GAME_GAME_OVER,
    RECOVERY_IN_GAME_OTHER_TURN, RECOVERY_IN_GAME_YOUR_TURN, RECOVERY_IN_LOBBY,
    RECOVERY_LOGIN, RECOVERY_READY_FOR_GAME, encode_err, encode_ok, read_frame,
};
use trigrid_session::{ConnectionHandle, LoginOutcome, PlayerStatus};

use crate::connection;
use crate::liveness::{spawn_liveness_watchdog, spawn_timeout_watchdog};
use crate::server::ServerState;

/// A failed operation: the reason text sent back, and whether the
/// failure counts toward the invalid-operation throttle. The flag is
/// what puts the reserved trailing marker on the wire.
struct OpFailure {
    reason: String,
    throttle: bool,
}

impl OpFailure {
    fn throttled(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            throttle: true,
        }
    }

    fn plain(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            throttle: false,
        }
    }
}

impl From<GameError> for OpFailure {
    fn from(e: GameError) -> Self {
        OpFailure::throttled(e.to_string())
    }
}

/// `Ok(Some(payload))` sends `ok;payload` on the request's opcode;
/// `Ok(None)` means the handler already pushed everything it had to say.
type OpResult = Result<Option<String>, OpFailure>;

/// Runs one connection from accept to close.
pub(crate) async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) {
    let (conn, mut rd, mut closed) = connection::spawn(stream);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "dispatcher started");

    let mut invalid_ops: u32 = 0;

    loop {
        let frame = tokio::select! {
            res = read_frame(&mut rd) => match res {
                Ok(frame) => frame,
                // A malformed header costs the client the frame, not
                // the connection.
                Err(e @ (ProtocolError::BadMagic | ProtocolError::BadHeader(_))) => {
                    tracing::debug!(%conn_id, error = %e, "dropping malformed frame");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "read failed");
                    break;
                }
            },
            _ = closed.changed() => break,
        };

        match dispatch(&state, &conn, &frame) {
            Ok(Some(payload)) => {
                if !send_reply(&conn, encode_ok(frame.opcode, &payload)) {
                    break;
                }
            }
            Ok(None) => {}
            Err(failure) => {
                if failure.throttle {
                    invalid_ops += 1;
                    if invalid_ops >= state.config.max_invalid_ops {
                        tracing::info!(%conn_id, "invalid operation limit reached, kicking");
                        break;
                    }
                }
                let encoded = encode_err(frame.opcode, &failure.reason, failure.throttle);
                if !send_reply(&conn, encoded) {
                    break;
                }
            }
        }
    }

    // Only tear the player down if this connection still owns the
    // record; a relogin may have handed it to a newer connection.
    if let Some(player_id) = state.players.find_by_connection(conn_id) {
        tracing::info!(%player_id, %conn_id, "connection lost, logging player out");
        disconnect_player(&state, player_id);
    }
    conn.close();
}

fn dispatch(state: &Arc<ServerState>, conn: &ConnectionHandle, frame: &Frame) -> OpResult {
    let op = Opcode::from_code(frame.opcode);

    let Some(player_id) = state.players.find_by_connection(conn.id()) else {
        return match op {
            Some(Opcode::Login) => handle_login(state, conn, frame),
            Some(Opcode::Ping) => Ok(Some("ping".to_string())),
            _ => Err(OpFailure::plain(
                "Only logged in clients can execute commands.",
            )),
        };
    };

    match op {
        Some(Opcode::Login) => return Err(OpFailure::throttled("already logged in")),
        Some(Opcode::Recovery) => return handle_recovery(state, player_id),
        _ => {}
    }

    // After a reconnect, nothing else runs until the client asks for
    // its state snapshot.
    if state.players.is_connected(player_id) == Some(false) {
        return Err(OpFailure::plain(
            "must send recovery opcode after reconnection",
        ));
    }

    if op == Some(Opcode::Ping) {
        state.players.touch_ping(player_id);
        return Ok(Some("ping".to_string()));
    }

    // With the opponent silent, game commands are on hold; remind the
    // caller with a Pause push.
    if let Some(session) = state.games.find(player_id) {
        if let Some(opponent) = session.opponent_of(player_id) {
            if state.players.is_connected(opponent) == Some(false) {
                notify(state, player_id, Opcode::Pause, "");
                return Err(OpFailure::plain(
                    "other player disconnected, must wait for other player",
                ));
            }
        }
    }

    match op {
        Some(Opcode::Join) => handle_join(state, player_id),
        Some(Opcode::Move) => handle_move(state, player_id, frame),
        Some(Opcode::PlayAgain) => handle_play_again(state, player_id),
        Some(Opcode::ReturnToStart) => handle_return_to_start(state, player_id),
        _ => Err(OpFailure::plain(format!(
            "unknown opcode {:03}",
            frame.opcode
        ))),
    }
}

// ---------------------------------------------------------------------------
// Opcode handlers
// ---------------------------------------------------------------------------

fn handle_login(state: &Arc<ServerState>, conn: &ConnectionHandle, frame: &Frame) -> OpResult {
    let args = frame.args();
    let name = match args.as_slice() {
        [name] if !name.is_empty() => *name,
        _ => return Err(OpFailure::throttled("invalid name")),
    };

    match state.players.login(name, conn.clone()) {
        Ok(LoginOutcome::Welcome(id)) => {
            spawn_liveness_watchdog(Arc::clone(state), id);
            spawn_timeout_watchdog(Arc::clone(state), id);
            Ok(Some(format!(
                "Welcome {name}. Your ID is: {};{}",
                id.0, state.config.board_size
            )))
        }
        Ok(LoginOutcome::Relogin(id)) => {
            tracing::info!(player_id = %id, name, "relogin, awaiting recovery");
            Err(OpFailure::plain(format!(
                "{RECOVERY_LOGIN};{}",
                state.config.board_size
            )))
        }
        Err(e) => Err(OpFailure::plain(e.to_string())),
    }
}

fn handle_join(state: &Arc<ServerState>, player_id: PlayerId) -> OpResult {
    if state.players.status_of(player_id) != Some(PlayerStatus::InLobby) {
        return Err(OpFailure::throttled("player not in lobby"));
    }

    let (session, _slot) = state
        .games
        .seat(player_id)
        .map_err(|e| OpFailure::throttled(e.to_string()))?;
    let game_no = session.id().0;

    // A full pairing starts right away; the broadcasts are the only
    // frames the players get.
    if session.is_full() {
        start_game(state, &session)?;
        return Ok(None);
    }
    state
        .players
        .set_status(player_id, PlayerStatus::ReadyForGame);
    Ok(Some(format!("joined game {game_no}")))
}

fn handle_move(state: &Arc<ServerState>, player_id: PlayerId, frame: &Frame) -> OpResult {
    let args = frame.args();
    let (row, col) = match args.as_slice() {
        [row, col] => match (row.parse::<usize>(), col.parse::<usize>()) {
            (Ok(row), Ok(col)) => (row, col),
            _ => return Err(OpFailure::throttled("invalid move arguments")),
        },
        _ => return Err(OpFailure::throttled("invalid move arguments")),
    };

    let session = state
        .games
        .find(player_id)
        .ok_or_else(|| OpFailure::throttled(GameError::NotInSession.to_string()))?;
    let outcome = session.apply_move(player_id, row, col)?;

    // Everyone sees the new board; the direct reply is the mover's copy.
    let board = session.render_board();
    let opponent = session.opponent_of(player_id);
    for dst in [Some(player_id), opponent].into_iter().flatten() {
        notify(state, dst, Opcode::Move, &board);
    }

    match outcome {
        MoveOutcome::Continue { next } => notify(state, next, Opcode::YourTurn, ""),
        MoveOutcome::Over(result) => {
            let verdict = match result {
                GameResult::Win(winner) => {
                    state.players.name_of(winner).unwrap_or_default()
                }
                GameResult::Draw => "Draw".to_string(),
            };
            for dst in [Some(player_id), opponent].into_iter().flatten() {
                notify(state, dst, Opcode::GameOver, &verdict);
            }
            tracing::info!(game_id = %session.id(), outcome = %verdict, "game over");
        }
    }
    Ok(None)
}

fn handle_play_again(state: &Arc<ServerState>, player_id: PlayerId) -> OpResult {
    let Some(session) = state.games.find(player_id) else {
        state.players.set_status(player_id, PlayerStatus::InLobby);
        return Err(OpFailure::plain(GAME_GONE));
    };

    if state.players.status_of(player_id) != Some(PlayerStatus::InGame)
        || session.state() != SessionState::Over
    {
        return Err(OpFailure::throttled("player not in game or game not over"));
    }

    let both_ready = session.play_again(player_id)?;
    let game_no = session.id().0;

    if both_ready {
        start_game(state, &session)?;
        return Ok(None);
    }
    state
        .players
        .set_status(player_id, PlayerStatus::ReadyForGame);
    Ok(Some(format!("play again game {game_no}")))
}

fn handle_return_to_start(state: &Arc<ServerState>, player_id: PlayerId) -> OpResult {
    let Some(session) = state.games.find(player_id) else {
        state.players.set_status(player_id, PlayerStatus::InLobby);
        return Err(OpFailure::plain(GAME_GONE));
    };
    if state.players.status_of(player_id) != Some(PlayerStatus::InGame)
        || session.state() != SessionState::Over
    {
        return Err(OpFailure::throttled("player not in game or game not over"));
    }

    let opponent = session.opponent_of(player_id);
    session.remove_player(player_id);
    state.players.set_status(player_id, PlayerStatus::InLobby);

    // An opponent blocked on a replay vote learns the session is gone.
    if let Some(opponent) = opponent {
        if state.players.status_of(opponent) == Some(PlayerStatus::ReadyForGame) {
            state.players.set_status(opponent, PlayerStatus::InLobby);
            notify_err(state, opponent, Opcode::PlayAgain, GAME_GONE);
        }
    }

    state.games.remove(session.id());
    tracing::info!(%player_id, game_id = %session.id(), "player left the game");
    Ok(Some("left the lobby".to_string()))
}

fn handle_recovery(state: &Arc<ServerState>, player_id: PlayerId) -> OpResult {
    state.players.touch_ping(player_id);

    let payload = match state.players.status_of(player_id) {
        None => return Err(OpFailure::plain("player not found")),
        Some(PlayerStatus::InLobby) => RECOVERY_IN_LOBBY.to_string(),
        Some(PlayerStatus::ReadyForGame) => match state.games.find(player_id) {
            Some(_) => RECOVERY_READY_FOR_GAME.to_string(),
            None => {
                state.players.set_status(player_id, PlayerStatus::InLobby);
                RECOVERY_IN_LOBBY.to_string()
            }
        },
        Some(PlayerStatus::InGame) => match state.games.find(player_id) {
            None => {
                state.players.set_status(player_id, PlayerStatus::InLobby);
                RECOVERY_IN_LOBBY.to_string()
            }
            Some(session) => {
                let snap = session.snapshot();
                let opponent_name = session
                    .opponent_of(player_id)
                    .and_then(|opp| state.players.name_of(opp))
                    .unwrap_or_default();
                match snap.state {
                    SessionState::InPlay if snap.turn == Some(player_id) => format!(
                        "{RECOVERY_IN_GAME_YOUR_TURN};{};{opponent_name}",
                        snap.board
                    ),
                    SessionState::InPlay => format!(
                        "{RECOVERY_IN_GAME_OTHER_TURN};{};{opponent_name}",
                        snap.board
                    ),
                    SessionState::Over => {
                        let verdict = match snap.result {
                            Some(GameResult::Win(winner)) => {
                                state.players.name_of(winner).unwrap_or_default()
                            }
                            _ => "Draw".to_string(),
                        };
                        format!(
                            "{RECOVERY_IN_GAME_GAME_OVER};{};{verdict};{opponent_name}",
                            snap.board
                        )
                    }
                    SessionState::Waiting => RECOVERY_READY_FOR_GAME.to_string(),
                }
            }
        },
    };

    if state.players.is_connected(player_id) == Some(false) {
        state.players.set_connected(player_id, true);
        if let Some(session) = state.games.find(player_id) {
            if let Some(opponent) = session.opponent_of(player_id) {
                notify(state, opponent, Opcode::Continue, "");
            }
        }
        spawn_liveness_watchdog(Arc::clone(state), player_id);
        tracing::info!(%player_id, "player recovered");
    }

    Ok(Some(payload))
}

// ---------------------------------------------------------------------------
// Shared paths
// ---------------------------------------------------------------------------

/// Begins a game in a full session: both players go in-game, each learns
/// the opponent's name, the starter gets the turn.
fn start_game(state: &Arc<ServerState>, session: &Arc<GameSession>) -> Result<(), OpFailure> {
    let starter = session
        .start()
        .map_err(|e| OpFailure::throttled(e.to_string()))?;
    let Some(other) = session.opponent_of(starter) else {
        return Err(OpFailure::throttled(GameError::NotFull.to_string()));
    };

    for (dst, opp) in [(starter, other), (other, starter)] {
        state.players.set_status(dst, PlayerStatus::InGame);
        if let Some(opp_name) = state.players.name_of(opp) {
            notify(state, dst, Opcode::GameStarted, &opp_name);
        }
    }
    notify(state, starter, Opcode::YourTurn, "");
    tracing::info!(game_id = %session.id(), %starter, "game started");
    Ok(())
}

/// Logs a player out: removes the record, settles their game (the
/// opponent wins a running game by forfeit, a replay-waiting opponent is
/// demoted to the lobby), tears the session down, closes the socket.
///
/// Shared by the loop-exit cleanup, the throttle kick, and the hard-
/// timeout watchdog.
pub(crate) fn disconnect_player(state: &Arc<ServerState>, player_id: PlayerId) {
    let Some(player) = state.players.remove(player_id) else {
        return;
    };

    if let Some(session) = state.games.find(player_id) {
        let opponent = session.opponent_of(player_id);
        let in_play = session.state() == SessionState::InPlay;
        session.remove_player(player_id);

        if let Some(opponent) = opponent {
            if in_play {
                let verdict = state
                    .players
                    .name_of(opponent)
                    .map(|name| format!("{name} (opponent disconnected)"))
                    .unwrap_or_else(|| "opponent disconnected".to_string());
                notify(state, opponent, Opcode::GameOver, &verdict);
            } else if state.players.status_of(opponent) == Some(PlayerStatus::ReadyForGame) {
                state.players.set_status(opponent, PlayerStatus::InLobby);
                notify_err(state, opponent, Opcode::PlayAgain, GAME_GONE);
            }
        }
        state.games.remove(session.id());
    }

    if let Some(conn) = &player.conn {
        conn.close();
    }
    tracing::info!(%player_id, name = %player.name, "player logged out");
}

/// Pushes an `ok` notification to a player, if they are reachable.
pub(crate) fn notify(state: &ServerState, player_id: PlayerId, opcode: Opcode, payload: &str) {
    send_encoded(state, player_id, encode_ok(opcode.code(), payload));
}

fn notify_err(state: &ServerState, player_id: PlayerId, opcode: Opcode, reason: &str) {
    send_encoded(state, player_id, encode_err(opcode.code(), reason, false));
}

fn send_encoded(
    state: &ServerState,
    player_id: PlayerId,
    encoded: Result<Vec<u8>, ProtocolError>,
) {
    match encoded {
        Ok(bytes) => {
            if let Some(conn) = state.players.connection_of(player_id) {
                if conn.send(bytes).is_err() {
                    tracing::debug!(%player_id, "notification dropped, connection gone");
                }
            }
        }
        Err(e) => tracing::warn!(%player_id, error = %e, "failed to encode notification"),
    }
}

fn send_reply(conn: &ConnectionHandle, encoded: Result<Vec<u8>, ProtocolError>) -> bool {
    match encoded {
        Ok(bytes) => conn.send(bytes).is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode reply");
            true
        }
    }
}
