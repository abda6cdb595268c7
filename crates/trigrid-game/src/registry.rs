//! The game registry: owner of every live session, and the matchmaker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use trigrid_protocol::{GameId, PlayerId};

use crate::{GameError, GameSession, LineWin, SessionState, Slot};

/// Thread-safe directory of live game sessions, keyed by [`GameId`].
///
/// Ids come from a monotonic counter, so a session's identity is stable
/// for as long as it lives; a removal never shifts the id another task
/// has already resolved.
pub struct GameRegistry {
    board_size: usize,
    next_id: AtomicU64,
    inner: Mutex<HashMap<GameId, Arc<GameSession>>>,
}

impl GameRegistry {
    /// Creates an empty registry; new sessions get `board_size` boards.
    pub fn new(board_size: usize) -> Self {
        Self {
            board_size,
            next_id: AtomicU64::new(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<GameId, Arc<GameSession>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks a session up by id.
    pub fn get(&self, id: GameId) -> Option<Arc<GameSession>> {
        self.lock().get(&id).cloned()
    }

    /// Finds the session a player is seated in, if any.
    pub fn find(&self, player: PlayerId) -> Option<Arc<GameSession>> {
        self.lock()
            .values()
            .find(|session| session.slot_of(player).is_some())
            .cloned()
    }

    /// Seats a player: in a waiting session with an empty seat if one
    /// exists, otherwise in a freshly created session.
    ///
    /// # Errors
    /// [`GameError::SessionFull`] only on a lost race for the last seat;
    /// callers may simply retry.
    pub fn seat(&self, player: PlayerId) -> Result<(Arc<GameSession>, Slot), GameError> {
        let mut games = self.lock();

        if let Some(session) = games
            .values()
            .find(|s| s.state() == SessionState::Waiting && !s.is_full())
        {
            let session = Arc::clone(session);
            let slot = session.join(player)?;
            return Ok((session, slot));
        }

        let id = GameId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(GameSession::new(id, self.board_size, Box::new(LineWin)));
        let slot = session.join(player)?;
        games.insert(id, Arc::clone(&session));
        tracing::info!(game_id = %id, %player, "game session created");
        Ok((session, slot))
    }

    /// Removes a session, tearing it down for good.
    pub fn remove(&self, id: GameId) -> Option<Arc<GameSession>> {
        let removed = self.lock().remove(&id);
        if removed.is_some() {
            tracing::info!(game_id = %id, "game session removed");
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no session is live.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
