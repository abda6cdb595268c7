//! The player registry: the thread-safe directory of logged-in players.
//!
//! # Concurrency note
//!
//! The lock is encapsulated: every public method takes `&self`, locks,
//! does its work, and returns owned data. No critical section performs
//! I/O or awaits, so the registry can be shared freely across connection
//! tasks and watchdogs without lock-ordering concerns of its own —
//! cross-structure flows (registry lookup, then game-session mutation)
//! take the two locks strictly one at a time.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use trigrid_protocol::PlayerId;

use crate::{ConnectionHandle, ConnectionId, Player, PlayerStatus, SessionError};

/// Result of a login attempt against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A brand-new record was created.
    Welcome(PlayerId),
    /// The name matched an existing record: its connection was swapped in
    /// place and the player must complete the recovery handshake.
    Relogin(PlayerId),
}

/// Outcome of one liveness recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// The verdict just computed from the ping clock.
    pub connected: bool,
    /// Whether the verdict differs from the stored flag it replaced.
    pub changed: bool,
}

struct Inner {
    next_id: u32,
    players: Vec<Player>,
}

/// Thread-safe directory of logged-in players, keyed by display name.
///
/// Bounded by `max_clients`; the sole owner of every [`Player`] record.
pub struct PlayerRegistry {
    max_clients: usize,
    inner: Mutex<Inner>,
}

impl PlayerRegistry {
    /// Creates an empty registry holding at most `max_clients` players.
    pub fn new(max_clients: usize) -> Self {
        Self {
            max_clients,
            inner: Mutex::new(Inner {
                next_id: 1,
                players: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Logs a name in over the given connection.
    ///
    /// A fresh name registers a new record (status `InLobby`, connected,
    /// ping clock stamped). A name already present reattaches: the stored
    /// connection handle is swapped in place (the old one is closed), the
    /// ping clock is stamped, and the player is marked disconnected until
    /// the recovery handshake flips the flag back.
    ///
    /// # Errors
    /// [`SessionError::RegistryFull`] when a fresh registration would
    /// exceed the capacity.
    pub fn login(
        &self,
        name: &str,
        conn: ConnectionHandle,
    ) -> Result<LoginOutcome, SessionError> {
        let mut inner = self.lock();

        if let Some(player) = inner.players.iter_mut().find(|p| p.name == name) {
            if let Some(old) = player.conn.replace(conn) {
                old.close();
            }
            player.last_ping = Instant::now();
            player.connected = false;
            tracing::info!(player_id = %player.id, name, "player reattached, recovery pending");
            return Ok(LoginOutcome::Relogin(player.id));
        }

        if inner.players.len() >= self.max_clients {
            return Err(SessionError::RegistryFull(self.max_clients));
        }

        let id = PlayerId(inner.next_id);
        inner.next_id += 1;
        inner.players.push(Player::new(id, name.to_string(), conn));
        tracing::info!(player_id = %id, name, "player registered");
        Ok(LoginOutcome::Welcome(id))
    }

    /// Removes a player's record, freeing the name for reuse.
    ///
    /// Returns the record so the caller can close its connection. Dropping
    /// the record also drops its watchdog senders, cancelling both
    /// watchdog tasks.
    pub fn remove(&self, id: PlayerId) -> Option<Player> {
        let mut inner = self.lock();
        let idx = inner.players.iter().position(|p| p.id == id)?;
        let player = inner.players.remove(idx);
        tracing::info!(player_id = %id, name = %player.name, "player removed");
        Some(player)
    }

    /// Looks up a player's id by name (linear scan under the lock).
    pub fn find_by_name(&self, name: &str) -> Option<PlayerId> {
        self.lock().players.iter().find(|p| p.name == name).map(|p| p.id)
    }

    /// Looks up which player currently owns the given connection.
    pub fn find_by_connection(&self, conn_id: ConnectionId) -> Option<PlayerId> {
        self.lock()
            .players
            .iter()
            .find(|p| p.conn.as_ref().is_some_and(|c| c.id() == conn_id))
            .map(|p| p.id)
    }

    /// Runs a closure against a player's record under the lock.
    ///
    /// Returns `None` if the player is gone. The closure must not block.
    pub fn with_player<T>(&self, id: PlayerId, f: impl FnOnce(&Player) -> T) -> Option<T> {
        self.lock().players.iter().find(|p| p.id == id).map(f)
    }

    fn with_player_mut<T>(
        &self,
        id: PlayerId,
        f: impl FnOnce(&mut Player) -> T,
    ) -> Option<T> {
        self.lock().players.iter_mut().find(|p| p.id == id).map(f)
    }

    /// Returns a player's display name.
    pub fn name_of(&self, id: PlayerId) -> Option<String> {
        self.with_player(id, |p| p.name.clone())
    }

    /// Returns a clone of a player's connection handle.
    pub fn connection_of(&self, id: PlayerId) -> Option<ConnectionHandle> {
        self.with_player(id, |p| p.conn.clone())?
    }

    /// Returns a player's lobby/game status.
    pub fn status_of(&self, id: PlayerId) -> Option<PlayerStatus> {
        self.with_player(id, |p| p.status)
    }

    /// Updates a player's lobby/game status.
    pub fn set_status(&self, id: PlayerId, status: PlayerStatus) -> bool {
        self.with_player_mut(id, |p| p.status = status).is_some()
    }

    /// Returns a player's stored liveness flag.
    pub fn is_connected(&self, id: PlayerId) -> Option<bool> {
        self.with_player(id, |p| p.connected)
    }

    /// Overwrites a player's liveness flag.
    pub fn set_connected(&self, id: PlayerId, connected: bool) -> bool {
        self.with_player_mut(id, |p| p.connected = connected).is_some()
    }

    /// Stamps a player's ping clock with the current time.
    pub fn touch_ping(&self, id: PlayerId) -> bool {
        self.with_player_mut(id, |p| p.last_ping = Instant::now())
            .is_some()
    }

    /// Returns the elapsed time since the player's last ping.
    pub fn ping_age(&self, id: PlayerId) -> Option<Duration> {
        self.with_player(id, Player::ping_age)
    }

    /// Recomputes the liveness flag from the ping clock: connected iff
    /// the last ping is no older than `threshold`.
    pub fn recompute_connected(
        &self,
        id: PlayerId,
        threshold: Duration,
    ) -> Option<Liveness> {
        self.with_player_mut(id, |p| {
            let connected = p.ping_age() <= threshold;
            let changed = connected != p.connected;
            p.connected = connected;
            Liveness { connected, changed }
        })
    }

    /// Arms the liveness watchdog slot: stores a fresh cancellation
    /// sender on the record (cancelling any previous watchdog task) and
    /// returns the receiver for the new task to select on.
    pub fn arm_liveness_watchdog(&self, id: PlayerId) -> Option<watch::Receiver<()>> {
        self.with_player_mut(id, |p| {
            let (tx, rx) = watch::channel(());
            p.liveness_watchdog = Some(tx);
            rx
        })
    }

    /// Arms the hard-timeout watchdog slot, as
    /// [`arm_liveness_watchdog`](Self::arm_liveness_watchdog).
    pub fn arm_timeout_watchdog(&self, id: PlayerId) -> Option<watch::Receiver<()>> {
        self.with_player_mut(id, |p| {
            let (tx, rx) = watch::channel(());
            p.timeout_watchdog = Some(tx);
            rx
        })
    }

    /// Number of logged-in players.
    pub fn len(&self) -> usize {
        self.lock().players.len()
    }

    /// Returns `true` if nobody is logged in.
    pub fn is_empty(&self) -> bool {
        self.lock().players.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> ConnectionHandle {
        let (handle, rx, closed) = ConnectionHandle::new();
        // Keep the writer and close-watch ends alive for the duration of
        // the test; without a live watch receiver, close() cannot stick.
        std::mem::forget(rx);
        std::mem::forget(closed);
        handle
    }

    fn registry() -> PlayerRegistry {
        PlayerRegistry::new(4)
    }

    // =====================================================================
    // login()
    // =====================================================================

    #[test]
    fn test_login_assigns_strictly_increasing_ids_from_one() {
        let reg = registry();
        for (i, name) in ["Alice", "Bob", "Carol", "Dave"].iter().enumerate() {
            let outcome = reg.login(name, conn()).unwrap();
            assert_eq!(outcome, LoginOutcome::Welcome(PlayerId(i as u32 + 1)));
        }
    }

    #[test]
    fn test_login_fresh_player_starts_in_lobby_and_connected() {
        let reg = registry();
        let LoginOutcome::Welcome(id) = reg.login("Alice", conn()).unwrap() else {
            panic!("expected fresh registration");
        };
        assert_eq!(reg.status_of(id), Some(PlayerStatus::InLobby));
        assert_eq!(reg.is_connected(id), Some(true));
        assert!(reg.ping_age(id).unwrap() < Duration::from_secs(1));
    }

    #[test]
    fn test_login_rejects_when_at_capacity() {
        let reg = PlayerRegistry::new(2);
        reg.login("Alice", conn()).unwrap();
        reg.login("Bob", conn()).unwrap();

        let err = reg.login("Carol", conn()).unwrap_err();
        assert!(matches!(err, SessionError::RegistryFull(2)));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_login_same_name_reattaches_instead_of_creating() {
        let reg = registry();
        let LoginOutcome::Welcome(id) = reg.login("Alice", conn()).unwrap() else {
            panic!("expected fresh registration");
        };

        let outcome = reg.login("Alice", conn()).unwrap();
        assert_eq!(outcome, LoginOutcome::Relogin(id));
        assert_eq!(reg.len(), 1, "no second record");
        // Pending recovery until the handshake completes.
        assert_eq!(reg.is_connected(id), Some(false));
    }

    #[test]
    fn test_relogin_swaps_connection_and_closes_the_old_one() {
        let reg = registry();
        let old = conn();
        let old_id = old.id();
        reg.login("Alice", old.clone()).unwrap();

        let new = conn();
        let LoginOutcome::Relogin(id) = reg.login("Alice", new.clone()).unwrap() else {
            panic!("expected relogin");
        };

        assert!(old.is_closed());
        assert_eq!(reg.connection_of(id).unwrap().id(), new.id());
        assert_eq!(reg.find_by_connection(new.id()), Some(id));
        assert_eq!(reg.find_by_connection(old_id), None);
    }

    #[test]
    fn test_relogin_is_possible_even_at_capacity() {
        let reg = PlayerRegistry::new(1);
        reg.login("Alice", conn()).unwrap();
        assert!(matches!(
            reg.login("Alice", conn()).unwrap(),
            LoginOutcome::Relogin(_)
        ));
    }

    // =====================================================================
    // remove()
    // =====================================================================

    #[test]
    fn test_remove_frees_the_name_for_reuse() {
        let reg = registry();
        let LoginOutcome::Welcome(first) = reg.login("Alice", conn()).unwrap() else {
            panic!("expected fresh registration");
        };
        reg.remove(first).unwrap();
        assert!(reg.is_empty());

        // Re-registering under the freed name is a fresh record with a new id.
        let LoginOutcome::Welcome(second) = reg.login("Alice", conn()).unwrap() else {
            panic!("expected fresh registration, not relogin");
        };
        assert!(second > first, "ids keep increasing, never reused");
    }

    #[test]
    fn test_remove_unknown_player_is_none() {
        assert!(registry().remove(PlayerId(99)).is_none());
    }

    // =====================================================================
    // Liveness bookkeeping
    // =====================================================================

    #[test]
    fn test_recompute_connected_within_threshold_stays_connected() {
        let reg = registry();
        let LoginOutcome::Welcome(id) = reg.login("Alice", conn()).unwrap() else {
            panic!("expected fresh registration");
        };

        let live = reg
            .recompute_connected(id, Duration::from_secs(60))
            .unwrap();
        assert!(live.connected);
        assert!(!live.changed);
    }

    #[test]
    fn test_recompute_connected_reports_the_disconnect_transition_once() {
        let reg = registry();
        let LoginOutcome::Welcome(id) = reg.login("Alice", conn()).unwrap() else {
            panic!("expected fresh registration");
        };

        let live = reg.recompute_connected(id, Duration::ZERO).unwrap();
        assert!(!live.connected);
        assert!(live.changed, "first recomputation flips the flag");

        let live = reg.recompute_connected(id, Duration::ZERO).unwrap();
        assert!(!live.connected);
        assert!(!live.changed, "already disconnected, no transition");
    }

    #[test]
    fn test_touch_ping_resets_the_age() {
        let reg = registry();
        let LoginOutcome::Welcome(id) = reg.login("Alice", conn()).unwrap() else {
            panic!("expected fresh registration");
        };
        reg.recompute_connected(id, Duration::ZERO).unwrap();

        reg.touch_ping(id);
        let live = reg
            .recompute_connected(id, Duration::from_secs(60))
            .unwrap();
        assert!(live.connected);
        assert!(live.changed);
    }

    // =====================================================================
    // Watchdog arming
    // =====================================================================

    #[test]
    fn test_rearming_liveness_watchdog_cancels_the_previous_task() {
        let reg = registry();
        let LoginOutcome::Welcome(id) = reg.login("Alice", conn()).unwrap() else {
            panic!("expected fresh registration");
        };

        let mut first = reg.arm_liveness_watchdog(id).unwrap();
        let _second = reg.arm_liveness_watchdog(id).unwrap();

        // The first receiver's sender was dropped when the slot was
        // replaced, which is the cancellation signal.
        assert!(first.has_changed().is_err());
    }

    #[test]
    fn test_removing_player_cancels_both_watchdogs() {
        let reg = registry();
        let LoginOutcome::Welcome(id) = reg.login("Alice", conn()).unwrap() else {
            panic!("expected fresh registration");
        };
        let mut liveness = reg.arm_liveness_watchdog(id).unwrap();
        let mut timeout = reg.arm_timeout_watchdog(id).unwrap();

        drop(reg.remove(id));

        assert!(liveness.has_changed().is_err());
        assert!(timeout.has_changed().is_err());
    }
}
