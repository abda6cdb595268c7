//! One game session: a board, two seats, and a turn state machine.
//!
//! ```text
//! Waiting ──(both seats taken, start)──→ InPlay ──(win or draw)──→ Over
//!                                          ↑                        │
//!                                          └──(both replay, start)──┘
//! ```
//!
//! The session has its own encapsulated lock; no method blocks or does
//! I/O while holding it. Callers share the session as
//! `Arc<GameSession>` via the [`GameRegistry`](crate::GameRegistry).

use std::sync::{Mutex, MutexGuard, PoisonError};

use trigrid_protocol::{GameId, PlayerId};

use crate::{GameError, WinRule};

const COL_SEP: char = '|';
const ROW_SEP: &str = "--";

/// One of the two seats in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    /// The opposite seat.
    pub fn other(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    fn index(self) -> usize {
        match self {
            Slot::One => 0,
            Slot::Two => 1,
        }
    }

    /// The occupant number this seat's marks render as.
    fn occupant(self) -> u32 {
        self.index() as u32 + 1
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// At least one seat is empty; no game has started.
    Waiting,
    /// A game is running and moves are accepted.
    InPlay,
    /// The last game ended; replay votes are accepted.
    Over,
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Win(PlayerId),
    Draw,
}

/// What a successfully applied move led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game goes on; `next` is now on turn.
    Continue { next: PlayerId },
    /// The move ended the game.
    Over(GameResult),
}

/// A consistent point-in-time view of a session, taken under its lock.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: SessionState,
    /// Rendered board, see [`GameSession::render_board`].
    pub board: String,
    /// The player on turn, while in play.
    pub turn: Option<PlayerId>,
    pub result: Option<GameResult>,
}

struct Inner {
    board: Vec<Vec<u32>>,
    slots: [Option<PlayerId>; 2],
    state: SessionState,
    turn: Slot,
    result: Option<GameResult>,
    /// Set by seating (first game) or a replay request (later games);
    /// a start consumes both flags.
    ready: [bool; 2],
    move_count: usize,
    /// Seat that opens the next game; flipped on every start so replays
    /// alternate the first move.
    next_starter: Slot,
}

/// A two-player board game session.
pub struct GameSession {
    id: GameId,
    board_size: usize,
    rule: Box<dyn WinRule>,
    inner: Mutex<Inner>,
}

impl GameSession {
    pub fn new(id: GameId, board_size: usize, rule: Box<dyn WinRule>) -> Self {
        Self {
            id,
            board_size,
            rule,
            inner: Mutex::new(Inner {
                board: vec![vec![0; board_size]; board_size],
                slots: [None, None],
                state: SessionState::Waiting,
                turn: Slot::One,
                result: None,
                ready: [false, false],
                move_count: 0,
                next_starter: Slot::One,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    /// Seats a player in the first empty slot and marks them ready.
    ///
    /// Idempotent for a player already seated.
    ///
    /// # Errors
    /// [`GameError::AlreadyStarted`] once the session has left the
    /// waiting state, [`GameError::SessionFull`] when both seats are
    /// taken by others.
    pub fn join(&self, player: PlayerId) -> Result<Slot, GameError> {
        let mut inner = self.lock();
        if let Some(slot) = seat_of(&inner, player) {
            return Ok(slot);
        }
        if inner.state != SessionState::Waiting {
            return Err(GameError::AlreadyStarted);
        }
        for slot in [Slot::One, Slot::Two] {
            if inner.slots[slot.index()].is_none() {
                inner.slots[slot.index()] = Some(player);
                inner.ready[slot.index()] = true;
                return Ok(slot);
            }
        }
        Err(GameError::SessionFull)
    }

    /// Both seats taken?
    pub fn is_full(&self) -> bool {
        self.lock().slots.iter().all(Option::is_some)
    }

    /// Starts a game: consumes both ready flags, clears the board and
    /// the result, and puts the starter seat on turn. Alternates the
    /// starter across starts of the same session.
    ///
    /// Returns the player opening the game.
    ///
    /// # Errors
    /// [`GameError::NotFull`] with an empty seat,
    /// [`GameError::NotReady`] before both players are ready,
    /// [`GameError::AlreadyStarted`] while a game is running.
    pub fn start(&self) -> Result<PlayerId, GameError> {
        let mut inner = self.lock();
        if inner.state == SessionState::InPlay {
            return Err(GameError::AlreadyStarted);
        }
        if inner.slots.iter().any(Option::is_none) {
            return Err(GameError::NotFull);
        }
        if !inner.ready.iter().all(|&r| r) {
            return Err(GameError::NotReady);
        }

        let n = self.board_size;
        inner.board = vec![vec![0; n]; n];
        inner.move_count = 0;
        inner.result = None;
        inner.ready = [false, false];
        inner.state = SessionState::InPlay;
        inner.turn = inner.next_starter;
        inner.next_starter = inner.next_starter.other();

        let starter = inner.slots[inner.turn.index()].ok_or(GameError::NotFull)?;
        tracing::debug!(game_id = %self.id, %starter, "game started");
        Ok(starter)
    }

    /// Applies one move for `player` at (`row`, `col`).
    ///
    /// The win check runs before the draw check, so a winning final
    /// move is a win, not a draw.
    pub fn apply_move(
        &self,
        player: PlayerId,
        row: usize,
        col: usize,
    ) -> Result<MoveOutcome, GameError> {
        let mut inner = self.lock();
        if inner.state != SessionState::InPlay {
            return Err(GameError::NotInPlay);
        }
        let slot = seat_of(&inner, player).ok_or(GameError::NotInSession)?;
        if slot != inner.turn {
            return Err(GameError::NotYourTurn);
        }
        if row >= self.board_size || col >= self.board_size {
            return Err(GameError::OutOfBounds);
        }
        if inner.board[row][col] != 0 {
            return Err(GameError::CellOccupied);
        }

        inner.board[row][col] = player.0;
        inner.move_count += 1;

        if self.rule.is_win(&inner.board, player.0) {
            inner.state = SessionState::Over;
            inner.result = Some(GameResult::Win(player));
            return Ok(MoveOutcome::Over(GameResult::Win(player)));
        }
        if inner.move_count == self.board_size * self.board_size {
            inner.state = SessionState::Over;
            inner.result = Some(GameResult::Draw);
            return Ok(MoveOutcome::Over(GameResult::Draw));
        }

        inner.turn = slot.other();
        let next = inner.slots[inner.turn.index()].ok_or(GameError::NotInSession)?;
        Ok(MoveOutcome::Continue { next })
    }

    /// Marks the caller ready for a replay. Returns `true` once both
    /// seated players are ready, at which point the caller starts the
    /// next game.
    ///
    /// # Errors
    /// [`GameError::NotOver`] unless the last game has ended,
    /// [`GameError::NotInSession`] for an unseated player.
    pub fn play_again(&self, player: PlayerId) -> Result<bool, GameError> {
        let mut inner = self.lock();
        if inner.state != SessionState::Over {
            return Err(GameError::NotOver);
        }
        let slot = seat_of(&inner, player).ok_or(GameError::NotInSession)?;
        inner.ready[slot.index()] = true;
        Ok(inner.ready.iter().all(|&r| r) && inner.slots.iter().all(Option::is_some))
    }

    /// Vacates a player's seat and clears their ready flag.
    pub fn remove_player(&self, player: PlayerId) -> Option<Slot> {
        let mut inner = self.lock();
        let slot = seat_of(&inner, player)?;
        inner.slots[slot.index()] = None;
        inner.ready[slot.index()] = false;
        Some(slot)
    }

    pub fn slot_of(&self, player: PlayerId) -> Option<Slot> {
        seat_of(&self.lock(), player)
    }

    /// The other seated player, if any.
    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        let inner = self.lock();
        let slot = seat_of(&inner, player)?;
        inner.slots[slot.other().index()]
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// The player on turn, while a game is running.
    pub fn turn_player(&self) -> Option<PlayerId> {
        let inner = self.lock();
        if inner.state != SessionState::InPlay {
            return None;
        }
        inner.slots[inner.turn.index()]
    }

    pub fn result(&self) -> Option<GameResult> {
        self.lock().result
    }

    /// The winner of the last game, if it ended in a win.
    pub fn winner(&self) -> Option<PlayerId> {
        match self.lock().result {
            Some(GameResult::Win(winner)) => Some(winner),
            _ => None,
        }
    }

    /// Renders the board as wire text: cells hold `0` (empty), `1`
    /// (seat one), `2` (seat two); columns are joined with `|`, rows
    /// with `--`.
    pub fn render_board(&self) -> String {
        render(&self.lock())
    }

    /// Takes a consistent snapshot for the reconnection handshake.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        let turn = match inner.state {
            SessionState::InPlay => inner.slots[inner.turn.index()],
            _ => None,
        };
        Snapshot {
            state: inner.state,
            board: render(&inner),
            turn,
            result: inner.result,
        }
    }
}

fn seat_of(inner: &Inner, player: PlayerId) -> Option<Slot> {
    [Slot::One, Slot::Two]
        .into_iter()
        .find(|slot| inner.slots[slot.index()] == Some(player))
}

fn render(inner: &Inner) -> String {
    let occupant_of = |cell: u32| {
        [Slot::One, Slot::Two]
            .into_iter()
            .find(|slot| inner.slots[slot.index()] == Some(PlayerId(cell)))
            .map_or(0, Slot::occupant)
    };
    inner
        .board
        .iter()
        .map(|row| {
            row.iter()
                .map(|&cell| occupant_of(cell).to_string())
                .collect::<Vec<_>>()
                .join(&COL_SEP.to_string())
        })
        .collect::<Vec<_>>()
        .join(ROW_SEP)
}

// =========================================================================
// Tests
// =========================================================================
