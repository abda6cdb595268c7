//! Error types for game sessions and the matchmaker.
//!
//! The display strings double as the reason text sent back to clients,
//! so they stay short and lowercase.

/// Errors from game session operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
    /// Both seats are taken.
    #[error("game is full")]
    SessionFull,

    /// The session is already in play.
    #[error("game already in progress")]
    AlreadyStarted,

    /// A start was requested with an empty seat.
    #[error("game is not full")]
    NotFull,

    /// A start was requested before both players were ready.
    #[error("players not ready")]
    NotReady,

    /// A move arrived while the session was not in play.
    #[error("game not in play state")]
    NotInPlay,

    /// A replay was requested before the game ended.
    #[error("game is not over")]
    NotOver,

    /// The acting player holds no seat in this session.
    #[error("player not in this game")]
    NotInSession,

    /// A move arrived out of turn.
    #[error("not your turn")]
    NotYourTurn,

    /// The move coordinates fall outside the board.
    #[error("move out of bounds")]
    OutOfBounds,

    /// The targeted cell is already taken.
    #[error("field already occupied")]
    CellOccupied,
}
