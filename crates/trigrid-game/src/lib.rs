//! Game logic for Trigrid: sessions, win rules, and the matchmaker.
//!
//! A [`GameSession`] is one board shared by up to two players, with its
//! own lock and a small state machine (waiting, in play, over). The
//! [`GameRegistry`] owns every live session, keyed by stable
//! [`GameId`](trigrid_protocol::GameId), and doubles as the matchmaker:
//! a joining player is seated in a waiting session or a fresh one.
//!
//! Win detection sits behind the [`WinRule`] trait so the board size and
//! the rule can vary independently; [`LineWin`] is the standard
//! full-row/column/diagonal rule.

mod error;
mod registry;
mod rules;
mod session;

pub use error::GameError;
pub use registry::GameRegistry;
pub use rules::{LineWin, WinRule};
pub use session::{GameResult, GameSession, MoveOutcome, SessionState, Slot, Snapshot};
