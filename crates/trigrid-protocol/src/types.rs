//! Identity newtypes, opcodes, and the decoded frame type.

use std::fmt;

use crate::ARG_SEP;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Assigned sequentially starting at 1 by the player registry; 0 is never
/// a valid id (absence is expressed with `Option<PlayerId>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A stable identifier for a game session.
///
/// Sessions are keyed by `GameId` in the game registry, never by their
/// transient position in a list, so removals cannot shift the identity
/// another task has already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

/// Operation codes carried in the frame header.
///
/// Codes 001–004, 006, 011, and 012 are client → server requests; 005,
/// 007, 010, and 013–015 are server → client notifications. 008/009 are
/// reserved and never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Log in under a display name (arg: name).
    Login = 1,
    /// Enter matchmaking (no args).
    Join = 2,
    /// Place a marker (args: `x;y`).
    Move = 3,
    /// Request a replay after game over (no args).
    PlayAgain = 4,
    /// Server → client: a game started (arg: opponent name).
    GameStarted = 5,
    /// Leave a finished game and return to the lobby (no args).
    ReturnToStart = 6,
    /// Server → client: game ended (arg: winner name or `Draw`).
    GameOver = 7,
    /// Reserved.
    Ok = 8,
    /// Reserved.
    Err = 9,
    /// Server → client: it is the recipient's turn (no args).
    YourTurn = 10,
    /// Liveness heartbeat (no args).
    Ping = 11,
    /// Request a state snapshot after reconnecting (no args).
    Recovery = 12,
    /// Server → client: the opponent lost liveness, hold on.
    Pause = 13,
    /// Server → client: the opponent recovered, resume play.
    Continue = 14,
    /// Server → client: informational text.
    Status = 15,
}

impl Opcode {
    /// Maps a raw header code to an opcode, `None` if unassigned.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => Self::Login,
            2 => Self::Join,
            3 => Self::Move,
            4 => Self::PlayAgain,
            5 => Self::GameStarted,
            6 => Self::ReturnToStart,
            7 => Self::GameOver,
            8 => Self::Ok,
            9 => Self::Err,
            10 => Self::YourTurn,
            11 => Self::Ping,
            12 => Self::Recovery,
            13 => Self::Pause,
            14 => Self::Continue,
            15 => Self::Status,
            _ => return None,
        })
    }

    /// Returns the numeric wire code.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One decoded wire frame.
///
/// The opcode is kept as the raw header code rather than an [`Opcode`] so
/// the dispatcher can echo unknown codes back in its rejection reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw opcode from the header.
    pub opcode: u16,
    /// Payload text, fields joined by [`ARG_SEP`].
    pub payload: String,
}

impl Frame {
    /// Splits the payload into argument fields.
    ///
    /// An empty payload yields a single empty field, matching how a
    /// no-argument request is encoded.
    pub fn args(&self) -> Vec<&str> {
        self.payload.split(ARG_SEP).collect()
    }
}
