//! Wire protocol for Trigrid.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`Opcode`], [`Frame`], [`PlayerId`], [`GameId`]) — the
//!   message structures and identities that travel on the wire.
//! - **Codec** ([`read_frame`], [`encode_request`], [`encode_ok`],
//!   [`encode_err`]) — how frames are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during framing.
//!
//! # Wire format
//!
//! Every frame is `MAGIC(6) | OPCODE(3 ASCII digits) | LEN(4 ASCII digits,
//! zero-padded decimal) | PAYLOAD(LEN bytes)`. The payload is UTF-8 text
//! with fields joined by [`ARG_SEP`]. Requests carry the bare payload;
//! responses prefix it with `ok`/`err` plus the separator.
//!
//! The protocol layer sits below everything else — it knows nothing about
//! players' lobby status, sessions, or liveness.

mod codec;
mod error;
mod types;

pub use codec::{encode_err, encode_ok, encode_request, read_frame};
pub use error::ProtocolError;
pub use types::{Frame, GameId, Opcode, PlayerId};

/// Magic tag that opens every frame.
pub const MAGIC: &[u8; 6] = b"KIVUPS";

/// Width of the opcode field, in ASCII digits.
pub const OPCODE_WIDTH: usize = 3;

/// Width of the payload-length field, in ASCII digits.
pub const LEN_WIDTH: usize = 4;

/// Total fixed header length: magic + opcode + length.
pub const HEADER_LEN: usize = MAGIC.len() + OPCODE_WIDTH + LEN_WIDTH;

/// Hard cap on an inbound frame's payload. Frames declaring more are
/// rejected before the payload read is attempted. Outbound frames are
/// bounded only by [`MAX_ENCODED_PAYLOAD_LEN`]; server responses can
/// legitimately exceed this cap.
pub const MAX_PAYLOAD_LEN: usize = 128;

/// Largest payload the four-digit length field can express.
pub const MAX_ENCODED_PAYLOAD_LEN: usize = 9_999;

/// Separator between payload fields.
pub const ARG_SEP: char = ';';

/// Leading response token for a successful operation.
pub const OK_TOKEN: &str = "ok";

/// Leading response token for a failed operation.
pub const ERR_TOKEN: &str = "err";

/// Reserved trailing field marking a failure that counts toward the
/// per-connection invalid-operation throttle.
pub const CRITICAL_MARKER: &str = "criticalerror";

/// Reserved payload word: a same-name login reattached an existing player.
pub const RECOVERY_LOGIN: &str = "recovery_login";

/// Reserved payload word: recovery snapshot — player is in the lobby.
pub const RECOVERY_IN_LOBBY: &str = "recovery_inlobby";

/// Reserved payload word: recovery snapshot — player is waiting for a game.
pub const RECOVERY_READY_FOR_GAME: &str = "recovery_readyforgame";

/// Reserved payload word: recovery snapshot — in game, it is the caller's turn.
pub const RECOVERY_IN_GAME_YOUR_TURN: &str = "recovery_ingame_yourturn";

/// Reserved payload word: recovery snapshot — in game, opponent's turn.
pub const RECOVERY_IN_GAME_OTHER_TURN: &str = "recovery_ingame_otherturn";

/// Reserved payload word: recovery snapshot — in game, game is over.
pub const RECOVERY_IN_GAME_GAME_OVER: &str = "recovery_ingame_gameover";

/// Reserved payload word: the caller's game session no longer exists.
pub const GAME_GONE: &str = "gamegone";
