//! Player session management for Trigrid.
//!
//! This crate tracks who is logged in and how to reach them:
//!
//! 1. **Connection handles** ([`ConnectionHandle`]) — cheap-clone handles
//!    to a connection's writer task and close signal.
//! 2. **Player records** ([`Player`]) — identity, lobby/game status,
//!    liveness flag, ping clock, watchdog presence.
//! 3. **The registry** ([`PlayerRegistry`]) — the sole owner of the
//!    canonical records, with an encapsulated lock. Everything else holds
//!    only a [`PlayerId`](trigrid_protocol::PlayerId) and re-resolves it
//!    here on each access, so a concurrent relogin can never leave a task
//!    mutating a stale record.

mod connection;
mod error;
mod player;
mod registry;

pub use connection::{ConnectionHandle, ConnectionId};
pub use error::SessionError;
pub use player::{Player, PlayerStatus};
pub use registry::{Liveness, LoginOutcome, PlayerRegistry};
