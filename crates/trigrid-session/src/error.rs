//! Error types for the session layer.

use crate::ConnectionId;

/// Errors that can occur during player registry operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The registry already holds the maximum number of players.
    #[error("max number of players reached ({0})")]
    RegistryFull(usize),

    /// The connection's writer task is gone; the frame was not delivered.
    #[error("connection {0} is gone")]
    ConnectionGone(ConnectionId),
}
