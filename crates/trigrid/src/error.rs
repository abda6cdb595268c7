//! Top-level error type for the server crate.

use trigrid_game::GameError;
use trigrid_protocol::ProtocolError;
use trigrid_session::SessionError;

/// Any error the server can surface, wrapping the layer-specific enums.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The loaded configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}
