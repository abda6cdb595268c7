//! The server: shared state and the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use trigrid_game::GameRegistry;
use trigrid_session::PlayerRegistry;

use crate::{ServerConfig, ServerError, handler};

/// State shared by every connection task and watchdog.
pub(crate) struct ServerState {
    pub(crate) config: ServerConfig,
    pub(crate) players: PlayerRegistry,
    pub(crate) games: GameRegistry,
}

/// A bound Trigrid server, ready to accept connections.
pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl Server {
    /// Validates the configuration and binds the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(&config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "server listening");

        let state = Arc::new(ServerState {
            players: PlayerRegistry::new(config.max_clients),
            games: GameRegistry::new(config.board_size),
            config,
        });
        Ok(Self { listener, state })
    }

    /// The address actually bound, for callers that bound port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, one dispatcher task per connection.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "accepted connection");
                    let state = Arc::clone(&self.state);
                    tokio::spawn(handler::handle_connection(stream, state));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
