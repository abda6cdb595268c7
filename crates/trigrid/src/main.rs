//! Server binary: tracing init, config load, bind, run.

use std::path::PathBuf;

use trigrid::{Server, ServerConfig, ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Config file: TRIGRID_CONFIG env var, then the first CLI argument,
    // then built-in defaults.
    let config_path = std::env::var_os("TRIGRID_CONFIG")
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from));
    let config = match config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            ServerConfig::from_file(path)?
        }
        None => ServerConfig::default(),
    };

    let server = Server::bind(config).await?;
    server.run().await
}
