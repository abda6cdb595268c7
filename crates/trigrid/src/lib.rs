//! The Trigrid server: accept loop, per-connection dispatcher, liveness
//! watchdogs, and configuration.
//!
//! The crate wires the protocol, session, and game layers together:
//! every accepted TCP connection gets a dispatcher task (and a writer
//! task) in [`handler`], shared state lives in [`server::ServerState`],
//! and each logged-in player is shadowed by the watchdog pair in
//! [`liveness`].

mod connection;
mod handler;
mod liveness;

pub mod config;
pub mod error;
pub mod server;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::Server;
