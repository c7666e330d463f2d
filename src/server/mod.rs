//! Relay server
//!
//! `RelayServer` accepts sockets and spawns a `Connection` task for each;
//! every connection feeds decoded events into the shared `Router`.

pub mod config;
pub mod connection;
pub mod listener;
pub mod router;

pub use config::ServerConfig;
pub use connection::Connection;
pub use listener::RelayServer;
pub use router::Router;
