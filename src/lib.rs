//! WebSocket signaling relay
//!
//! Browser clients connect over WebSocket, receive a short random peer ID
//! and form ad-hoc groups. The relay forwards offers, answers, chat text and
//! playback-sync events between group members and keeps every member's view
//! of its group current. It never carries media.
//!
//! # Example
//!
//! ```no_run
//! use signal_relay::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> signal_relay::Result<()> {
//!     let server = RelayServer::new(ServerConfig::default());
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use protocol::{InboundEvent, OutboundEvent};
pub use registry::{PeerId, PeerSummary};
pub use server::{RelayServer, Router, ServerConfig};
pub use stats::{RelayStats, StatsSnapshot};
