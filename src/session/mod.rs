//! Per-connection session types
//!
//! `SessionState` follows one socket through its lifecycle; `PeerHandle`
//! is what the registry keeps to reach it.

pub mod handle;
pub mod state;

pub use handle::{Mailbox, Outbox, PeerHandle};
pub use state::{SessionPhase, SessionState};
