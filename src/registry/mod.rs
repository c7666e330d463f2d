//! Peer registry and group index
//!
//! The registry is the single source of truth for who is connected. Each
//! peer record owns the handle of its connection; the group index on the
//! side only stores IDs.
//!
//! # Architecture
//!
//! ```text
//!                  RwLock<PeerRegistry>
//!           ┌──────────────────────────────┐
//!           │ peers:  HashMap<PeerId, Peer>│──► PeerHandle ──► connection task
//!           │ groups: GroupIndex           │
//!           │   A ─ {A, B}                 │
//!           │   B ─ {A, B}                 │
//!           │   C ─ {C}                    │
//!           └──────────────────────────────┘
//! ```
//!
//! Every mutation of the group index goes through `link`, `unlink` or
//! `purge`, which always update both ends of a pair.

pub mod error;
pub mod group;
pub mod id;
pub mod peer;
pub mod store;

pub use error::RegistryError;
pub use group::GroupIndex;
pub use id::IdAllocator;
pub use peer::{Peer, PeerId, PeerSummary};
pub use store::{PeerRegistry, RemovedPeer};
