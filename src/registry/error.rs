//! Registry error types
//!
//! These describe why a targeted operation was refused. The router treats
//! every one of them as "drop the event"; none is fatal.

use super::peer::PeerId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Referenced peer is not connected
    PeerNotFound(PeerId),
    /// Identifier is already registered
    IdInUse(PeerId),
    /// Operation targets the sender itself
    SelfTarget,
    /// Target is not in the sender's group
    NotGrouped { peer: PeerId, target: PeerId },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::PeerNotFound(id) => write!(f, "Peer not found: {}", id),
            RegistryError::IdInUse(id) => write!(f, "Peer ID already in use: {}", id),
            RegistryError::SelfTarget => write!(f, "Peer cannot target itself"),
            RegistryError::NotGrouped { peer, target } => {
                write!(f, "Peer {} is not grouped with {}", peer, target)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
