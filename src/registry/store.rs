//! Peer registry implementation
//!
//! Owns every `Peer` record together with the group index. The two are one
//! value on purpose: callers lock the whole registry once per event, so the
//! group symmetry can never be observed half-updated.

use std::collections::HashMap;

use tokio::task::AbortHandle;

use crate::protocol::constants::DEFAULT_ID_LENGTH;
use crate::session::PeerHandle;

use super::error::RegistryError;
use super::group::GroupIndex;
use super::id::IdAllocator;
use super::peer::{Peer, PeerId, PeerSummary};

/// A peer taken out of the registry
#[derive(Debug)]
pub struct RemovedPeer {
    pub peer: Peer,
    /// Peers that had the removed peer in their group
    pub former_group: Vec<PeerId>,
}

/// Registry of connected peers and their groups
#[derive(Debug)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, Peer>,
    groups: GroupIndex,
    ids: IdAllocator,
}

impl PeerRegistry {
    /// Create a registry with the default identifier length
    pub fn new() -> Self {
        Self::with_id_length(DEFAULT_ID_LENGTH)
    }

    pub fn with_id_length(length: usize) -> Self {
        Self {
            peers: HashMap::new(),
            groups: GroupIndex::new(),
            ids: IdAllocator::new(length),
        }
    }

    /// Pick an identifier not used by any connected peer
    pub fn allocate_id(&self) -> PeerId {
        self.ids.allocate(|candidate| self.peers.contains_key(candidate))
    }

    /// Insert a peer with default fields and a singleton group
    pub fn register(&mut self, id: PeerId, handle: PeerHandle) -> Result<&Peer, RegistryError> {
        if self.peers.contains_key(&id) {
            return Err(RegistryError::IdInUse(id));
        }
        Ok(self.insert(id, handle))
    }

    /// Allocate an identifier and register the connection under it
    pub fn connect(&mut self, handle: PeerHandle) -> PeerId {
        let id = self.allocate_id();
        self.insert(id, handle).id.clone()
    }

    fn insert(&mut self, id: PeerId, handle: PeerHandle) -> &Peer {
        self.groups.create_singleton(&id);
        let peer = self
            .peers
            .entry(id.clone())
            .or_insert_with(|| Peer::new(id, handle));

        tracing::debug!(
            peer = %peer.id,
            session_id = peer.handle.session_id(),
            "Peer registered"
        );

        peer
    }

    pub fn get(&self, id: &str) -> Option<&Peer> {
        self.peers.get(id)
    }

    /// Like `get`, but a missing peer is a `PeerNotFound` error
    pub fn require(&self, id: &PeerId) -> Result<&Peer, RegistryError> {
        self.peers
            .get(id)
            .ok_or_else(|| RegistryError::PeerNotFound(id.clone()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peers.contains_key(id)
    }

    /// Set the display name; returns `false` if the peer is gone
    pub fn set_name(&mut self, id: &str, name: impl Into<String>) -> bool {
        match self.peers.get_mut(id) {
            Some(peer) => {
                peer.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Replace both status flags; returns `false` if the peer is gone
    pub fn set_status(&mut self, id: &str, cam_on: bool, mic_on: bool) -> bool {
        match self.peers.get_mut(id) {
            Some(peer) => {
                peer.cam_on = cam_on;
                peer.mic_on = mic_on;
                true
            }
            None => false,
        }
    }

    /// Remove a peer and purge it from every group
    ///
    /// Returns `None` if the peer was already removed.
    pub fn remove(&mut self, id: &str) -> Option<RemovedPeer> {
        let (id, mut peer) = self.peers.remove_entry(id)?;
        peer.cancel_pending_close();
        let former_group = self.groups.purge(&id);

        tracing::debug!(
            peer = %id,
            former_group = former_group.len(),
            "Peer removed"
        );

        Some(RemovedPeer { peer, former_group })
    }

    /// Group `a` with `b`
    ///
    /// Returns whether anything changed; re-joining a grouped pair is `Ok(false)`.
    pub fn join(&mut self, a: &PeerId, b: &PeerId) -> Result<bool, RegistryError> {
        if a == b {
            return Err(RegistryError::SelfTarget);
        }
        for id in [a, b] {
            if !self.contains(id.as_str()) {
                return Err(RegistryError::PeerNotFound(id.clone()));
            }
        }

        Ok(self.groups.link(a, b))
    }

    /// Separate `a` from `b`, which must be in `a`'s group
    pub fn leave(&mut self, a: &PeerId, b: &PeerId) -> Result<(), RegistryError> {
        if a == b {
            return Err(RegistryError::SelfTarget);
        }
        if !self.groups.unlink(a, b) {
            return Err(RegistryError::NotGrouped {
                peer: a.clone(),
                target: b.clone(),
            });
        }
        Ok(())
    }

    /// Whether `b` is in `a`'s group
    pub fn is_grouped(&self, a: &str, b: &str) -> bool {
        self.groups.is_grouped(a, b)
    }

    /// Resolve the recipient of a relayed message
    ///
    /// With `scoped`, the target must also be in the sender's group.
    pub fn target(&self, sender: &PeerId, to: &PeerId, scoped: bool) -> Result<&Peer, RegistryError> {
        let peer = self
            .peers
            .get(to)
            .ok_or_else(|| RegistryError::PeerNotFound(to.clone()))?;

        if scoped && !self.groups.is_grouped(sender.as_str(), to.as_str()) {
            return Err(RegistryError::NotGrouped {
                peer: sender.clone(),
                target: to.clone(),
            });
        }

        Ok(peer)
    }

    /// Connected members of `id`'s group, `id` included
    pub fn group_members(&self, id: &str) -> impl Iterator<Item = &Peer> + '_ {
        self.groups
            .members(id)
            .filter_map(move |member| self.peers.get(member))
    }

    /// Summaries of `id`'s group, ordered by ID
    ///
    /// Members that are no longer registered are left out.
    pub fn snapshot(&self, id: &str) -> Vec<PeerSummary> {
        self.group_members(id).map(Peer::summary).collect()
    }

    /// Remember the deferred close task for `id`, replacing any earlier one
    ///
    /// If the peer is already gone the task is aborted immediately.
    pub fn set_pending_close(&mut self, id: &str, task: AbortHandle) {
        match self.peers.get_mut(id) {
            Some(peer) => {
                peer.cancel_pending_close();
                peer.pending_close = Some(task);
            }
            None => task.abort(),
        }
    }

    /// Number of connected peers
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
