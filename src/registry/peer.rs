//! Peer identity and record types

use std::borrow::Borrow;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;

use crate::session::PeerHandle;

/// Short identifier assigned to a connection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for PeerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One live connection in the registry
#[derive(Debug)]
pub struct Peer {
    /// Assigned identifier
    pub id: PeerId,

    /// Connection this peer is reachable on
    pub handle: PeerHandle,

    /// Display name, empty until the client sets one
    pub name: String,

    pub cam_on: bool,
    pub mic_on: bool,

    /// When the peer was registered
    pub connected_at: Instant,

    /// Deferred forced close scheduled after a `remove-peer`
    pub(super) pending_close: Option<AbortHandle>,
}

impl Peer {
    pub(super) fn new(id: PeerId, handle: PeerHandle) -> Self {
        Self {
            id,
            handle,
            name: String::new(),
            cam_on: false,
            mic_on: false,
            connected_at: Instant::now(),
            pending_close: None,
        }
    }

    /// Public view of this peer
    pub fn summary(&self) -> PeerSummary {
        PeerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            cam_on: self.cam_on,
            mic_on: self.mic_on,
        }
    }

    /// Cancel any scheduled forced close
    pub(super) fn cancel_pending_close(&mut self) {
        if let Some(task) = self.pending_close.take() {
            task.abort();
        }
    }
}

/// Peer entry in `update-peers` and `peer-updated` events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    pub id: PeerId,
    pub name: String,
    pub cam_on: bool,
    pub mic_on: bool,
}
