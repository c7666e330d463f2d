//! Relay router
//!
//! Applies inbound events to the peer registry and fans out the resulting
//! outbound events. Each event takes the registry lock once: mutations are
//! applied first, then every outbound event is computed from the new state
//! and queued before the lock is released, so each recipient sees snapshots
//! in the same order the mutations happened.
//!
//! Nothing here fails loudly. Unknown targets, self-targets and ungrouped
//! targets drop the event with a debug log; dead recipients surface later
//! through their own disconnect.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::protocol::{InboundEvent, OutboundEvent, StatusUpdate, VideoAction};
use crate::registry::{Peer, PeerId, PeerRegistry, PeerSummary, RegistryError};
use crate::session::PeerHandle;
use crate::stats::RelayStats;

use super::config::ServerConfig;

type Deliveries = Vec<(PeerHandle, OutboundEvent)>;

/// Routes events between connected peers
pub struct Router {
    registry: RwLock<PeerRegistry>,
    config: ServerConfig,
    stats: Arc<RelayStats>,
}

impl Router {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_stats(config, Arc::new(RelayStats::new()))
    }

    pub fn with_stats(config: ServerConfig, stats: Arc<RelayStats>) -> Self {
        Self {
            registry: RwLock::new(PeerRegistry::with_id_length(config.id_length)),
            config,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Number of connected peers
    pub async fn peer_count(&self) -> usize {
        self.registry.read().await.peer_count()
    }

    /// Current group snapshot for `id`
    pub async fn snapshot(&self, id: &PeerId) -> Vec<PeerSummary> {
        self.registry.read().await.snapshot(id.as_str())
    }

    /// Register a new connection
    ///
    /// The connection receives its `connect-success` and a first
    /// `update-peers` containing only itself.
    pub async fn connect(&self, handle: PeerHandle) -> PeerId {
        let mut registry = self.registry.write().await;
        let id = registry.connect(handle.clone());

        let deliveries = vec![
            (handle.clone(), OutboundEvent::ConnectSuccess { id: id.clone() }),
            (handle.clone(), OutboundEvent::UpdatePeers(registry.snapshot(id.as_str()))),
        ];
        self.deliver(deliveries);

        tracing::info!(
            peer = %id,
            session_id = handle.session_id(),
            peers = registry.peer_count(),
            "Peer connected"
        );

        id
    }

    /// Handle one event from `sender`
    pub async fn dispatch(&self, sender: &PeerId, event: InboundEvent) {
        self.stats.event_received();
        let name = event.name();

        let result = match event {
            InboundEvent::SetName { name } => self.set_name(sender, name).await,
            InboundEvent::UpdateStatus(status) => self.update_status(sender, status).await,
            InboundEvent::ConnectPeer(target) => self.connect_peer(sender, target.id()).await,
            InboundEvent::Offer { to, signal, name } => {
                self.relay_signal(sender, &to, |from| OutboundEvent::Offer {
                    from: from.id.clone(),
                    signal,
                    name: display_name(from, name),
                })
                .await
            }
            InboundEvent::Answer { to, signal } => {
                self.relay_signal(sender, &to, |from| OutboundEvent::Answer {
                    from: from.id.clone(),
                    signal,
                })
                .await
            }
            InboundEvent::SendMessage { to, msg, name } => {
                self.relay(sender, &to, |from| OutboundEvent::ReceiveMessage {
                    from: from.id.clone(),
                    from_name: display_name(from, name).unwrap_or_default(),
                    msg,
                })
                .await
            }
            InboundEvent::SendVideo {
                to,
                url,
                action,
                time,
            } => self.send_video(sender, &to, url, action, time).await,
            InboundEvent::RemovePeer { id } => self.remove_peer(sender, &id).await,
            InboundEvent::Leave => self.leave(sender).await,
        };

        if let Err(e) = result {
            self.stats.event_dropped();
            tracing::debug!(peer = %sender, event = name, reason = %e, "Event dropped");
        }
    }

    /// Remove `id` and tell its former group members
    ///
    /// Safe to call more than once; later calls do nothing.
    pub async fn disconnect(&self, id: &PeerId) {
        let mut registry = self.registry.write().await;
        let Some(removed) = registry.remove(id.as_str()) else {
            tracing::trace!(peer = %id, "Disconnect for unknown peer ignored");
            return;
        };

        let mut deliveries = Deliveries::new();
        for member in &removed.former_group {
            if let Some(peer) = registry.get(member.as_str()) {
                deliveries.push((peer.handle.clone(), OutboundEvent::PeerLeft { id: id.clone() }));
                deliveries.extend(snapshot_delivery(&registry, member));
            }
        }
        self.deliver(deliveries);

        tracing::info!(
            peer = %id,
            session_id = removed.peer.handle.session_id(),
            connected_secs = removed.peer.connected_at.elapsed().as_secs(),
            notified = removed.former_group.len(),
            peers = registry.peer_count(),
            "Peer disconnected"
        );
    }

    async fn set_name(&self, sender: &PeerId, name: String) -> Result<(), RegistryError> {
        let mut registry = self.registry.write().await;
        if !registry.set_name(sender.as_str(), name) {
            return Err(RegistryError::PeerNotFound(sender.clone()));
        }

        let mut deliveries = peer_updated(&registry, sender)?;
        deliveries.extend(snapshot_delivery(&registry, sender));
        self.deliver(deliveries);
        Ok(())
    }

    async fn update_status(&self, sender: &PeerId, status: StatusUpdate) -> Result<(), RegistryError> {
        let mut registry = self.registry.write().await;
        if !registry.set_status(sender.as_str(), status.cam_on, status.mic_on) {
            return Err(RegistryError::PeerNotFound(sender.clone()));
        }

        let deliveries = peer_updated(&registry, sender)?;
        self.deliver(deliveries);
        Ok(())
    }

    async fn connect_peer(&self, sender: &PeerId, target: &PeerId) -> Result<(), RegistryError> {
        let mut registry = self.registry.write().await;
        let changed = registry.join(sender, target)?;

        let mut deliveries = Deliveries::new();
        deliveries.extend(snapshot_delivery(&registry, sender));
        deliveries.extend(snapshot_delivery(&registry, target));
        self.deliver(deliveries);

        tracing::debug!(peer = %sender, target = %target, changed, "Peers grouped");
        Ok(())
    }

    /// Offer/answer: like `relay`, but never to the sender itself
    async fn relay_signal(
        &self,
        sender: &PeerId,
        to: &PeerId,
        build: impl FnOnce(&Peer) -> OutboundEvent,
    ) -> Result<(), RegistryError> {
        if sender == to {
            return Err(RegistryError::SelfTarget);
        }
        self.relay(sender, to, build).await
    }

    /// Forward one event from `sender` to `to`
    async fn relay(
        &self,
        sender: &PeerId,
        to: &PeerId,
        build: impl FnOnce(&Peer) -> OutboundEvent,
    ) -> Result<(), RegistryError> {
        let registry = self.registry.read().await;
        let from = registry.require(sender)?;
        let target = registry.target(sender, to, self.config.enforce_group_scope)?;

        self.deliver(vec![(target.handle.clone(), build(from))]);
        Ok(())
    }

    async fn send_video(
        &self,
        sender: &PeerId,
        to: &PeerId,
        url: Option<String>,
        action: Option<VideoAction>,
        time: Option<f64>,
    ) -> Result<(), RegistryError> {
        self.relay(sender, to, |_| OutboundEvent::ReceiveVideo { url, action, time })
            .await
    }

    async fn remove_peer(&self, sender: &PeerId, id: &PeerId) -> Result<(), RegistryError> {
        let mut registry = self.registry.write().await;
        registry.require(sender)?;
        registry.leave(sender, id)?;

        let mut deliveries = Deliveries::new();
        deliveries.extend(snapshot_delivery(&registry, sender));
        deliveries.extend(snapshot_delivery(&registry, id));

        if let Some(removed) = registry.get(id.as_str()) {
            let handle = removed.handle.clone();
            deliveries.push((handle.clone(), OutboundEvent::RemovePeer { id: id.clone() }));

            if self.config.close_removed_peers {
                let grace = self.config.removal_grace;
                let task = tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    handle.close();
                });
                registry.set_pending_close(id.as_str(), task.abort_handle());
            }
        }
        self.deliver(deliveries);

        tracing::debug!(peer = %sender, removed = %id, "Peer removed from group");
        Ok(())
    }

    async fn leave(&self, sender: &PeerId) -> Result<(), RegistryError> {
        let registry = self.registry.read().await;
        registry.require(sender)?.handle.close();
        Ok(())
    }

    fn deliver(&self, deliveries: Deliveries) {
        for (handle, event) in deliveries {
            let name = event.name();
            let delivered = handle.send(event);
            self.stats.delivery(delivered);

            tracing::trace!(
                session_id = handle.session_id(),
                event = name,
                delivered,
                "Outbound event"
            );
        }
    }
}

/// Registered display name, falling back to the client-supplied hint
fn display_name(from: &Peer, hint: Option<String>) -> Option<String> {
    if from.name.is_empty() {
        hint
    } else {
        Some(from.name.clone())
    }
}

/// `update-peers` for `id`, if it is still connected
fn snapshot_delivery(registry: &PeerRegistry, id: &PeerId) -> Option<(PeerHandle, OutboundEvent)> {
    registry.get(id.as_str()).map(|peer| {
        (
            peer.handle.clone(),
            OutboundEvent::UpdatePeers(registry.snapshot(id.as_str())),
        )
    })
}

/// `peer-updated` for `id` to every member of its group, `id` included
fn peer_updated(registry: &PeerRegistry, id: &PeerId) -> Result<Deliveries, RegistryError> {
    let summary = registry.require(id)?.summary();
    Ok(registry
        .group_members(id.as_str())
        .map(|member| {
            (
                member.handle.clone(),
                OutboundEvent::PeerUpdated(summary.clone()),
            )
        })
        .collect())
}
