//! Relay counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide relay counters
///
/// Updated with relaxed atomics from every connection task; a snapshot is
/// only approximately consistent across fields.
#[derive(Debug, Default)]
pub struct RelayStats {
    connections_accepted: AtomicU64,
    connections_rejected: AtomicU64,
    events_received: AtomicU64,
    events_relayed: AtomicU64,
    events_dropped: AtomicU64,
    malformed_frames: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one outbound delivery attempt
    pub fn delivery(&self, delivered: bool) {
        if delivered {
            self.events_relayed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an inbound event rejected by the router
    pub fn event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            events_relayed: self.events_relayed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `RelayStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// WebSocket connections that completed the handshake
    pub connections_accepted: u64,
    /// Sockets refused by the connection limit or a failed handshake
    pub connections_rejected: u64,
    /// Inbound events decoded
    pub events_received: u64,
    /// Outbound events queued to a recipient
    pub events_relayed: u64,
    /// Inbound events rejected plus outbound events that could not be queued
    pub events_dropped: u64,
    /// Text frames that did not decode to an event
    pub malformed_frames: u64,
}
