//! Connection handle
//!
//! A `PeerHandle` is the registry's owned reference to one client connection.
//! Sending never blocks: events go into a bounded queue drained by the
//! connection task. A full queue means the client stopped reading; the
//! connection is then dropped without flushing.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;

use crate::protocol::OutboundEvent;

/// Sending side of a connection, stored in the peer registry
#[derive(Debug, Clone)]
pub struct PeerHandle {
    session_id: u64,
    tx: mpsc::Sender<OutboundEvent>,
    close: Arc<Notify>,
    stalled: Arc<Notify>,
}

/// Receiving side of a connection, owned by the connection task
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::Receiver<OutboundEvent>,
    close: Arc<Notify>,
    stalled: Arc<Notify>,
}

/// What the connection task has to do next
#[derive(Debug, PartialEq)]
pub enum Outbox {
    /// Write this event to the socket
    Event(OutboundEvent),
    /// Flush whatever is still queued, then close
    Close,
    /// The client stopped reading; drop the connection now
    Abort,
}

impl PeerHandle {
    /// Create a handle and its mailbox with the given queue depth
    pub fn channel(session_id: u64, capacity: usize) -> (PeerHandle, Mailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let close = Arc::new(Notify::new());
        let stalled = Arc::new(Notify::new());

        let handle = PeerHandle {
            session_id,
            tx,
            close: Arc::clone(&close),
            stalled: Arc::clone(&stalled),
        };

        (handle, Mailbox { rx, close, stalled })
    }

    /// Session ID of the owning connection
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Queue an event for delivery
    ///
    /// Returns `false` if the event was dropped. A full queue also aborts
    /// the connection; the normal disconnect path then removes the peer.
    pub fn send(&self, event: OutboundEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    session_id = self.session_id,
                    event = event.name(),
                    "Outbound queue full, dropping stalled connection"
                );
                self.stalled.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Ask the connection task to flush its queue and close the socket
    pub fn close(&self) {
        self.close.notify_one();
    }
}

impl Mailbox {
    /// Wait for the next queued event
    #[cfg(test)]
    pub(crate) async fn recv(&mut self) -> Option<OutboundEvent> {
        self.rx.recv().await
    }

    /// Take an already queued event without waiting
    pub fn try_recv(&mut self) -> Option<OutboundEvent> {
        self.rx.try_recv().ok()
    }

    /// Resolve once a close has been requested through any handle clone
    #[cfg(test)]
    pub(crate) async fn close_requested(&self) {
        self.close.notified().await;
    }

    /// Wait for the next event, close request or stall
    ///
    /// A stall wins over everything. Queued events win over a pending
    /// close, so everything sent before `close()` is handed out first.
    pub async fn next(&mut self) -> Outbox {
        tokio::select! {
            biased;
            _ = self.stalled.notified() => Outbox::Abort,
            event = self.rx.recv() => event.map_or(Outbox::Close, Outbox::Event),
            _ = self.close.notified() => Outbox::Close,
        }
    }

    /// Resolve once the queue has overflowed
    pub async fn stalled(&self) {
        self.stalled.notified().await;
    }

    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}
