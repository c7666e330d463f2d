//! Session state machine
//!
//! Tracks one client connection from TCP accept to close.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::registry::PeerId;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP accepted, WebSocket upgrade in progress
    Handshaking,
    /// Registered in the relay with a peer ID
    Active,
    /// Flushing queued events before closing
    Closing,
    /// Socket closed and peer removed
    Closed,
}

/// Per-connection state owned by the connection task
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Relay identity, assigned once the session becomes active
    pub peer_id: Option<PeerId>,

    /// Connection start time
    pub connected_at: Instant,

    /// Text frames received
    pub frames_received: u64,

    /// Text frames sent
    pub frames_sent: u64,

    /// Frames that failed to decode
    pub malformed_frames: u64,
}

impl SessionState {
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Handshaking,
            connected_at: Instant::now(),
            peer_id: None,
            frames_received: 0,
            frames_sent: 0,
            malformed_frames: 0,
        }
    }

    /// Handshake done and identity assigned
    pub fn activate(&mut self, peer_id: PeerId) {
        if self.phase == SessionPhase::Handshaking {
            self.peer_id = Some(peer_id);
            self.phase = SessionPhase::Active;
        }
    }

    /// Start closing the session
    pub fn close(&mut self) {
        if matches!(self.phase, SessionPhase::Handshaking | SessionPhase::Active) {
            self.phase = SessionPhase::Closing;
        }
    }

    /// Mark the session fully closed
    pub fn finish(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000)
    }

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new(1, addr());
        assert_eq!(state.phase, SessionPhase::Handshaking);
        assert!(state.peer_id.is_none());

        state.activate(PeerId::from("AB12C"));
        assert!(state.is_active());
        assert_eq!(state.peer_id.as_ref().map(|p| p.as_str()), Some("AB12C"));

        state.close();
        assert_eq!(state.phase, SessionPhase::Closing);

        state.finish();
        assert_eq!(state.phase, SessionPhase::Closed);
    }

    #[test]
    fn test_activate_only_once() {
        let mut state = SessionState::new(1, addr());
        state.activate(PeerId::from("AAAAA"));
        state.activate(PeerId::from("BBBBB"));

        assert_eq!(state.peer_id, Some(PeerId::from("AAAAA")));
    }

    #[test]
    fn test_close_after_finish_is_ignored() {
        let mut state = SessionState::new(1, addr());
        state.finish();
        state.close();

        assert_eq!(state.phase, SessionPhase::Closed);
    }
}
