//! Inbound and outbound relay events
//!
//! Every WebSocket text frame carries one event in a JSON envelope:
//!
//! ```text
//! {"event": "offer", "data": {"to": "K3Q9Z", "signal": {...}}}
//! ```
//!
//! The sender of an inbound event is always the connection it arrived on.
//! Payload fields that look like identity (`name` on offers and messages)
//! are display hints only.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::registry::{PeerId, PeerSummary};

/// Events sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum InboundEvent {
    /// Set the sender's display name
    SetName { name: String },

    /// Replace the sender's camera/microphone flags
    UpdateStatus(StatusUpdate),

    /// Join the sender's group with another peer
    ConnectPeer(PeerTarget),

    /// Session description offer for a group member
    Offer {
        to: PeerId,
        signal: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Session description answer for a group member
    Answer { to: PeerId, signal: Value },

    /// Chat text for a group member
    SendMessage {
        to: PeerId,
        msg: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Shared playback state for a group member
    SendVideo {
        to: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<VideoAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
    },

    /// Drop a peer from the sender's group
    RemovePeer { id: PeerId },

    /// Close the sender's own connection; any payload is ignored
    Leave,
}

impl InboundEvent {
    /// Wire name of the event, for logging
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::SetName { .. } => "set-name",
            InboundEvent::UpdateStatus(_) => "update-status",
            InboundEvent::ConnectPeer(_) => "connect-peer",
            InboundEvent::Offer { .. } => "offer",
            InboundEvent::Answer { .. } => "answer",
            InboundEvent::SendMessage { .. } => "send-message",
            InboundEvent::SendVideo { .. } => "send-video",
            InboundEvent::RemovePeer { .. } => "remove-peer",
            InboundEvent::Leave => "leave",
        }
    }
}

/// Full camera/microphone status; clients always resend both flags
///
/// Flags are read for truthiness, so `1`, `"yes"` or `null` are accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(deserialize_with = "truthy")]
    pub cam_on: bool,
    #[serde(deserialize_with = "truthy")]
    pub mic_on: bool,
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Target of `connect-peer`: `{"targetId": "..."}` or a bare string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeerTarget {
    Bare(PeerId),
    Object {
        #[serde(rename = "targetId")]
        target_id: PeerId,
    },
}

impl PeerTarget {
    /// The addressed peer
    pub fn id(&self) -> &PeerId {
        match self {
            PeerTarget::Bare(id) => id,
            PeerTarget::Object { target_id } => target_id,
        }
    }
}

/// Playback control action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoAction {
    Play,
    Pause,
    Seek,
}

/// Events sent by the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum OutboundEvent {
    /// Identity assigned to this connection
    ConnectSuccess { id: PeerId },

    /// Current membership snapshot of the recipient's group
    UpdatePeers(Vec<PeerSummary>),

    /// A group member changed name or status
    PeerUpdated(PeerSummary),

    /// A group member disconnected
    PeerLeft { id: PeerId },

    Offer {
        from: PeerId,
        signal: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    Answer { from: PeerId, signal: Value },

    ReceiveMessage {
        from: PeerId,
        #[serde(rename = "fromName")]
        from_name: String,
        msg: String,
    },

    ReceiveVideo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<VideoAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
    },

    /// The recipient was removed from a group; `id` is the recipient's own ID
    RemovePeer { id: PeerId },
}

impl OutboundEvent {
    /// Wire name of the event, for logging
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::ConnectSuccess { .. } => "connect-success",
            OutboundEvent::UpdatePeers(_) => "update-peers",
            OutboundEvent::PeerUpdated(_) => "peer-updated",
            OutboundEvent::PeerLeft { .. } => "peer-left",
            OutboundEvent::Offer { .. } => "offer",
            OutboundEvent::Answer { .. } => "answer",
            OutboundEvent::ReceiveMessage { .. } => "receive-message",
            OutboundEvent::ReceiveVideo { .. } => "receive-video",
            OutboundEvent::RemovePeer { .. } => "remove-peer",
        }
    }
}

/// Decode one inbound text frame
pub fn decode(text: &str) -> Result<InboundEvent, serde_json::Error> {
    let mut frame: Value = serde_json::from_str(text)?;

    // `leave` has no payload, but clients send `{}` as often as nothing
    if frame.get("event").and_then(Value::as_str) == Some("leave") {
        if let Some(envelope) = frame.as_object_mut() {
            envelope.remove("data");
        }
    }

    serde_json::from_value(frame)
}

/// Encode one outbound event as a text frame
pub fn encode(event: &OutboundEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
