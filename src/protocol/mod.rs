//! Relay wire protocol
//!
//! JSON events exchanged over WebSocket text frames, plus the constants
//! shared by the identity allocator and server configuration.

pub mod constants;
pub mod event;

pub use event::{
    decode, encode, InboundEvent, OutboundEvent, PeerTarget, StatusUpdate, VideoAction,
};
