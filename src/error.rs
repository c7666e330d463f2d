//! Error types
//!
//! Errors that can escape the relay: socket I/O, WebSocket protocol failures,
//! JSON encoding and configuration problems. Routing problems (unknown or
//! ungrouped peers) never show up here; the router drops those events.

use tokio_tungstenite::tungstenite;

/// Error type for relay operations
#[derive(Debug)]
pub enum Error {
    /// Socket I/O error
    Io(std::io::Error),
    /// WebSocket protocol or transport error
    WebSocket(tungstenite::Error),
    /// JSON encode/decode error
    Json(serde_json::Error),
    /// WebSocket upgrade did not complete in time
    HandshakeTimeout,
    /// Client stopped reading: outbound queue overflowed or a write timed out
    Stalled,
    /// Invalid configuration value
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::HandshakeTimeout => write!(f, "WebSocket handshake timed out"),
            Error::Stalled => write!(f, "Client stopped reading"),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::HandshakeTimeout | Error::Stalled | Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(err: tungstenite::Error) -> Self {
        Error::WebSocket(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

/// Result alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;
