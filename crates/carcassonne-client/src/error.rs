//! Network-layer errors.
//!
//! These travel on the event bus, separate from gameplay rejections, so a
//! caller can tell an illegal move apart from a lost connection.

use thiserror::Error;

/// Everything that can go wrong between the socket and the event bus
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A brace-balanced frame was not valid JSON or not a known message shape
    #[error("Malformed frame: {0}")]
    ProtocolParse(String),

    /// The frame buffer grew past its cap without yielding an object
    #[error("Frame buffer exceeded {limit} characters, discarded")]
    BufferOverflow { limit: usize },

    /// The socket failed to open or dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Terminal: no more automatic reconnects
    #[error("Failed to reconnect after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// The server answered with an ERROR message
    #[error("Server error: {message}")]
    Server {
        message: String,
        code: Option<String>,
    },

    /// The client task has stopped
    #[error("Transport client is not running")]
    ChannelClosed,
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::ProtocolParse(err.to_string())
    }
}
