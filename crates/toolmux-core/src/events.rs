//! Connection lifecycle events.
//!
//! Emitted by the supervisor through [`crate::ports::ConnectionEventEmitter`]
//! so adapters (UI, CLI) can react without polling statuses.

use serde::{Deserialize, Serialize};

/// A connection state change worth telling the outside world about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// Session open and tools listed.
    Connected { server_id: String, tool_count: usize },

    /// Connection explicitly closed.
    Disconnected { server_id: String },

    /// A connect attempt failed (or a live session faulted).
    ConnectFailed { server_id: String, message: String },

    /// A reconnection timer was armed.
    ReconnectScheduled {
        server_id: String,
        /// Zero-based attempt number the timer was computed for.
        attempt: u32,
        delay_ms: u64,
    },

    /// The attempt cap was reached; no further automatic reconnection.
    ReconnectExhausted { server_id: String, attempts: u32 },
}

impl ConnectionEvent {
    /// Server the event refers to.
    pub fn server_id(&self) -> &str {
        match self {
            Self::Connected { server_id, .. }
            | Self::Disconnected { server_id }
            | Self::ConnectFailed { server_id, .. }
            | Self::ReconnectScheduled { server_id, .. }
            | Self::ReconnectExhausted { server_id, .. } => server_id,
        }
    }
}
