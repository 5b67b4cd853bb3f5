//! Error taxonomy shared by the protocol layer and the execution pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured classification of a failure.
///
/// Recovery decisions are made on this kind, not on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed arguments, schema violations, security-pattern hits.
    Validation,
    /// Unknown tool or unknown server id.
    NotFound,
    /// Transport, handshake or timeout failure; triggers reconnection.
    ConnectionFault,
    /// Anything else: remote tool errors, normalization, downstream appends.
    Internal,
}

/// Substrings that mark an unclassified upstream error as connection-shaped.
const CONNECTION_MARKERS: &[&str] = &["connection", "timeout", "refused", "enotfound", "closed"];

/// Fallback classifier for errors that arrive without a structured kind.
///
/// Only used when the producing layer could not say what went wrong; every
/// error constructed inside this workspace carries an explicit kind.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if CONNECTION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ErrorKind::ConnectionFault
    } else {
        ErrorKind::Internal
    }
}

/// Error reported by a protocol session or connector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    kind: Option<ErrorKind>,
    message: String,
}

impl ClientError {
    /// Transport-level failure (spawn, I/O, closed pipe, handshake timeout).
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: Some(ErrorKind::ConnectionFault),
            message: message.into(),
        }
    }

    /// The remote side answered, but with an error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self {
            kind: Some(ErrorKind::Internal),
            message: message.into(),
        }
    }

    /// An error from a layer that gives no structure; classified by message.
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }

    /// Effective kind, falling back to message matching when unstructured.
    pub fn kind(&self) -> ErrorKind {
        self.kind.unwrap_or_else(|| classify_message(&self.message))
    }

    /// Whether the producing layer supplied a kind.
    pub const fn is_structured(&self) -> bool {
        self.kind.is_some()
    }

    /// The raw message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure of a single tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolExecutionError {
    /// Arguments could not be parsed or failed validation. Never retried.
    #[error("{0}")]
    Validation(String),

    /// The tool is not exposed by any connected server.
    #[error("{0}")]
    NotFound(String),

    /// The owning connection failed mid-call.
    #[error("{0}")]
    Connection(String),

    /// Remote tool error or unexpected internal failure.
    #[error("{0}")]
    Internal(String),
}

impl ToolExecutionError {
    /// Kind used for recovery decisions and reporting.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Connection(_) => ErrorKind::ConnectionFault,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<ClientError> for ToolExecutionError {
    fn from(error: ClientError) -> Self {
        let kind = error.kind();
        let message = error.message;
        match kind {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::ConnectionFault => Self::Connection(message),
            ErrorKind::Internal => Self::Internal(message),
        }
    }
}
