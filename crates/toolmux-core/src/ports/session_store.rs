//! Conversation store port.
//!
//! Chat session persistence is owned by another component; the execution
//! pipeline only ever appends records to it.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::Message;

/// Errors that can occur when appending to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionStoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Port for appending records to a conversation.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append a message to the end of a session.
    async fn add_message(&self, session_id: &str, message: Message)
    -> Result<(), SessionStoreError>;
}

/// Process-local session store.
///
/// Sessions are created on first append. Used by the CLI, which has no
/// persistent chat history.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a session's messages (empty if unknown).
    pub async fn messages(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn add_message(
        &self,
        session_id: &str,
        message: Message,
    ) -> Result<(), SessionStoreError> {
        self.sessions
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }
}
