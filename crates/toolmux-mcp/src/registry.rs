//! Connection bookkeeping.
//!
//! The registry is plain data: it records what the supervisor has done to each
//! connection and keeps status and tool list in step. All transitions go
//! through `Connection` methods so no tool list is ever attributed to a
//! connection that is not `Connected`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use toolmux_core::{ConnectionStatus, ConnectionStatusInfo, McpSession, ServerConfig, Tool};

/// Supervised state for one server id.
pub(crate) struct Connection {
    config: ServerConfig,
    status: ConnectionStatus,
    tools: Vec<Tool>,
    last_error: Option<String>,
    reconnect_attempts: u32,
    last_reconnect_time: Option<DateTime<Utc>>,
    /// Present iff `status == Connected`.
    session: Option<Arc<dyn McpSession>>,
}

impl Connection {
    pub(crate) const fn new(config: ServerConfig) -> Self {
        Self {
            config,
            status: ConnectionStatus::Disconnected,
            tools: Vec::new(),
            last_error: None,
            reconnect_attempts: 0,
            last_reconnect_time: None,
            session: None,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.config.id
    }

    pub(crate) const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Replace the stored config snapshot. Does not touch the session.
    pub(crate) fn set_config(&mut self, config: ServerConfig) {
        self.config = config;
    }

    pub(crate) const fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub(crate) const fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub(crate) const fn reset_reconnect_attempts(&mut self) {
        self.reconnect_attempts = 0;
    }

    /// Bookkeeping for a timer-driven attempt that is about to run.
    pub(crate) fn record_reconnect_attempt(&mut self) -> u32 {
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.last_reconnect_time = Some(Utc::now());
        self.reconnect_attempts
    }

    /// Tools attributed to this connection (empty unless connected).
    pub(crate) fn tools(&self) -> &[Tool] {
        if self.status == ConnectionStatus::Connected {
            &self.tools
        } else {
            &[]
        }
    }

    pub(crate) fn has_tool(&self, name: &str) -> bool {
        self.tools().iter().any(|tool| tool.name == name)
    }

    /// The open session, if connected.
    pub(crate) fn session(&self) -> Option<Arc<dyn McpSession>> {
        self.session.clone()
    }

    /// Whether `session` is the one this connection currently holds.
    pub(crate) fn holds_session(&self, session: &Arc<dyn McpSession>) -> bool {
        self.session
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
    }

    pub(crate) fn mark_connecting(&mut self) {
        self.status = ConnectionStatus::Connecting;
        self.tools.clear();
        self.last_error = None;
    }

    pub(crate) fn mark_connected(&mut self, session: Arc<dyn McpSession>, tools: Vec<Tool>) {
        self.status = ConnectionStatus::Connected;
        self.tools = tools;
        self.session = Some(session);
        self.last_error = None;
        self.reconnect_attempts = 0;
    }

    /// Enter `Error`, handing back any session the caller must close.
    pub(crate) fn mark_error(&mut self, message: impl Into<String>) -> Option<Arc<dyn McpSession>> {
        self.status = ConnectionStatus::Error;
        self.tools.clear();
        self.last_error = Some(message.into());
        self.session.take()
    }

    /// Enter `Disconnected`, handing back any session the caller must close.
    pub(crate) fn mark_disconnected(&mut self) -> Option<Arc<dyn McpSession>> {
        self.status = ConnectionStatus::Disconnected;
        self.tools.clear();
        self.last_error = None;
        self.session.take()
    }

    pub(crate) fn status_info(&self) -> ConnectionStatusInfo {
        ConnectionStatusInfo {
            status: self.status,
            last_error: self.last_error.clone(),
            tool_count: self.tools().len(),
            reconnect_attempts: self.reconnect_attempts,
            last_reconnect_time: self.last_reconnect_time,
        }
    }
}

/// Insertion-ordered map of server id to connection.
///
/// Iteration order is registration order; tool resolution is first-match over
/// this order.
#[derive(Default)]
pub(crate) struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id() == id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Return the connection for `config.id`, registering it if unknown.
    ///
    /// An existing connection keeps its stored snapshot; use
    /// [`Connection::set_config`] to replace it.
    pub(crate) fn get_or_insert(&mut self, config: &ServerConfig) -> &mut Connection {
        let index = match self.connections.iter().position(|c| c.id() == config.id) {
            Some(index) => index,
            None => {
                self.connections.push(Connection::new(config.clone()));
                self.connections.len() - 1
            }
        };
        &mut self.connections[index]
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id() == id)?;
        Some(self.connections.remove(index))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        self.connections.iter().map(|c| c.id().to_string()).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.connections.clear();
    }
}
