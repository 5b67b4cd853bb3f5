//! In-process fakes for the protocol and event ports.
//!
//! Available to this crate's tests and, through the `test-utils` feature, to
//! downstream crates. Fakes record every interaction so tests can assert on
//! transport usage ("no transport call was made") rather than on timing.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::{ServerConfig, ToolDescriptor};
use crate::error::ClientError;
use crate::events::ConnectionEvent;
use crate::ports::{ConnectionEventEmitter, McpConnector, McpSession};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// FakeSession
// =============================================================================

#[derive(Debug, Default)]
struct SessionState {
    calls: Vec<(String, Value)>,
    results: HashMap<String, Result<Option<Value>, ClientError>>,
    list_error: Option<ClientError>,
    call_delay: Option<Duration>,
    tool_delays: HashMap<String, Duration>,
    list_count: usize,
    close_count: usize,
}

/// Scriptable protocol session.
///
/// Unscripted tools answer with a single text block `"<tool> ok"`.
#[derive(Debug)]
pub struct FakeSession {
    server_id: String,
    tools: Vec<ToolDescriptor>,
    state: Mutex<SessionState>,
}

impl FakeSession {
    pub fn new(server_id: impl Into<String>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            server_id: server_id.into(),
            tools,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Fix the result of every later call to `tool`.
    pub fn set_call_result(&self, tool: &str, result: Result<Option<Value>, ClientError>) {
        lock(&self.state).results.insert(tool.to_string(), result);
    }

    /// Make `list_tools` fail.
    pub fn set_list_error(&self, error: ClientError) {
        lock(&self.state).list_error = Some(error);
    }

    /// Delay every call by `delay` before answering.
    pub fn set_call_delay(&self, delay: Duration) {
        lock(&self.state).call_delay = Some(delay);
    }

    /// Delay calls to `tool` only; overrides [`Self::set_call_delay`].
    pub fn set_tool_call_delay(&self, tool: &str, delay: Duration) {
        lock(&self.state).tool_delays.insert(tool.to_string(), delay);
    }

    /// Every `(tool, arguments)` pair received, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        lock(&self.state).calls.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.state).calls.len()
    }

    pub fn list_count(&self) -> usize {
        lock(&self.state).list_count
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).close_count
    }
}

#[async_trait]
impl McpSession for FakeSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ClientError> {
        let mut state = lock(&self.state);
        state.list_count += 1;
        match &state.list_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.tools.clone()),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Option<Value>, ClientError> {
        let (delay, result) = {
            let mut state = lock(&self.state);
            state.calls.push((name.to_string(), arguments));
            let result = state.results.get(name).cloned().unwrap_or_else(|| {
                Ok(Some(json!({
                    "content": [{"type": "text", "text": format!("{name} ok")}]
                })))
            });
            let delay = state.tool_delays.get(name).copied().or(state.call_delay);
            (delay, result)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn close(&self) -> Result<(), ClientError> {
        lock(&self.state).close_count += 1;
        Ok(())
    }
}

// =============================================================================
// FakeConnector
// =============================================================================

#[derive(Debug, Default)]
struct ConnectorState {
    tools: HashMap<String, Vec<ToolDescriptor>>,
    queued_failures: HashMap<String, VecDeque<ClientError>>,
    permanent_failures: HashMap<String, ClientError>,
    connect_delay: Option<Duration>,
    connects: Vec<ServerConfig>,
    sessions: HashMap<String, Vec<Arc<FakeSession>>>,
}

/// Scriptable connector producing [`FakeSession`]s.
#[derive(Debug, Default)]
pub struct FakeConnector {
    state: Mutex<ConnectorState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tools that sessions for `server_id` will list.
    pub fn set_tools(&self, server_id: &str, tools: Vec<ToolDescriptor>) {
        lock(&self.state).tools.insert(server_id.to_string(), tools);
    }

    /// Fail the next connect for `server_id` with `error` (queued, one-shot).
    pub fn fail_next(&self, server_id: &str, error: ClientError) {
        lock(&self.state)
            .queued_failures
            .entry(server_id.to_string())
            .or_default()
            .push_back(error);
    }

    /// Fail every connect for `server_id` until [`Self::clear_failures`].
    pub fn fail_always(&self, server_id: &str, error: ClientError) {
        lock(&self.state)
            .permanent_failures
            .insert(server_id.to_string(), error);
    }

    pub fn clear_failures(&self, server_id: &str) {
        let mut state = lock(&self.state);
        state.queued_failures.remove(server_id);
        state.permanent_failures.remove(server_id);
    }

    /// Delay every connect by `delay` (used to exercise the connection timeout).
    pub fn set_connect_delay(&self, delay: Duration) {
        lock(&self.state).connect_delay = Some(delay);
    }

    /// Configs passed to `connect`, in call order.
    pub fn connect_log(&self) -> Vec<ServerConfig> {
        lock(&self.state).connects.clone()
    }

    pub fn connect_count(&self, server_id: &str) -> usize {
        lock(&self.state)
            .connects
            .iter()
            .filter(|config| config.id == server_id)
            .count()
    }

    pub fn total_connects(&self) -> usize {
        lock(&self.state).connects.len()
    }

    /// Sessions opened for `server_id`, oldest first.
    pub fn sessions(&self, server_id: &str) -> Vec<Arc<FakeSession>> {
        lock(&self.state)
            .sessions
            .get(server_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Most recently opened session for `server_id`.
    pub fn latest_session(&self, server_id: &str) -> Option<Arc<FakeSession>> {
        self.sessions(server_id).pop()
    }
}

#[async_trait]
impl McpConnector for FakeConnector {
    async fn connect(&self, config: &ServerConfig) -> Result<Arc<dyn McpSession>, ClientError> {
        let delay = {
            let mut state = lock(&self.state);
            state.connects.push(config.clone());
            state.connect_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if let Some(error) = state
            .queued_failures
            .get_mut(&config.id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if let Some(error) = state.permanent_failures.get(&config.id) {
            return Err(error.clone());
        }

        let tools = state.tools.get(&config.id).cloned().unwrap_or_default();
        let session = Arc::new(FakeSession::new(config.id.clone(), tools));
        state
            .sessions
            .entry(config.id.clone())
            .or_default()
            .push(Arc::clone(&session));
        Ok(session)
    }
}

// =============================================================================
// RecordingEmitter
// =============================================================================

/// Emitter that keeps every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<ConnectionEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ConnectionEvent> {
        lock(&self.events).clone()
    }

    /// Events for one server, in emission order.
    pub fn events_for(&self, server_id: &str) -> Vec<ConnectionEvent> {
        lock(&self.events)
            .iter()
            .filter(|event| event.server_id() == server_id)
            .cloned()
            .collect()
    }
}

impl ConnectionEventEmitter for RecordingEmitter {
    fn emit(&self, event: ConnectionEvent) {
        lock(&self.events).push(event);
    }
}
