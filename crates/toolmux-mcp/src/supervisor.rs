//! Connection lifecycle supervision.
//!
//! One [`ConnectionSupervisor`] owns every connection. Per server id it runs
//! the state machine
//!
//! ```text
//! Disconnected -> Connecting -> Connected | Error
//! Connected    -> Disconnected            (explicit disconnect)
//! Error        -> Connecting              (timer-driven retry, capped)
//! ```
//!
//! Operations on the same id are serialized by a per-id async lock; operations
//! on different ids run concurrently. Reconnection timers are spawned tasks
//! keyed by id, each with its own cancellation token, and arming a timer always
//! cancels the previous one.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolmux_core::{
    ClientError, ConnectionEvent, ConnectionEventEmitter, ConnectionStatus, ConnectionStatusInfo,
    McpConnector, McpSession, NoopEmitter, ServerConfig, SupervisorSettings, Tool,
};

use crate::catalog::ToolCatalog;
use crate::registry::ConnectionRegistry;

/// Errors returned by supervisor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    #[error("Server {0} not found")]
    NotFound(String),
}

/// Handle for an armed reconnection timer.
struct ReconnectTimer {
    generation: u64,
    cancel_token: CancellationToken,
    _join_handle: JoinHandle<()>,
}

struct SupervisorInner {
    registry: Arc<RwLock<ConnectionRegistry>>,
    timers: Mutex<HashMap<String, ReconnectTimer>>,
    op_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_generation: AtomicU64,
    connector: Arc<dyn McpConnector>,
    emitter: Arc<dyn ConnectionEventEmitter>,
    settings: SupervisorSettings,
}

/// Supervisor for all tool-server connections.
///
/// Cheap to clone; clones share the same registry and timers.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<SupervisorInner>,
}

impl ConnectionSupervisor {
    /// Create a supervisor that emits no events.
    pub fn new(connector: Arc<dyn McpConnector>, settings: SupervisorSettings) -> Self {
        Self::with_emitter(connector, settings, Arc::new(NoopEmitter::new()))
    }

    /// Create a supervisor that reports lifecycle changes to `emitter`.
    pub fn with_emitter(
        connector: Arc<dyn McpConnector>,
        settings: SupervisorSettings,
        emitter: Arc<dyn ConnectionEventEmitter>,
    ) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                registry: Arc::new(RwLock::new(ConnectionRegistry::new())),
                timers: Mutex::new(HashMap::new()),
                op_locks: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                connector,
                emitter,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.inner.settings
    }

    /// Read-only view over the tools of connected servers.
    pub fn catalog(&self) -> ToolCatalog {
        ToolCatalog::new(Arc::clone(&self.inner.registry))
    }

    /// Connect to a server.
    ///
    /// Disabled configs and already-connected servers are left alone. A failed
    /// attempt leaves the connection in `Error` and schedules a reconnection;
    /// it is not reported as an error to the caller. Returns the status after
    /// the attempt.
    pub async fn connect(&self, config: ServerConfig) -> ConnectionStatus {
        let lock = self.inner.op_lock(&config.id).await;
        let _guard = lock.lock().await;
        self.inner.connect_locked(config).await
    }

    /// Disconnect a server. Unknown ids are ignored.
    pub async fn disconnect(&self, id: &str) {
        let lock = self.inner.op_lock(id).await;
        let _guard = lock.lock().await;
        self.inner.disconnect_locked(id).await;
    }

    /// Disconnect, reset the attempt counter and connect with the stored config.
    pub async fn reconnect(&self, id: &str) -> Result<ConnectionStatus, SupervisorError> {
        let lock = self.inner.op_lock(id).await;
        let _guard = lock.lock().await;

        if !self.inner.registry.read().await.contains(id) {
            return Err(SupervisorError::NotFound(id.to_string()));
        }

        info!(server_id = %id, "Reconnecting to MCP server");
        Ok(self.inner.restart_locked(id, None).await)
    }

    /// Arm a backoff timer for `id`, replacing any pending one.
    ///
    /// Returns `false` when nothing was scheduled: unknown or disabled server,
    /// or the attempt cap has been reached.
    pub async fn schedule_reconnection(&self, id: &str) -> bool {
        let lock = self.inner.op_lock(id).await;
        let _guard = lock.lock().await;
        self.inner.schedule_locked(id).await
    }

    /// Reconcile the registry with a new set of configs.
    ///
    /// - ids no longer present are disconnected and removed
    /// - ids now disabled are disconnected and keep the new (disabled) snapshot
    /// - new enabled ids are connected
    /// - ids whose launch parameters changed are reconnected with the new config
    /// - unchanged ids are left untouched
    pub async fn update_configs(&self, configs: Vec<ServerConfig>) {
        let incoming: HashMap<&str, &ServerConfig> =
            configs.iter().map(|c| (c.id.as_str(), c)).collect();
        let existing = self.inner.registry.read().await.ids();

        for id in existing {
            match incoming.get(id.as_str()) {
                None => {
                    let lock = self.inner.op_lock(&id).await;
                    let guard = lock.lock().await;
                    self.inner.disconnect_locked(&id).await;
                    self.inner.registry.write().await.remove(&id);
                    drop(guard);
                    self.inner.op_locks.lock().await.remove(&id);
                    info!(server_id = %id, "Removed MCP server");
                }
                Some(config) if !config.enabled => {
                    let lock = self.inner.op_lock(&id).await;
                    let _guard = lock.lock().await;
                    self.inner.disconnect_locked(&id).await;
                    if let Some(conn) = self.inner.registry.write().await.get_mut(&id) {
                        conn.set_config((*config).clone());
                    }
                }
                Some(_) => {}
            }
        }

        for config in configs.iter().filter(|c| c.enabled) {
            let lock = self.inner.op_lock(&config.id).await;
            let _guard = lock.lock().await;

            let stored = self
                .inner
                .registry
                .read()
                .await
                .get(&config.id)
                .map(|c| c.config().clone());

            match stored {
                None => {
                    self.inner.connect_locked(config.clone()).await;
                }
                Some(stored) if stored.launch_differs(config) => {
                    info!(
                        server_id = %config.id,
                        server_name = %config.name,
                        "Configuration changed, reconnecting"
                    );
                    self.inner.restart_locked(&config.id, Some(config.clone())).await;
                }
                Some(stored) => {
                    if stored.name != config.name
                        && let Some(conn) = self.inner.registry.write().await.get_mut(&config.id)
                    {
                        conn.set_config(config.clone());
                    }
                }
            }
        }
    }

    /// Cancel every timer, disconnect every server concurrently and clear the
    /// registry. Individual disconnect failures do not stop the others.
    pub async fn shutdown(&self) {
        info!("Shutting down connection supervisor");

        {
            let mut timers = self.inner.timers.lock().await;
            for (_, timer) in timers.drain() {
                timer.cancel_token.cancel();
            }
        }

        let ids = self.inner.registry.read().await.ids();
        futures_util::future::join_all(ids.iter().map(|id| self.disconnect(id))).await;

        self.inner.registry.write().await.clear();
        self.inner.op_locks.lock().await.clear();
        info!("Connection supervisor shutdown complete");
    }

    /// Status of every registered connection, keyed by server id.
    pub async fn connection_statuses(&self) -> BTreeMap<String, ConnectionStatusInfo> {
        self.inner
            .registry
            .read()
            .await
            .iter()
            .map(|c| (c.id().to_string(), c.status_info()))
            .collect()
    }

    /// Status of one connection.
    pub async fn connection_status(&self, id: &str) -> Option<ConnectionStatusInfo> {
        self.inner
            .registry
            .read()
            .await
            .get(id)
            .map(|c| c.status_info())
    }

    /// Whether a reconnection timer is armed for `id`.
    pub async fn has_pending_reconnection(&self, id: &str) -> bool {
        self.inner.timers.lock().await.contains_key(id)
    }

    /// Probe `session` with a `tools/list` bounded by the connection timeout.
    ///
    /// Used after a tool call timed out: the session is only torn down (as a
    /// fault) when the probe fails too.
    pub(crate) async fn check_health(&self, id: &str, session: &Arc<dyn McpSession>) {
        let timeout = self.inner.settings.connection_timeout();
        let failure = match tokio::time::timeout(timeout, session.list_tools()).await {
            Ok(Ok(_)) => None,
            Ok(Err(error)) => Some(error.message().to_string()),
            Err(_) => Some(format!(
                "Health check timeout after {}ms",
                self.inner.settings.connection_timeout_ms
            )),
        };

        match failure {
            None => debug!(server_id = %id, "MCP server still responsive"),
            Some(message) => self.report_fault(id, session, &message).await,
        }
    }

    /// Handle a connection-shaped failure observed on `session`.
    ///
    /// Ignored when the connection has since moved to another session (for
    /// example after an explicit reconnect).
    pub(crate) async fn report_fault(
        &self,
        id: &str,
        session: &Arc<dyn McpSession>,
        message: &str,
    ) {
        let lock = self.inner.op_lock(id).await;
        let _guard = lock.lock().await;

        let released = {
            let mut registry = self.inner.registry.write().await;
            let Some(conn) = registry.get_mut(id) else {
                return;
            };
            if !conn.holds_session(session) {
                debug!(server_id = %id, "Ignoring fault from a stale session");
                return;
            }
            conn.mark_error(message)
        };

        warn!(server_id = %id, error = %message, "Connection fault detected");
        self.inner.emitter.emit(ConnectionEvent::ConnectFailed {
            server_id: id.to_string(),
            message: message.to_string(),
        });

        if let Some(session) = released {
            close_session(id, session).await;
        }
        self.inner.schedule_locked(id).await;
    }
}

impl SupervisorInner {
    async fn op_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.op_locks.lock().await;
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    async fn cancel_timer(&self, id: &str) {
        if let Some(timer) = self.timers.lock().await.remove(id) {
            timer.cancel_token.cancel();
            debug!(server_id = %id, "Cancelled pending reconnection");
        }
    }

    /// Body of `connect`; caller holds the op lock for `config.id`.
    async fn connect_locked(self: &Arc<Self>, config: ServerConfig) -> ConnectionStatus {
        if !config.enabled {
            debug!(server_name = %config.name, "Server is disabled, skipping connection");
            return ConnectionStatus::Disconnected;
        }

        {
            let mut registry = self.registry.write().await;
            let conn = registry.get_or_insert(&config);
            if conn.status() == ConnectionStatus::Connected {
                debug!(server_name = %config.name, "Server is already connected");
                return ConnectionStatus::Connected;
            }
            conn.set_config(config.clone());
            conn.mark_connecting();
        }

        info!(
            server_id = %config.id,
            server_name = %config.name,
            command = %config.command,
            "Connecting to MCP server"
        );

        let timeout = self.settings.connection_timeout();
        let outcome = match tokio::time::timeout(timeout, self.open_session(&config)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::connection(format!(
                "Connection timeout after {}ms",
                self.settings.connection_timeout_ms
            ))),
        };

        match outcome {
            Ok((session, tools)) => {
                let tool_count = tools.len();
                let stale = {
                    let mut registry = self.registry.write().await;
                    match registry.get_mut(&config.id) {
                        Some(conn) => {
                            conn.mark_connected(Arc::clone(&session), tools);
                            None
                        }
                        None => Some(session),
                    }
                };
                if let Some(session) = stale {
                    // Removed while connecting (shutdown); don't leak the process.
                    close_session(&config.id, session).await;
                    return ConnectionStatus::Disconnected;
                }
                // A timer armed by an earlier failure must not count against this session.
                self.cancel_timer(&config.id).await;

                info!(
                    server_id = %config.id,
                    server_name = %config.name,
                    tool_count,
                    "MCP server connected"
                );
                self.emitter.emit(ConnectionEvent::Connected {
                    server_id: config.id.clone(),
                    tool_count,
                });
                ConnectionStatus::Connected
            }
            Err(error) => {
                warn!(
                    server_id = %config.id,
                    server_name = %config.name,
                    error = %error,
                    "Failed to connect to MCP server"
                );
                if let Some(conn) = self.registry.write().await.get_mut(&config.id) {
                    conn.mark_error(error.message());
                }
                self.emitter.emit(ConnectionEvent::ConnectFailed {
                    server_id: config.id.clone(),
                    message: error.message().to_string(),
                });
                self.schedule_locked(&config.id).await;
                ConnectionStatus::Error
            }
        }
    }

    /// Spawn, handshake and list tools.
    async fn open_session(
        &self,
        config: &ServerConfig,
    ) -> Result<(Arc<dyn McpSession>, Vec<Tool>), ClientError> {
        let session = self.connector.connect(config).await?;

        match session.list_tools().await {
            Ok(descriptors) => {
                let tools = descriptors
                    .into_iter()
                    .map(|d| Tool::from_descriptor(d, config.id.clone()))
                    .collect();
                Ok((session, tools))
            }
            Err(error) => {
                close_session(&config.id, session).await;
                Err(error)
            }
        }
    }

    /// Body of `disconnect`; caller holds the op lock for `id`.
    async fn disconnect_locked(&self, id: &str) {
        self.cancel_timer(id).await;

        let released = {
            let mut registry = self.registry.write().await;
            let Some(conn) = registry.get_mut(id) else {
                debug!(server_id = %id, "Server not found, nothing to disconnect");
                return;
            };
            conn.mark_disconnected()
        };

        if let Some(session) = released {
            close_session(id, session).await;
        }

        info!(server_id = %id, "Disconnected from MCP server");
        self.emitter.emit(ConnectionEvent::Disconnected {
            server_id: id.to_string(),
        });
    }

    /// Disconnect, reset attempts and connect again, optionally with a new config.
    async fn restart_locked(
        self: &Arc<Self>,
        id: &str,
        new_config: Option<ServerConfig>,
    ) -> ConnectionStatus {
        self.disconnect_locked(id).await;

        let config = {
            let mut registry = self.registry.write().await;
            let Some(conn) = registry.get_mut(id) else {
                return ConnectionStatus::Disconnected;
            };
            if let Some(config) = new_config {
                conn.set_config(config);
            }
            conn.reset_reconnect_attempts();
            conn.config().clone()
        };

        self.connect_locked(config).await
    }

    /// Body of `schedule_reconnection`; caller holds the op lock for `id`.
    async fn schedule_locked(self: &Arc<Self>, id: &str) -> bool {
        let (attempts, enabled) = {
            let registry = self.registry.read().await;
            let Some(conn) = registry.get(id) else {
                return false;
            };
            (conn.reconnect_attempts(), conn.config().enabled)
        };

        if !enabled {
            return false;
        }

        if attempts >= self.settings.max_reconnect_attempts {
            self.cancel_timer(id).await;
            warn!(
                server_id = %id,
                attempts,
                "Max reconnection attempts reached, giving up"
            );
            self.emitter.emit(ConnectionEvent::ReconnectExhausted {
                server_id: id.to_string(),
                attempts,
            });
            return false;
        }

        let delay = self.settings.reconnect_delay(attempts);
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let cancel_token = CancellationToken::new();

        let join_handle = tokio::spawn(fire_reconnect(
            Arc::clone(self),
            id.to_string(),
            generation,
            cancel_token.clone(),
            delay,
        ));

        let previous = self.timers.lock().await.insert(
            id.to_string(),
            ReconnectTimer {
                generation,
                cancel_token,
                _join_handle: join_handle,
            },
        );
        if let Some(previous) = previous {
            previous.cancel_token.cancel();
        }

        info!(
            server_id = %id,
            delay_ms,
            attempt = attempts + 1,
            "Scheduling reconnection"
        );
        self.emitter.emit(ConnectionEvent::ReconnectScheduled {
            server_id: id.to_string(),
            attempt: attempts,
            delay_ms,
        });
        true
    }
}

/// Timer body: wait, then run one reconnection attempt under the op lock.
///
/// Boxed so the recursion connect -> schedule -> fire -> connect has a
/// nameable, `Send` future type.
fn fire_reconnect(
    inner: Arc<SupervisorInner>,
    id: String,
    generation: u64,
    cancel_token: CancellationToken,
    delay: Duration,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        tokio::select! {
            () = cancel_token.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        let lock = inner.op_lock(&id).await;
        let _guard = lock.lock().await;

        // Cancelled while waiting for the lock.
        if cancel_token.is_cancelled() {
            return;
        }

        {
            let mut timers = inner.timers.lock().await;
            if timers
                .get(&id)
                .is_some_and(|timer| timer.generation == generation)
            {
                timers.remove(&id);
            }
        }

        let config = {
            let mut registry = inner.registry.write().await;
            let Some(conn) = registry.get_mut(&id) else {
                return;
            };
            if conn.status() == ConnectionStatus::Connected {
                debug!(server_id = %id, "Already connected, skipping reconnection");
                return;
            }
            let attempt = conn.record_reconnect_attempt();
            info!(server_id = %id, attempt, "Attempting reconnection");
            conn.config().clone()
        };

        inner.connect_locked(config).await;
    })
}

/// Close a session, logging instead of propagating failures.
async fn close_session(id: &str, session: Arc<dyn McpSession>) {
    if let Err(error) = session.close().await {
        warn!(server_id = %id, error = %error, "Error closing MCP session");
    }
}
