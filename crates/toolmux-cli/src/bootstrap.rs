//! CLI bootstrap, the composition root.
//!
//! The only place where the stdio connector, the supervisor, the session store
//! and the execution coordinator are wired together.

use std::sync::Arc;

use anyhow::Result;
use toolmux_core::{InMemorySessionStore, McpConnector, SessionStore};
use toolmux_mcp::{ConnectionSupervisor, ExecutionCoordinator, StdioConnector};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

/// Install the global tracing subscriber.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
/// `RUST_LOG` is honoured unless `--verbose` forces `debug`.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    /// Executes tool calls against the supervised connections.
    pub coordinator: ExecutionCoordinator,
    /// Conversation records written by `call --session`.
    pub sessions: Arc<InMemorySessionStore>,
}

impl CliContext {
    pub const fn supervisor(&self) -> &ConnectionSupervisor {
        self.coordinator.supervisor()
    }

    /// Cancel pending reconnections and close every server process.
    pub async fn shutdown(&self) {
        self.supervisor().shutdown().await;
    }
}

/// Build the context and connect every enabled server.
///
/// Servers that fail to connect are left in `Error` with a reconnection
/// scheduled; bootstrap itself only fails on an invalid configuration.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    config.validate()?;
    let enabled = config.enabled_count();
    let CliConfig { servers, settings } = config;

    let connector: Arc<dyn McpConnector> = Arc::new(StdioConnector::new());
    let supervisor = ConnectionSupervisor::new(connector, settings);

    let sessions = Arc::new(InMemorySessionStore::new());
    let coordinator = ExecutionCoordinator::new(
        supervisor.clone(),
        Arc::clone(&sessions) as Arc<dyn SessionStore>,
    );

    info!(servers = servers.len(), enabled, "Connecting configured servers");
    supervisor.update_configs(servers).await;
    debug!("Bootstrap complete");

    Ok(CliContext {
        coordinator,
        sessions,
    })
}
