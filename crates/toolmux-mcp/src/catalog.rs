//! Read-only tool aggregation over the connection registry.

use std::sync::Arc;

use tokio::sync::RwLock;
use toolmux_core::{McpSession, Tool};

use crate::registry::ConnectionRegistry;

/// A tool together with the session that will execute it.
///
/// Resolved under one registry read, so the tool definition used for
/// validation and the session used for dispatch always belong together.
#[derive(Clone)]
pub(crate) struct ResolvedTool {
    pub(crate) tool: Tool,
    pub(crate) session: Arc<dyn McpSession>,
}

/// View over the tools of connected servers.
///
/// Every call reads the registry afresh; nothing is cached.
#[derive(Clone)]
pub struct ToolCatalog {
    registry: Arc<RwLock<ConnectionRegistry>>,
}

impl ToolCatalog {
    pub(crate) const fn new(registry: Arc<RwLock<ConnectionRegistry>>) -> Self {
        Self { registry }
    }

    /// Tools of every connected server, in registry order.
    pub async fn get_all_tools(&self) -> Vec<Tool> {
        self.registry
            .read()
            .await
            .iter()
            .flat_map(|conn| conn.tools().iter().cloned())
            .collect()
    }

    /// Tools of one server; empty unless it is connected.
    pub async fn get_server_tools(&self, server_id: &str) -> Vec<Tool> {
        self.registry
            .read()
            .await
            .get(server_id)
            .map(|conn| conn.tools().to_vec())
            .unwrap_or_default()
    }

    /// Whether any connected server exposes `name`.
    pub async fn is_tool_available(&self, name: &str) -> bool {
        self.registry.read().await.iter().any(|c| c.has_tool(name))
    }

    /// First connected tool named `name`, in registry order.
    pub async fn find_tool(&self, name: &str) -> Option<Tool> {
        self.registry
            .read()
            .await
            .iter()
            .find_map(|conn| conn.tools().iter().find(|t| t.name == name).cloned())
    }

    /// First-match resolution of `name` to its owning session.
    pub(crate) async fn resolve(&self, name: &str) -> Option<ResolvedTool> {
        let registry = self.registry.read().await;
        registry.iter().find_map(|conn| {
            let tool = conn.tools().iter().find(|t| t.name == name)?;
            let session = conn.session()?;
            Some(ResolvedTool {
                tool: tool.clone(),
                session,
            })
        })
    }
}
