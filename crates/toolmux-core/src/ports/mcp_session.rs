//! Protocol session and connector ports.
//!
//! The supervisor never spawns processes itself. It asks an [`McpConnector`]
//! for a session and talks to the session through [`McpSession`]; the stdio
//! JSON-RPC implementation lives in `toolmux-mcp`, tests use fakes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{ServerConfig, ToolDescriptor};
use crate::error::ClientError;

/// An open protocol session with one server process.
///
/// Implementations must allow concurrent calls: the coordinator issues
/// `call_tool` from many tasks at once with no queuing.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// List the tools the server exposes.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ClientError>;

    /// Invoke a tool. `Ok(None)` means the server returned no result.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Option<Value>, ClientError>;

    /// Close the session and release the underlying transport.
    async fn close(&self) -> Result<(), ClientError>;
}

/// Factory that spawns a transport for a config and opens a session on it.
///
/// The supervisor bounds `connect` with its connection timeout; implementations
/// should still clean up the child process if the returned future is dropped.
#[async_trait]
pub trait McpConnector: Send + Sync {
    /// Spawn `config.command` with `config.args`/`config.env` and perform the
    /// protocol handshake.
    async fn connect(&self, config: &ServerConfig) -> Result<Arc<dyn McpSession>, ClientError>;
}
