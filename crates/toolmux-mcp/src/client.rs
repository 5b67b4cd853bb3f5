//! MCP JSON-RPC client over stdio.
//!
//! Implements the connector/session ports for servers launched as child
//! processes speaking newline-delimited JSON-RPC 2.0.
//! Reference: <https://spec.modelcontextprotocol.io/>
//!
//! A background task reads stdout and routes each response to the request
//! waiting on its id, so concurrent calls on one session never wait on each
//! other. When stdout closes, every waiting request fails with a connection
//! error.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use toolmux_core::{ClientError, McpConnector, McpSession, ServerConfig, ToolDescriptor};

/// Protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response (or server-initiated message, which has no id).
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// MCP initialize result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    protocol_version: String,
    #[serde(default)]
    server_info: Option<ServerInfo>,
    #[serde(default)]
    capabilities: ServerCapabilities,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerInfo {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServerCapabilities {
    #[serde(default)]
    tools: Option<Value>,
}

/// One page of `tools/list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Requests waiting for a response, plus whether stdout has closed.
#[derive(Default)]
struct PendingRequests {
    closed: bool,
    waiters: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
}

type SharedPending = Arc<Mutex<PendingRequests>>;

fn lock(pending: &Mutex<PendingRequests>) -> MutexGuard<'_, PendingRequests> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a waiter if its request future is dropped before the response.
struct WaiterGuard<'a> {
    pending: &'a Mutex<PendingRequests>,
    id: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).waiters.remove(&self.id);
    }
}

/// Connector that launches each server as a child process.
#[derive(Debug, Clone)]
pub struct StdioConnector {
    client_name: String,
    client_version: String,
}

impl StdioConnector {
    pub fn new() -> Self {
        Self {
            client_name: "toolmux".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the `clientInfo` sent during the handshake.
    #[must_use]
    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }
}

impl Default for StdioConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl McpConnector for StdioConnector {
    async fn connect(&self, config: &ServerConfig) -> Result<Arc<dyn McpSession>, ClientError> {
        let mut session = StdioSession::spawn(config)?;
        session
            .initialize(&self.client_name, &self.client_version)
            .await?;
        Ok(Arc::new(session))
    }
}

/// An initialized session with one child process.
pub struct StdioSession {
    server_id: String,
    child: tokio::sync::Mutex<Option<Child>>,
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: SharedPending,
    next_id: AtomicU64,
    tools_supported: bool,
    reader: JoinHandle<()>,
    stderr_forwarder: Option<JoinHandle<()>>,
}

impl StdioSession {
    /// Spawn `config.command` with piped stdio and start the reader tasks.
    fn spawn(config: &ServerConfig) -> Result<Self, ClientError> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            ClientError::connection(format!(
                "Failed to spawn MCP server process '{}': {e}",
                config.command
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::connection("Failed to get stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::connection("Failed to get stdout"))?;
        let stderr_forwarder = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(forward_stderr(config.id.clone(), stderr)));

        let pending = SharedPending::default();
        let reader = tokio::spawn(read_responses(
            config.id.clone(),
            stdout,
            Arc::clone(&pending),
        ));

        Ok(Self {
            server_id: config.id.clone(),
            child: tokio::sync::Mutex::new(Some(child)),
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            tools_supported: true,
            reader,
            stderr_forwarder,
        })
    }

    /// MCP handshake: `initialize` then `notifications/initialized`.
    async fn initialize(
        &mut self,
        client_name: &str,
        client_version: &str,
    ) -> Result<(), ClientError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": client_name,
                "version": client_version
            },
            "capabilities": {}
        });

        let result = self.request("initialize", Some(params)).await?;
        let init: InitializeResult = serde_json::from_value(result).map_err(|e| {
            ClientError::connection(format!("MCP protocol error: invalid initialize result: {e}"))
        })?;

        self.tools_supported = init.capabilities.tools.is_some();
        debug!(
            server_id = %self.server_id,
            protocol_version = %init.protocol_version,
            server_name = init.server_info.as_ref().map_or("", |i| i.name.as_str()),
            server_version = init
                .server_info
                .as_ref()
                .and_then(|i| i.version.as_deref())
                .unwrap_or(""),
            tools_supported = self.tools_supported,
            "MCP session initialized"
        );

        self.notify("notifications/initialized").await
    }

    /// Send a request and wait for its response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = lock(&self.pending);
            if pending.closed {
                return Err(ClientError::connection("MCP server connection closed"));
            }
            pending.waiters.insert(id, tx);
        }
        let _waiter = WaiterGuard {
            pending: &self.pending,
            id,
        };

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        self.write_message(&request).await?;

        let response = rx
            .await
            .map_err(|_| ClientError::connection("MCP server closed connection"))?;

        if let Some(err) = response.error {
            return Err(ClientError::remote(format!(
                "MCP server returned error: code={}, message={}",
                err.code, err.message
            )));
        }

        response
            .result
            .ok_or_else(|| ClientError::remote("MCP protocol error: missing result in response"))
    }

    /// Send a notification (no id, no response).
    async fn notify(&self, method: &str) -> Result<(), ClientError> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": {}
        });
        self.write_message(&notification).await
    }

    async fn write_message<T: Serialize + Sync>(&self, message: &T) -> Result<(), ClientError> {
        let mut line = serde_json::to_string(message)
            .map_err(|e| ClientError::remote(format!("JSON serialization error: {e}")))?;
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| {
                ClientError::connection(format!("Failed to communicate with MCP server: {e}"))
            })?;
        stdin
            .flush()
            .await
            .map_err(|e| {
                ClientError::connection(format!("Failed to communicate with MCP server: {e}"))
            })
    }
}

#[async_trait]
impl McpSession for StdioSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ClientError> {
        if !self.tools_supported {
            return Ok(Vec::new());
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.take().map(|c| json!({ "cursor": c }));
            let result = self.request("tools/list", params).await?;
            let page: ToolsPage = serde_json::from_value(result).map_err(|e| {
                ClientError::remote(format!("MCP protocol error: invalid tools/list result: {e}"))
            })?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Option<Value>, ClientError> {
        let params = json!({
            "name": name,
            "arguments": arguments
        });
        let result = self.request("tools/call", Some(params)).await?;

        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if is_error {
            return Err(ClientError::remote(error_text(&result)));
        }

        Ok((!result.is_null()).then_some(result))
    }

    async fn close(&self) -> Result<(), ClientError> {
        {
            let mut pending = lock(&self.pending);
            pending.closed = true;
            // The reader is aborted below and never reaches its own cleanup.
            pending.waiters.clear();
        }
        self.reader.abort();
        if let Some(forwarder) = &self.stderr_forwarder {
            forwarder.abort();
        }

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        child
            .kill()
            .await
            .map_err(|e| ClientError::connection(format!("Failed to stop MCP server process: {e}")))
    }
}

impl Drop for StdioSession {
    fn drop(&mut self) {
        // The child itself is killed by `kill_on_drop`.
        self.reader.abort();
        if let Some(forwarder) = &self.stderr_forwarder {
            forwarder.abort();
        }
    }
}

/// Text of the content blocks of an `isError` result.
fn error_text(result: &Value) -> String {
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if text.is_empty() {
        "Unknown error".to_string()
    } else {
        text
    }
}

/// Route stdout lines to waiting requests until EOF.
async fn read_responses<R>(server_id: String, stdout: R, pending: SharedPending)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stdout).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let Ok(response) = serde_json::from_str::<JsonRpcResponse>(trimmed) else {
                    // npx and friends print banners on stdout
                    debug!(server_id = %server_id, line = trimmed, "Skipping non-JSON-RPC output");
                    continue;
                };
                let Some(id) = response.id else {
                    debug!(server_id = %server_id, "Ignoring server notification");
                    continue;
                };
                let waiter = lock(&pending).waiters.remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!(server_id = %server_id, id, "Response for unknown request id"),
                }
            }
            Ok(None) => {
                debug!(server_id = %server_id, "MCP server closed stdout");
                break;
            }
            Err(e) => {
                warn!(server_id = %server_id, error = %e, "Failed to read from MCP server");
                break;
            }
        }
    }

    let mut pending = lock(&pending);
    pending.closed = true;
    // Dropping the senders fails every waiting request.
    pending.waiters.clear();
}

/// Forward child stderr to the debug log, line by line.
async fn forward_stderr<R>(server_id: String, stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(server_id = %server_id, line = %line, "MCP server stderr");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolmux_core::ErrorKind;

    #[test]
    fn test_json_rpc_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "tools/list",
            params: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"tools/list\""));
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_json_rpc_error_parsing() {
        let json =
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"Invalid Request"}}"#;
        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, Some(1));
        assert_eq!(response.error.as_ref().unwrap().code, -32600);
    }

    #[test]
    fn test_tools_page_parsing() {
        let json = r#"{"tools":[{"name":"read_file","inputSchema":{"type":"object"}}],"nextCursor":"p2"}"#;
        let page: ToolsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.tools.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("p2"));
    }

    #[test]
    fn test_error_text_joins_blocks() {
        let result = json!({
            "isError": true,
            "content": [{"type": "text", "text": "no such file"}]
        });
        assert_eq!(error_text(&result), "no such file");
        assert_eq!(error_text(&json!({"isError": true})), "Unknown error");
    }

    #[tokio::test]
    async fn test_reader_routes_by_id_and_skips_noise() {
        let stdout: &[u8] = b"npx: installing...\n\
            {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\
            {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"b\":true}}\n\
            {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"a\":true}}\n";
        let pending = SharedPending::default();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        {
            let mut guard = lock(&pending);
            guard.waiters.insert(1, tx1);
            guard.waiters.insert(2, tx2);
        }

        read_responses("s1".to_string(), stdout, Arc::clone(&pending)).await;

        assert_eq!(rx1.await.unwrap().result, Some(json!({"a": true})));
        assert_eq!(rx2.await.unwrap().result, Some(json!({"b": true})));
        assert!(lock(&pending).closed);
    }

    #[tokio::test]
    async fn test_eof_fails_waiting_requests() {
        let pending = SharedPending::default();
        let (tx, rx) = oneshot::channel();
        lock(&pending).waiters.insert(7, tx);

        read_responses("s1".to_string(), &b""[..], Arc::clone(&pending)).await;

        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_connection_fault() {
        let config = ServerConfig::new("s1", "Missing", "/nonexistent/toolmux-test-binary");
        let err = StdioConnector::new().connect(&config).await.err().unwrap();

        assert_eq!(err.kind(), ErrorKind::ConnectionFault);
        assert!(err.message().contains("Failed to spawn MCP server process"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_handshake_list_and_call_against_script() {
        // Answers ids 1..4 in order: initialize, tools/list (2 pages), tools/call.
        let script = r#"
read -r _init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","serverInfo":{"name":"fake"},"capabilities":{"tools":{}}}}'
read -r _initialized
read -r _list1
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"a"}],"nextCursor":"next"}}'
read -r _list2
echo '{"jsonrpc":"2.0","id":3,"result":{"tools":[{"name":"b"}]}}'
read -r _call
echo '{"jsonrpc":"2.0","id":4,"result":{"isError":true,"content":[{"type":"text","text":"bad path"}]}}'
read -r _rest
"#;
        let config = ServerConfig::new("s1", "Script", "sh").with_args(["-c", script]);
        let session = StdioConnector::new().connect(&config).await.unwrap();

        let tools = session.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let err = session.call_tool("a", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.message(), "bad path");

        session.close().await.unwrap();
        let err = session.list_tools().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionFault);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_fails_in_flight_calls() {
        // Answers the handshake, then never answers the tool call.
        let script = r#"
read -r _init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}}}}'
read -r _initialized
read -r _call
exec sleep 30
"#;
        let config = ServerConfig::new("s1", "Silent", "sh").with_args(["-c", script]);
        let session = StdioConnector::new().connect(&config).await.unwrap();

        let in_flight = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.call_tool("slow", json!({})).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        session.close().await.unwrap();

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(2), in_flight)
            .await
            .expect("in-flight call still pending after close")
            .unwrap();
        assert_eq!(outcome.unwrap_err().kind(), ErrorKind::ConnectionFault);
    }
}
