//! Tool execution pipeline.
//!
//! [`ExecutionCoordinator`] turns a model-issued [`ToolCall`] into a uniform
//! [`ExecutionResult`]:
//!
//! 1. parse the raw argument text
//! 2. resolve the tool to its owning connection (first match)
//! 3. validate the arguments against that tool's schema
//! 4. invoke the tool, bounded by the tool call timeout
//! 5. normalize the result to text
//!
//! A connection-shaped failure in step 4 is handed to the supervisor in the
//! background; the caller still gets the failure for its own call. A call that
//! merely times out only triggers a health check of its session, so other
//! calls on the same server keep running.
//!
//! The coordinator also keeps bookkeeping of in-flight executions per chat
//! session. Cancelling only drops that bookkeeping; the remote call runs to
//! completion and its result is discarded.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use toolmux_core::{
    CancelOutcome, ClientError, ConnectionStatusInfo, ErrorKind, ExecutionResult, McpSession,
    Message, RunToolRequest, RunToolResponse, SessionStore, Tool, ToolCall, ToolExecutionContext,
    ToolExecutionError, ToolOutput, ValidationResult,
};

use crate::catalog::ToolCatalog;
use crate::replies;
use crate::supervisor::ConnectionSupervisor;
use crate::validator::validate_parameters;

/// Key of an in-flight execution: `(session_id, tool_call_id)`.
type PendingKey = (String, String);

struct PendingExecution {
    ticket: u64,
    context: ToolExecutionContext,
}

/// Executes tool calls against supervised connections.
pub struct ExecutionCoordinator {
    supervisor: ConnectionSupervisor,
    catalog: ToolCatalog,
    session_store: Arc<dyn SessionStore>,
    pending: Mutex<HashMap<PendingKey, PendingExecution>>,
    next_ticket: AtomicU64,
}

impl ExecutionCoordinator {
    pub fn new(supervisor: ConnectionSupervisor, session_store: Arc<dyn SessionStore>) -> Self {
        let catalog = supervisor.catalog();
        Self {
            supervisor,
            catalog,
            session_store,
            pending: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub const fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    pub const fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub async fn get_all_tools(&self) -> Vec<Tool> {
        self.catalog.get_all_tools().await
    }

    pub async fn get_server_tools(&self, server_id: &str) -> Vec<Tool> {
        self.catalog.get_server_tools(server_id).await
    }

    pub async fn is_tool_available(&self, name: &str) -> bool {
        self.catalog.is_tool_available(name).await
    }

    pub async fn connection_statuses(&self) -> BTreeMap<String, ConnectionStatusInfo> {
        self.supervisor.connection_statuses().await
    }

    /// Validate `params` against the currently resolved definition of `tool_name`.
    pub async fn validate_tool_parameters(
        &self,
        tool_name: &str,
        params: &Value,
    ) -> ValidationResult {
        let tool = self.catalog.find_tool(tool_name).await;
        validate_parameters(tool_name, tool.as_ref(), params)
    }

    /// Execute a tool call without session bookkeeping.
    pub async fn execute_call(&self, call: &ToolCall) -> ExecutionResult {
        let started = Instant::now();
        info!(tool = %call.name, tool_call_id = %call.id, "Executing tool");

        match self.run_call(call).await {
            Ok(output) => {
                let elapsed = started.elapsed();
                info!(tool = %call.name, elapsed = ?elapsed, "Tool execution completed");
                ExecutionResult::success(output, elapsed)
            }
            Err(error) => {
                warn!(
                    tool = %call.name,
                    kind = ?error.kind(),
                    error = %error,
                    "Tool execution failed"
                );
                ExecutionResult::failure(&error, started.elapsed())
            }
        }
    }

    /// Execute a tool call on behalf of a chat session.
    ///
    /// The call is listed by [`Self::get_pending_executions`] while it runs.
    pub async fn execute_tool(&self, context: &ToolExecutionContext) -> ExecutionResult {
        self.execute_tracked(context).await.0
    }

    /// Execute a call and record the outcome in the conversation.
    ///
    /// Success appends the tool result and an assistant summary; failure
    /// appends an error record and returns a friendly reply. Failing to append
    /// never invalidates a successful `result`. If the execution was cancelled
    /// while in flight, nothing is appended and the result is discarded.
    pub async fn process_tool_execution(&self, request: &RunToolRequest) -> RunToolResponse {
        let call = &request.tool_call;
        let (execution, cancelled) = self.execute_tracked(request).await;

        if cancelled {
            info!(tool_call_id = %call.id, "Discarding result of cancelled execution");
            return RunToolResponse {
                result: String::new(),
                reply: replies::CANCELLATION_REPLY.to_string(),
                error: Some(format!("Tool execution {} was cancelled", call.id)),
            };
        }

        match (execution.success, execution.output, execution.error) {
            (true, Some(output), _) => self.record_success(request, output).await,
            (_, _, error) => {
                let error = error.unwrap_or_else(|| "Tool execution failed".to_string());
                self.record_failure(request, error).await
            }
        }
    }

    async fn record_success(&self, request: &RunToolRequest, output: String) -> RunToolResponse {
        let call = &request.tool_call;
        let reply = replies::success_reply(&call.name, &output);

        let appended = async {
            self.session_store
                .add_message(&request.session_id, Message::tool_result(&call.id, output.clone()))
                .await?;
            self.session_store
                .add_message(&request.session_id, Message::assistant(reply.clone()))
                .await
        }
        .await;

        match appended {
            Ok(()) => RunToolResponse {
                result: output,
                reply,
                error: None,
            },
            Err(e) => {
                error!(
                    session_id = %request.session_id,
                    error = %e,
                    "Failed to record successful tool execution"
                );
                RunToolResponse {
                    result: output,
                    reply: replies::UNRECORDED_SUCCESS_REPLY.to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn record_failure(&self, request: &RunToolRequest, error: String) -> RunToolResponse {
        let call = &request.tool_call;
        let record = Message::tool_result(&call.id, replies::failure_record(&call.name, &error));

        let reply = match self.session_store.add_message(&request.session_id, record).await {
            Ok(()) => replies::error_reply(&call.name, &error),
            Err(e) => {
                error!(
                    session_id = %request.session_id,
                    error = %e,
                    "Failed to record tool execution error"
                );
                replies::unrecorded_error_reply(&call.name, &error)
            }
        };

        RunToolResponse {
            result: String::new(),
            reply,
            error: Some(error),
        }
    }

    /// Drop the bookkeeping for a call and record the cancellation.
    ///
    /// An in-flight remote call is not aborted.
    pub async fn cancel_tool_execution(
        &self,
        tool_call_id: &str,
        session_id: &str,
    ) -> CancelOutcome {
        info!(tool_call_id, session_id, "Cancelling tool execution");

        let key = (session_id.to_string(), tool_call_id.to_string());
        if self.pending.lock().await.remove(&key).is_some() {
            debug!(tool_call_id, session_id, "Removed pending execution");
        }

        let appended = async {
            self.session_store
                .add_message(
                    session_id,
                    Message::system(replies::cancellation_record(tool_call_id))
                        .with_tool_call_id(tool_call_id),
                )
                .await?;
            self.session_store
                .add_message(session_id, Message::assistant(replies::CANCELLATION_REPLY))
                .await
        }
        .await;

        match appended {
            Ok(()) => CancelOutcome {
                success: true,
                message: format!("Tool execution {tool_call_id} has been cancelled successfully"),
            },
            Err(e) => {
                error!(tool_call_id, error = %e, "Failed to cancel tool execution");
                CancelOutcome {
                    success: false,
                    message: format!("Failed to cancel tool execution: {e}"),
                }
            }
        }
    }

    /// In-flight executions for a chat session.
    pub async fn get_pending_executions(&self, session_id: &str) -> Vec<ToolExecutionContext> {
        self.pending
            .lock()
            .await
            .iter()
            .filter(|((session, _), _)| session == session_id)
            .map(|(_, pending)| pending.context.clone())
            .collect()
    }

    /// Forget every in-flight execution of a chat session. Returns how many
    /// were dropped.
    pub async fn clear_pending_executions(&self, session_id: &str) -> usize {
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|(session, _), _| session != session_id);
        let cleared = before - pending.len();
        drop(pending);

        info!(session_id, cleared, "Cleared pending executions");
        cleared
    }

    /// Run with bookkeeping. The flag is `true` when the entry was removed
    /// (cancelled) before the call finished.
    async fn execute_tracked(&self, context: &ToolExecutionContext) -> (ExecutionResult, bool) {
        let key = (context.session_id.clone(), context.tool_call.id.clone());
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().await.insert(
            key.clone(),
            PendingExecution {
                ticket,
                context: context.clone(),
            },
        );

        let result = self.execute_call(&context.tool_call).await;

        let mut pending = self.pending.lock().await;
        let still_ours = pending.get(&key).is_some_and(|p| p.ticket == ticket);
        if still_ours {
            pending.remove(&key);
        }
        drop(pending);

        (result, !still_ours)
    }

    async fn run_call(&self, call: &ToolCall) -> Result<String, ToolExecutionError> {
        let params: Value = serde_json::from_str(&call.arguments).map_err(|e| {
            ToolExecutionError::Validation(format!("Invalid tool arguments JSON: {e}"))
        })?;

        let Some(target) = self.catalog.resolve(&call.name).await else {
            return Err(ToolExecutionError::NotFound(format!(
                "Tool \"{}\" not found in any connected server",
                call.name
            )));
        };

        let validation = validate_parameters(&call.name, Some(&target.tool), &params);
        if !validation.is_valid {
            return Err(ToolExecutionError::Validation(format!(
                "Tool parameter validation failed: {}",
                validation.errors.join(", ")
            )));
        }
        let arguments = validation.sanitized_parameters.unwrap_or(params);

        debug!(
            tool = %call.name,
            server_id = %target.tool.server_id,
            "Dispatching tool call"
        );

        let invocation = target.session.call_tool(&call.name, arguments);
        let settings = self.supervisor.settings();
        let outcome = match settings.tool_call_timeout() {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    // Only this call is slow; the session may be fine for the others.
                    self.spawn_health_check(&target.tool.server_id, &target.session);
                    return Err(ToolExecutionError::Connection(format!(
                        "Tool call timeout after {}ms",
                        limit.as_millis()
                    )));
                }
            },
            None => invocation.await,
        };

        match outcome {
            Ok(raw) => Ok(ToolOutput::from_raw(raw).normalize()),
            Err(error) => {
                if error.kind() == ErrorKind::ConnectionFault {
                    self.spawn_fault_report(&target.tool.server_id, &target.session, &error);
                }
                Err(error.into())
            }
        }
    }

    fn spawn_health_check(&self, server_id: &str, session: &Arc<dyn McpSession>) {
        info!(server_id, "Tool call timed out, checking server health");
        let supervisor = self.supervisor.clone();
        let server_id = server_id.to_string();
        let session = Arc::clone(session);
        tokio::spawn(async move {
            supervisor.check_health(&server_id, &session).await;
        });
    }

    fn spawn_fault_report(
        &self,
        server_id: &str,
        session: &Arc<dyn McpSession>,
        error: &ClientError,
    ) {
        info!(server_id, "Connection error detected, scheduling reconnection");
        let supervisor = self.supervisor.clone();
        let server_id = server_id.to_string();
        let session = Arc::clone(session);
        let message = error.message().to_string();
        tokio::spawn(async move {
            supervisor.report_fault(&server_id, &session, &message).await;
        });
    }
}
