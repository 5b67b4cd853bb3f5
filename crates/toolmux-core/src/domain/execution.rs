//! Validation and execution result types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Message;
use super::tool::ToolCall;
use crate::error::{ErrorKind, ToolExecutionError};

/// Outcome of validating tool arguments against a tool's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True iff no errors were produced.
    pub is_valid: bool,

    /// Human-readable errors, in the order they were found.
    pub errors: Vec<String>,

    /// Arguments to forward to the server (only present when valid).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_parameters: Option<Value>,
}

impl ValidationResult {
    /// A passing result carrying the arguments to forward.
    pub const fn valid(sanitized: Value) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            sanitized_parameters: Some(sanitized),
        }
    }

    /// A failing result.
    pub const fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            sanitized_parameters: None,
        }
    }
}

/// Uniform outcome of a tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Whether the tool ran and returned a result.
    pub success: bool,

    /// Normalized output (present iff success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Error message (present iff failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Failure classification (present iff failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Wall-clock time spent, in milliseconds.
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    /// Create a success result.
    pub fn success(output: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            error_kind: None,
            elapsed_ms: duration_ms(elapsed),
        }
    }

    /// Create a failure result.
    pub fn failure(error: &ToolExecutionError, elapsed: Duration) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            elapsed_ms: duration_ms(elapsed),
        }
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// A tool call together with the conversation it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionContext {
    /// Conversation the call was issued in.
    pub session_id: String,

    /// Conversation so far (read-only context for reply generation).
    #[serde(default)]
    pub messages: Vec<Message>,

    /// The call to execute.
    pub tool_call: ToolCall,
}

impl ToolExecutionContext {
    /// Create a context with no prior messages.
    pub fn new(session_id: impl Into<String>, tool_call: ToolCall) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            tool_call,
        }
    }
}

/// Request to execute a tool call and record it in a conversation.
pub type RunToolRequest = ToolExecutionContext;

/// Result of `process_tool_execution`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunToolResponse {
    /// Normalized tool output (empty on failure).
    pub result: String,

    /// Assistant-facing summary of what happened.
    pub reply: String,

    /// Execution or recording error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `cancel_tool_execution`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    /// Whether the cancellation was recorded.
    pub success: bool,

    /// Human-readable explanation.
    pub message: String,
}
