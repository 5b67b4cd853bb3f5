//! Domain types for supervised tool servers.
//!
//! These types describe servers, connections, tools and execution outcomes
//! independently of any transport or storage.
//!
//! # Design
//!
//! - `ServerConfig` - Launch configuration for one server process
//! - `ConnectionStatus` - Runtime status (disconnected, connecting, connected, error)
//! - `ToolDescriptor` / `Tool` - Tool as listed by a server / attributed to a connection
//! - `ToolCall` - A model-issued invocation request with raw JSON arguments
//! - `ToolOutput` - Tagged union over the remote result shapes
//! - `ValidationResult` / `ExecutionResult` - Pipeline outcomes
//! - `Message` - Conversation record appended after execution

mod execution;
mod message;
mod output;
mod server;
mod tool;

pub use execution::{
    CancelOutcome, ExecutionResult, RunToolRequest, RunToolResponse, ToolExecutionContext,
    ValidationResult,
};
pub use message::{Message, MessageRole};
pub use output::{ContentBlock, FORMAT_FAILED_MARKER, NO_OUTPUT_MARKER, ToolOutput};
pub use server::{ConnectionStatus, ConnectionStatusInfo, ServerConfig};
pub use tool::{Tool, ToolCall, ToolDescriptor};
