#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use domain::{
    CancelOutcome, ConnectionStatus, ConnectionStatusInfo, ContentBlock, ExecutionResult,
    FORMAT_FAILED_MARKER, Message, MessageRole, NO_OUTPUT_MARKER, RunToolRequest, RunToolResponse,
    ServerConfig, Tool, ToolCall, ToolDescriptor, ToolExecutionContext, ToolOutput,
    ValidationResult,
};
pub use error::{ClientError, ErrorKind, ToolExecutionError, classify_message};
pub use events::ConnectionEvent;
pub use ports::{
    ConnectionEventEmitter, InMemorySessionStore, McpConnector, McpSession, NoopEmitter,
    SessionStore, SessionStoreError,
};
#[cfg(feature = "test-utils")]
pub use ports::MockSessionStore;
pub use settings::{
    DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY_BASE_MS,
    DEFAULT_TOOL_CALL_TIMEOUT_MS, SettingsError, SupervisorSettings,
};
