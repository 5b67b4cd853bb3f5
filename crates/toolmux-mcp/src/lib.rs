#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod catalog;
pub mod client;
pub mod coordinator;
pub(crate) mod registry;
mod replies;
pub mod supervisor;
pub mod validator;

// Re-export domain types from core for convenience
pub use toolmux_core::{
    ConnectionStatus, ConnectionStatusInfo, ExecutionResult, ServerConfig, SupervisorSettings,
    Tool, ToolCall, ValidationResult,
};

// Re-export this crate's public types
pub use catalog::ToolCatalog;
pub use client::{PROTOCOL_VERSION, StdioConnector, StdioSession};
pub use coordinator::ExecutionCoordinator;
pub use supervisor::{ConnectionSupervisor, SupervisorError};
pub use validator::{MAX_PARAMETER_LENGTH, validate_parameters};
