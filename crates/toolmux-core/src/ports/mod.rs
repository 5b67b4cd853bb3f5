//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the pipeline expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No process or pipe types in any signature
//! - Sessions are shared (`Arc<dyn McpSession>`) so in-flight calls never
//!   hold registry locks
//! - Collaborators outside the core (chat storage, UI) are reached only
//!   through these traits

pub mod event_emitter;
pub mod mcp_session;
pub mod session_store;

pub use event_emitter::{ConnectionEventEmitter, NoopEmitter};
pub use mcp_session::{McpConnector, McpSession};
#[cfg(feature = "test-utils")]
pub use session_store::MockSessionStore;
pub use session_store::{InMemorySessionStore, SessionStore, SessionStoreError};
