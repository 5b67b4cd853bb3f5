//! Event emitter trait for connection lifecycle events.
//!
//! Implementations handle transport details (channels, UI bridges, logs).

use crate::events::ConnectionEvent;

/// Trait for emitting connection events.
///
/// # Implementations
///
/// - `NoopEmitter` - For contexts that don't need events
/// - Adapter-specific implementations (channels, UI bridges)
pub trait ConnectionEventEmitter: Send + Sync {
    /// Emit an event.
    ///
    /// Called from inside supervisor operations; must not block.
    fn emit(&self, event: ConnectionEvent);
}

/// A no-op event emitter.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    /// Create a new no-op emitter.
    pub const fn new() -> Self {
        Self
    }
}

impl ConnectionEventEmitter for NoopEmitter {
    fn emit(&self, _event: ConnectionEvent) {}
}
