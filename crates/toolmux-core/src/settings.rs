//! Supervisor settings and validation.
//!
//! Pure configuration values; the supervisor and coordinator read them once
//! at construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cap on automatic reconnection attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default base delay for exponential backoff, in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_BASE_MS: u64 = 5_000;

/// Default bound on connect + tool listing, in milliseconds.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10_000;

/// Default bound on a single tool invocation, in milliseconds.
pub const DEFAULT_TOOL_CALL_TIMEOUT_MS: u64 = 30_000;

/// Tunables for connection supervision and tool execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Automatic reconnection stops once this many attempts have fired.
    pub max_reconnect_attempts: u32,

    /// Attempt `k` waits `reconnect_delay_base_ms * 2^k`.
    pub reconnect_delay_base_ms: u64,

    /// Bound on spawning, handshaking and listing tools.
    pub connection_timeout_ms: u64,

    /// Bound on a single `tools/call`. `None` disables the bound.
    pub tool_call_timeout_ms: Option<u64>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_base_ms: DEFAULT_RECONNECT_DELAY_BASE_MS,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            tool_call_timeout_ms: Some(DEFAULT_TOOL_CALL_TIMEOUT_MS),
        }
    }
}

impl SupervisorSettings {
    /// Backoff delay before attempt number `attempt` (zero-based).
    ///
    /// Saturates instead of overflowing for absurd attempt counts.
    #[must_use]
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.reconnect_delay_base_ms.saturating_mul(factor))
    }

    /// Connection timeout as a `Duration`.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Tool call timeout as a `Duration`, if bounded.
    #[must_use]
    pub fn tool_call_timeout(&self) -> Option<Duration> {
        self.tool_call_timeout_ms.map(Duration::from_millis)
    }

    /// Check that the settings can drive a supervisor.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.connection_timeout_ms == 0 {
            return Err(SettingsError::ZeroConnectionTimeout);
        }
        if self.reconnect_delay_base_ms == 0 {
            return Err(SettingsError::ZeroReconnectDelay);
        }
        if self.tool_call_timeout_ms == Some(0) {
            return Err(SettingsError::ZeroToolCallTimeout);
        }
        Ok(())
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Connection timeout must be greater than zero")]
    ZeroConnectionTimeout,

    #[error("Reconnect delay base must be greater than zero")]
    ZeroReconnectDelay,

    #[error("Tool call timeout must be greater than zero (omit it to disable)")]
    ZeroToolCallTimeout,
}
