//! Server configuration and connection status types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for one external tool server process.
///
/// The `id` is the stable key used by the registry; every other field is a
/// snapshot that only changes through an explicit config update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Unique, stable server identifier.
    pub id: String,

    /// User-friendly name for logs and UI.
    pub name: String,

    /// Command to execute (e.g. "npx" or "/usr/local/bin/mcp-fs").
    pub command: String,

    /// Arguments passed to the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides for the child process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Disabled servers are never spawned.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl ServerConfig {
    /// Create an enabled stdio server configuration.
    pub fn new(id: impl Into<String>, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            enabled: true,
        }
    }

    /// Set the argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set enabled status.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the launch-relevant parts of two configs differ.
    ///
    /// The display name is deliberately excluded: renaming a server does not
    /// require restarting its process.
    pub fn launch_differs(&self, other: &Self) -> bool {
        self.command != other.command
            || self.args != other.args
            || self.env != other.env
            || self.enabled != other.enabled
    }
}

/// Lifecycle state of a supervised connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No session is open.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Session open and tools listed.
    Connected,
    /// Last connect attempt (or an in-flight call) failed.
    Error,
}

impl ConnectionStatus {
    /// Lowercase label used in logs and CLI output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one connection, as reported by `connection_statuses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatusInfo {
    /// Current status.
    pub status: ConnectionStatus,

    /// Error from the last failed attempt (only set in `Error`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Number of tools currently attributed to the connection.
    pub tool_count: usize,

    /// Automatic reconnection attempts since the last reset.
    pub reconnect_attempts: u32,

    /// When the last automatic reconnection attempt fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reconnect_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialize_defaults() {
        let json = r#"{"id":"fs","name":"Filesystem","command":"npx"}"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();

        assert!(config.enabled);
        assert!(config.args.is_empty());
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_launch_differs_ignores_name() {
        let a = ServerConfig::new("s1", "One", "node").with_args(["server.js"]);
        let mut b = a.clone();
        b.name = "Renamed".to_string();
        assert!(!a.launch_differs(&b));

        let c = a.clone().with_env("TOKEN", "x");
        assert!(a.launch_differs(&c));

        let d = a.clone().with_enabled(false);
        assert!(a.launch_differs(&d));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ConnectionStatus::Connected).unwrap();
        assert_eq!(json, "\"connected\"");
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }
}
