//! Servers configuration file.
//!
//! ```json
//! {
//!   "servers": [
//!     { "id": "files", "name": "Files", "command": "npx",
//!       "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"] }
//!   ],
//!   "settings": { "max_reconnect_attempts": 3 }
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use toolmux_core::{ServerConfig, SupervisorSettings};

use crate::error::CliError;

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    #[serde(default)]
    pub settings: SupervisorSettings,
}

impl CliConfig {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the supervisor cannot run.
    pub fn validate(&self) -> Result<(), CliError> {
        self.settings.validate()?;

        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.id.trim().is_empty() {
                return Err(CliError::Config("Server id must not be empty".to_string()));
            }
            if server.command.trim().is_empty() {
                return Err(CliError::Config(format!(
                    "Server {} has an empty command",
                    server.id
                )));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(CliError::Config(format!(
                    "Duplicate server id: {}",
                    server.id
                )));
            }
        }
        Ok(())
    }

    /// Number of servers that will be connected.
    pub fn enabled_count(&self) -> usize {
        self.servers.iter().filter(|s| s.enabled).count()
    }
}
