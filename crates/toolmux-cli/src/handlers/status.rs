//! Status command handler.

use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::Result;
use toolmux_core::ConnectionStatusInfo;

use crate::bootstrap::CliContext;
use crate::presentation::{separator, truncate_string};

/// Print the status of every configured server.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let statuses = ctx.coordinator.connection_statuses().await;
    print!("{}", render(&statuses));
    Ok(())
}

pub(crate) fn render(statuses: &BTreeMap<String, ConnectionStatusInfo>) -> String {
    if statuses.is_empty() {
        return "No servers configured.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<13} {:<6} {:<9} Last error",
        "Server", "Status", "Tools", "Attempts"
    );
    let _ = writeln!(out, "{}", separator(80));

    for (id, info) in statuses {
        let _ = writeln!(
            out,
            "{:<20} {:<13} {:<6} {:<9} {}",
            truncate_string(id, 19),
            info.status.as_str(),
            info.tool_count,
            info.reconnect_attempts,
            info.last_error.as_deref().unwrap_or("--")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolmux_core::ConnectionStatus;

    fn info(status: ConnectionStatus, tools: usize, error: Option<&str>) -> ConnectionStatusInfo {
        ConnectionStatusInfo {
            status,
            last_error: error.map(str::to_string),
            tool_count: tools,
            reconnect_attempts: 0,
            last_reconnect_time: None,
        }
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&BTreeMap::new()), "No servers configured.\n");
    }

    #[test]
    fn test_render_rows() {
        let mut statuses = BTreeMap::new();
        statuses.insert("files".to_string(), info(ConnectionStatus::Connected, 3, None));
        statuses.insert(
            "git".to_string(),
            info(ConnectionStatus::Error, 0, Some("spawn failed")),
        );

        let text = render(&statuses);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("files"));
        assert!(lines[2].contains("connected"));
        assert!(lines[2].ends_with("--"));
        assert!(lines[3].contains("error"));
        assert!(lines[3].ends_with("spawn failed"));
    }
}
