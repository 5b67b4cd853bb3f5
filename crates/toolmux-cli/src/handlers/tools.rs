//! Tools command handler.

use std::fmt::Write;

use anyhow::Result;
use toolmux_core::Tool;

use crate::bootstrap::CliContext;
use crate::presentation::{separator, truncate_string};

/// List tools, optionally restricted to one server.
pub async fn execute(ctx: &CliContext, server: Option<&str>) -> Result<()> {
    let tools = match server {
        Some(id) => ctx.coordinator.get_server_tools(id).await,
        None => ctx.coordinator.get_all_tools().await,
    };
    print!("{}", render(&tools));
    Ok(())
}

pub(crate) fn render(tools: &[Tool]) -> String {
    if tools.is_empty() {
        return "No tools available. Run 'toolmux status' to check connections.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Found {} tool(s):\n", tools.len());
    let _ = writeln!(out, "{:<30} {:<20} Description", "Tool", "Server");
    let _ = writeln!(out, "{}", separator(90));
    for tool in tools {
        let description = tool.description.lines().next().unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<30} {:<20} {}",
            truncate_string(&tool.name, 29),
            truncate_string(&tool.server_id, 19),
            truncate_string(description, 40)
        );
    }
    out
}
