//! Validate command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::parse_args;

/// Validate arguments for a tool and print the sanitized arguments.
pub async fn execute(ctx: &CliContext, tool: &str, args: &str) -> Result<()> {
    let params = parse_args(args)?;
    let result = ctx.coordinator.validate_tool_parameters(tool, &params).await;

    if !result.is_valid {
        for error in &result.errors {
            eprintln!("  ✗ {error}");
        }
        return Err(CliError::Tool(format!(
            "{} validation error(s) for \"{tool}\"",
            result.errors.len()
        ))
        .into());
    }

    println!("✓ Arguments for \"{tool}\" are valid");
    if let Some(sanitized) = &result.sanitized_parameters {
        println!("{}", serde_json::to_string_pretty(sanitized)?);
    }
    Ok(())
}
