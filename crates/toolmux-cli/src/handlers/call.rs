//! Call command handler.

use anyhow::Result;
use toolmux_core::{RunToolRequest, ToolCall};
use tracing::debug;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Call a tool. With a session id the call is also recorded in that
/// conversation and the assistant reply is printed.
pub async fn execute(
    ctx: &CliContext,
    tool: &str,
    args: &str,
    session: Option<&str>,
) -> Result<()> {
    let call = ToolCall::new(call_id(), tool, args);

    match session {
        None => {
            let result = ctx.coordinator.execute_call(&call).await;
            debug!(elapsed_ms = result.elapsed_ms, "Call finished");
            if result.success {
                println!("{}", result.output.unwrap_or_default());
                Ok(())
            } else {
                Err(CliError::Tool(result.error.unwrap_or_default()).into())
            }
        }
        Some(session_id) => {
            let request = RunToolRequest::new(session_id, call);
            let response = ctx.coordinator.process_tool_execution(&request).await;

            if !response.result.is_empty() {
                println!("{}", response.result);
            }
            println!();
            println!("{}", response.reply);

            let recorded = ctx.sessions.messages(session_id).await.len();
            eprintln!("Recorded {recorded} message(s) in session {session_id}");

            match response.error {
                Some(error) => Err(CliError::Tool(error).into()),
                None => Ok(()),
            }
        }
    }
}

fn call_id() -> String {
    format!("call_{}", std::process::id())
}
