//! Assistant-facing reply text for tool outcomes.

/// Summary appended after a successful execution.
pub fn success_reply(tool_name: &str, output: &str) -> String {
    format!("I successfully executed the \"{tool_name}\" tool. {output}")
}

/// Tool-result record content for a failed execution.
pub fn failure_record(tool_name: &str, error: &str) -> String {
    format!("Error executing tool \"{tool_name}\": {error}")
}

/// User-friendly explanation of a failed execution, picked by error pattern.
pub fn error_reply(tool_name: &str, error: &str) -> String {
    if error.contains("not found") {
        format!(
            "I couldn't find the \"{tool_name}\" tool. Please check that the MCP server is properly configured and connected."
        )
    } else if error.contains("permission") || error.contains("access") {
        format!(
            "I don't have permission to execute the \"{tool_name}\" tool. Please check the file permissions or access rights."
        )
    } else if error.contains("timeout") {
        format!(
            "The \"{tool_name}\" tool timed out. This might be due to a slow operation or network issue."
        )
    } else if error.contains("connection") {
        format!(
            "I couldn't connect to the MCP server to execute the \"{tool_name}\" tool. Please check the server connection."
        )
    } else {
        format!(
            "I encountered an error while executing the \"{tool_name}\" tool: {error}. Please try again or check the tool configuration."
        )
    }
}

/// Reply used when the failure record itself could not be stored.
pub fn unrecorded_error_reply(tool_name: &str, error: &str) -> String {
    format!("I encountered an error while executing the \"{tool_name}\" tool: {error}")
}

/// Reply used when a successful result could not be stored.
pub const UNRECORDED_SUCCESS_REPLY: &str =
    "The tool executed successfully, but I encountered an issue generating a response.";

/// System record content for a user cancellation.
pub fn cancellation_record(tool_call_id: &str) -> String {
    format!("Tool execution {tool_call_id} was cancelled by the user.")
}

/// Assistant acknowledgement of a user cancellation.
pub const CANCELLATION_REPLY: &str =
    "I understand you cancelled the tool execution. Is there anything else I can help you with?";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reply_patterns() {
        assert!(error_reply("t", "Tool \"t\" not found in any connected server")
            .starts_with("I couldn't find the \"t\" tool"));
        assert!(error_reply("t", "EACCES: permission denied").starts_with("I don't have permission"));
        assert!(error_reply("t", "Tool call timeout after 30000ms").contains("timed out"));
        assert!(error_reply("t", "lost connection to server").starts_with("I couldn't connect"));
        assert_eq!(
            error_reply("t", "division by zero"),
            "I encountered an error while executing the \"t\" tool: division by zero. Please try again or check the tool configuration."
        );
    }

    #[test]
    fn test_success_reply_embeds_output() {
        assert_eq!(
            success_reply("echo", "hi"),
            "I successfully executed the \"echo\" tool. hi"
        );
    }
}
