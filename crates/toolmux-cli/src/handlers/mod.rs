//! Command handlers.
//!
//! Each handler is a thin wrapper with the signature
//! `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`: it parses
//! CLI-specific input, calls the coordinator and formats the outcome. Table
//! rendering lives in plain functions so it can be tested without servers.

pub mod call;
pub mod status;
pub mod tools;
pub mod validate;

use serde_json::Value;

use crate::error::CliError;

/// Parse an `--args` value into a JSON value.
pub(crate) fn parse_args(args: &str) -> Result<Value, CliError> {
    serde_json::from_str(args)
        .map_err(|e| CliError::Arguments(format!("--args is not valid JSON: {e}")))
}
