//! CLI-specific error types and exit codes.

use thiserror::Error;
use toolmux_core::SettingsError;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The tool ran (or was rejected) and reported a failure.
    #[error("{0}")]
    Tool(String),
}

impl CliError {
    /// Map error to a process exit code (sysexits.h where one fits).
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Tool(_) => 1,
            Self::Arguments(_) => 2,
            Self::Io(_) => 74,
            Self::Config(_) => 78,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Arguments("x".into()).exit_code(), 2);
        assert_eq!(CliError::Config("x".into()).exit_code(), 78);
        assert_eq!(CliError::Tool("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_settings_error_is_config_error() {
        let err: CliError = SettingsError::ZeroConnectionTimeout.into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Connection timeout must be greater than zero"
        );
    }
}
