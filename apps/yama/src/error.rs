//! CLI error handling

use std::fmt;

use yama_errors::{FailureKind, UserFacingError};

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Error from configuration or the install pipeline
    Ops(yama_errors::Error),
    /// Invalid command arguments or batch file contents
    InvalidArguments(String),
    /// I/O error while rendering output
    Io(std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Ops(e) => e.failure_kind().exit_code(),
            CliError::InvalidArguments(_) => FailureKind::Config.exit_code(),
            CliError::Io(_) => FailureKind::Io.exit_code(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Ops(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Ops(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::InvalidArguments(_) => None,
        }
    }
}

impl From<yama_errors::Error> for CliError {
    fn from(e: yama_errors::Error) -> Self {
        CliError::Ops(e)
    }
}

impl From<yama_errors::ConfigError> for CliError {
    fn from(e: yama_errors::ConfigError) -> Self {
        CliError::Ops(e.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
