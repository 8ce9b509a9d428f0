//! CLI-specific error types and mappings.

use parley_core::{GatewayError, SettingsError};
use parley_voice::ConversationError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error (unreadable file, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (stdin, audio output).
    #[error("IO error: {0}")]
    Io(String),

    /// Gateway failure.
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// The conversation engine stopped underneath the driver.
    #[error("{0}")]
    Conversation(#[from] ConversationError),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where one fits.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 78,  // EX_CONFIG
            Self::Io(_) => 74,      // EX_IOERR
            Self::Gateway(err) => {
                if err.is_connection_failure() {
                    69 // EX_UNAVAILABLE
                } else {
                    1
                }
            }
            Self::Conversation(_) => 70, // EX_SOFTWARE
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
