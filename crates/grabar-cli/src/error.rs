//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Session dump could not be read or parsed
    #[error("Session dump error: {message}")]
    SessionDump {
        /// Error message
        message: String,
    },

    /// Run reached a non-passing terminal status
    #[error("Run finished with status {status}")]
    RunFinished {
        /// Terminal status reached
        status: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Grabar library error
    #[error("Grabar error: {0}")]
    Grabar(#[from] grabar::GrabarError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a session dump error
    #[must_use]
    pub fn session_dump(message: impl Into<String>) -> Self {
        Self::SessionDump {
            message: message.into(),
        }
    }
}
