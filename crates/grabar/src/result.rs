//! Result and error types for Grabar.

use thiserror::Error;

/// Result type for Grabar operations
pub type GrabarResult<T> = Result<T, GrabarError>;

/// Errors that can occur in the recording/generation/execution pipeline
#[derive(Debug, Error)]
pub enum GrabarError {
    /// Operation called in the wrong session state
    #[error("Invalid session state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Generated spec file could not be resolved in any known workspace layout
    #[error("Spec '{name}' not found; searched {searched:?}")]
    SpecNotFound {
        /// Test name requested
        name: String,
        /// Layout directories that were searched
        searched: Vec<String>,
    },

    /// Remote credentials are not configured
    #[error("Missing remote credential: set {variable}")]
    MissingCredentials {
        /// Environment variable that must be set
        variable: String,
    },

    /// Runner configuration could not be created or validated
    #[error("Runner config error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// Child test process could not be spawned at all
    #[error("Failed to spawn test process: {message}")]
    SpawnFailed {
        /// Error message
        message: String,
    },

    /// Generated source did not parse during parameterization
    #[error("Parameterization parse error: {message}")]
    ParamParse {
        /// Error message
        message: String,
    },

    /// Element interaction failed at runtime
    #[error("{locator} not found")]
    LocatorNotFound {
        /// Locator rendered in the fixed grammar
        locator: String,
    },

    /// Runtime assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Locator library store is corrupt or unreadable
    #[error("Locator library error: {message}")]
    LibraryError {
        /// Error message
        message: String,
    },

    /// Browser driver reported an error
    #[error("Driver error: {message}")]
    DriverError {
        /// Error message
        message: String,
    },

    /// Run was cancelled before completion
    #[error("Run cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
