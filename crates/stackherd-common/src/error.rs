//! Common error types for the stackherd workspace.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`HerdError`].
pub type HerdResult<T> = Result<T, HerdError>;

/// Common errors across the stackherd workspace.
#[derive(Error, Diagnostic, Debug)]
pub enum HerdError {
    /// Configuration error. Fatal at load time.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(stackherd::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// The container runtime could not be invoked.
    #[error("Runtime call failed: {message}")]
    #[diagnostic(
        code(stackherd::runtime),
        help("The observed state of the affected stack is unknown for this cycle")
    )]
    Runtime {
        /// The error message.
        message: String,
    },

    /// The container runtime ran but reported failure.
    #[error("Command failed: {command}")]
    #[diagnostic(code(stackherd::runtime::command))]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// Captured standard error output.
        stderr: String,
    },

    /// Health probe error.
    #[error("Probe failed: {message}")]
    #[diagnostic(code(stackherd::probe))]
    Probe {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(stackherd::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(stackherd::serialization))]
    Serialization(String),
}

impl From<serde_json::Error> for HerdError {
    fn from(err: serde_json::Error) -> Self {
        HerdError::Serialization(err.to_string())
    }
}
