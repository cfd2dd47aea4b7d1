//! Error types for rigor-core.

use thiserror::Error;

/// Result type alias using rigor-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the rigor workflow.
#[derive(Error, Debug)]
pub enum Error {
    /// A parser could not extract a value from collaborator output
    /// and no fallback was configured.
    #[error("Parse error: unable to parse output: {output}")]
    Parse { output: String },

    /// A black-box collaborator (model or tool) failed. Aborts the
    /// in-flight turn; nothing in this crate retries.
    #[error("Collaborator error: {collaborator} - {message}")]
    Collaborator {
        collaborator: String,
        message: String,
    },

    /// A stage invariant was violated. Indicates a wiring bug in the
    /// caller or state machine, not a recoverable condition.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Configuration error (missing credentials, bad settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a parse error carrying the unparseable output.
    pub fn parse(output: impl Into<String>) -> Self {
        Self::Parse {
            output: output.into(),
        }
    }

    /// Create a collaborator error.
    pub fn collaborator(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}
