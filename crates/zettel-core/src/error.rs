//! Error types for zettel-intake.

use thiserror::Error;

/// Result type alias using zettel-intake's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zettel-intake operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Generative service call failed (unreachable, non-2xx, unparsable).
    #[error("Inference error: {0}")]
    Inference(String),

    /// Document store operation failed for a reason other than a conflict.
    #[error("Store error: {0}")]
    Store(String),

    /// Optimistic concurrency violation: the file changed since it was read,
    /// or a create hit an existing file.
    #[error("Conflict on {path}: version token is stale or file already exists")]
    Conflict { path: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The structuring response contained no records.
    #[error("Generative service returned no structured notes")]
    NoStructuredOutput,

    /// The intake queue was empty when processing was triggered.
    #[error("Nothing in the queue")]
    EmptyQueue,

    /// Chat transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether this error is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Short machine-friendly label used in logs and run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Inference(_) => "inference",
            Error::Store(_) => "store",
            Error::Conflict { .. } => "conflict",
            Error::NotFound(_) => "not_found",
            Error::NoStructuredOutput => "no_structured_output",
            Error::EmptyQueue => "empty_queue",
            Error::Transport(_) => "transport",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::InvalidInput(_) => "invalid_input",
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
