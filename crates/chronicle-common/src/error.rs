//! Error types for Chronicle

use thiserror::Error;

/// Result type alias for Chronicle operations
pub type Result<T> = std::result::Result<T, ChronicleError>;

/// Main error type shared across the workspace
#[derive(Error, Debug)]
pub enum ChronicleError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid {expected} subject id: {raw:?}")]
    InvalidSubjectId { expected: &'static str, raw: String },

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChronicleError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
