//! Audit engine error types

use chronicle_common::ChronicleError;
use thiserror::Error;

/// Result type alias for audit operations
pub type AuditResult<T> = std::result::Result<T, AuditError>;

/// Failures surfaced by the audit engine.
///
/// Only storage and configuration problems are errors. A non-whitelisted
/// event, an unresolvable actor or a missing restore target are reported as
/// ordinary outcomes so that auditing never breaks the operation it observes.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Audit store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown subject type: {0}")]
    UnknownSubjectType(String),

    #[error(transparent)]
    Common(#[from] ChronicleError),
}

impl AuditError {
    /// Create a store error for non-SQL backends
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}
