//! Restore command
//!
//! Writes an entry's `old_values` back onto the live subject. The write is
//! itself audited as an `updated` entry by the coordinator.

use std::sync::Arc;

use chronicle_common::Attributes;
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditError, Auditor, RestoreOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreAuditEntryCommand {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreAuditEntryResponse {
    pub audit_id: i64,
    pub subject_type: String,
    pub subject_id: String,
    /// False when the entry had nothing to roll back to
    pub restored: bool,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub subject: Attributes,
}

#[derive(Debug, thiserror::Error)]
pub enum RestoreAuditEntryError {
    #[error("Audit entry {0} not found")]
    EntryNotFound(i64),
    #[error("Subject {subject_type} '{subject_id}' not found")]
    SubjectNotFound {
        subject_type: String,
        subject_id: String,
    },
    #[error("{0}")]
    Audit(#[from] AuditError),
}

impl Request<Result<RestoreAuditEntryResponse, RestoreAuditEntryError>> for RestoreAuditEntryCommand {}

impl crate::cqrs::middleware::Command for RestoreAuditEntryCommand {}

#[tracing::instrument(skip(auditor))]
pub async fn handle(
    auditor: Arc<Auditor>,
    command: RestoreAuditEntryCommand,
) -> Result<RestoreAuditEntryResponse, RestoreAuditEntryError> {
    let entry = auditor
        .find_entry(command.id)
        .await?
        .ok_or(RestoreAuditEntryError::EntryNotFound(command.id))?;

    let (restored, applied, skipped, subject) = match auditor.restore_entry(&entry).await? {
        RestoreOutcome::NotFound => {
            return Err(RestoreAuditEntryError::SubjectNotFound {
                subject_type: entry.subject_type,
                subject_id: entry.subject_id,
            });
        },
        RestoreOutcome::Unchanged(subject) => (false, Vec::new(), Vec::new(), subject),
        RestoreOutcome::Restored {
            subject,
            applied,
            skipped,
            ..
        } => (true, applied.into_keys().collect(), skipped, subject),
    };

    Ok(RestoreAuditEntryResponse {
        audit_id: entry.id,
        subject_type: entry.subject_type,
        subject_id: entry.subject_id,
        restored,
        applied,
        skipped,
        subject,
    })
}
