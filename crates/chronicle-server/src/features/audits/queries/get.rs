use std::sync::Arc;

use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::audit::{diff, AuditEntry, AuditError, Auditor, Diff};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAuditEntryQuery {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAuditEntryResponse {
    #[serde(flatten)]
    pub entry: AuditEntry,
    pub diff: Diff,
}

#[derive(Debug, thiserror::Error)]
pub enum GetAuditEntryError {
    #[error("Audit entry {0} not found")]
    NotFound(i64),
    #[error("{0}")]
    Audit(#[from] AuditError),
}

impl Request<Result<GetAuditEntryResponse, GetAuditEntryError>> for GetAuditEntryQuery {}

impl crate::cqrs::middleware::Query for GetAuditEntryQuery {}

#[tracing::instrument(skip(auditor))]
pub async fn handle(
    auditor: Arc<Auditor>,
    query: GetAuditEntryQuery,
) -> Result<GetAuditEntryResponse, GetAuditEntryError> {
    let entry = auditor
        .find_entry(query.id)
        .await?
        .ok_or(GetAuditEntryError::NotFound(query.id))?;

    Ok(GetAuditEntryResponse {
        diff: diff(&entry),
        entry,
    })
}
