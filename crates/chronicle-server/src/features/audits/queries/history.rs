use std::sync::Arc;

use chrono::{DateTime, Utc};
use chronicle_common::{ChronicleError, SubjectId};
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::audit::{
    diff, AuditEntry, AuditError, Auditor, Diff, HistoryQuery, DEFAULT_HISTORY_LIMIT,
    MAX_HISTORY_LIMIT,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditHistoryQuery {
    #[serde(default)]
    pub model_class: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditHistoryResponse {
    pub model_class: String,
    pub model_id: String,
    pub count: usize,
    pub audits: Vec<AuditSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub audit_id: i64,
    pub event: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub diff: Diff,
}

impl AuditSummary {
    pub fn from_entry(entry: &AuditEntry) -> Self {
        Self {
            audit_id: entry.id,
            event: entry.event.to_string(),
            created_at: entry.created_at,
            user_id: entry.actor_id.clone(),
            diff: diff(entry),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditHistoryError {
    #[error("model_class is required")]
    ModelClassRequired,
    #[error("model_id is required")]
    ModelIdRequired,
    #[error("limit must be between 1 and 200, got {0}")]
    InvalidLimit(i64),
    #[error("Model class '{0}' is not audited")]
    UnknownModelClass(String),
    #[error("{0}")]
    InvalidModelId(#[from] ChronicleError),
    #[error("{0}")]
    Audit(#[from] AuditError),
}

impl Request<Result<AuditHistoryResponse, AuditHistoryError>> for AuditHistoryQuery {}

impl crate::cqrs::middleware::Query for AuditHistoryQuery {}

impl AuditHistoryQuery {
    pub fn validate(&self) -> Result<(), AuditHistoryError> {
        if self.model_class.trim().is_empty() {
            return Err(AuditHistoryError::ModelClassRequired);
        }
        if self.model_id.trim().is_empty() {
            return Err(AuditHistoryError::ModelIdRequired);
        }
        if let Some(limit) = self.limit {
            if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
                return Err(AuditHistoryError::InvalidLimit(limit));
            }
        }
        Ok(())
    }
}

#[tracing::instrument(skip(auditor))]
pub async fn handle(
    auditor: Arc<Auditor>,
    query: AuditHistoryQuery,
) -> Result<AuditHistoryResponse, AuditHistoryError> {
    query.validate()?;

    let profile = auditor
        .profile(&query.model_class)
        .ok_or_else(|| AuditHistoryError::UnknownModelClass(query.model_class.clone()))?;
    let subject_id = SubjectId::parse(&query.model_id, profile.key_type)?;

    let entries = auditor
        .query_history(&HistoryQuery {
            subject_type: query.model_class.clone(),
            subject_id: subject_id.storage_key(),
            event: None,
            limit: Some(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)),
        })
        .await?;

    let audits: Vec<AuditSummary> = entries.iter().map(AuditSummary::from_entry).collect();

    Ok(AuditHistoryResponse {
        model_class: query.model_class,
        model_id: subject_id.storage_key(),
        count: audits.len(),
        audits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: Option<i64>) -> AuditHistoryQuery {
        AuditHistoryQuery {
            model_class: "articles".to_string(),
            model_id: "1".to_string(),
            limit,
        }
    }

    #[test]
    fn test_validation_success() {
        assert!(query(None).validate().is_ok());
        assert!(query(Some(1)).validate().is_ok());
        assert!(query(Some(200)).validate().is_ok());
    }

    #[test]
    fn test_validation_limit_out_of_range() {
        assert!(matches!(
            query(Some(0)).validate(),
            Err(AuditHistoryError::InvalidLimit(0))
        ));
        assert!(matches!(
            query(Some(201)).validate(),
            Err(AuditHistoryError::InvalidLimit(201))
        ));
    }

    #[test]
    fn test_validation_requires_model() {
        let mut q = query(None);
        q.model_class = " ".to_string();
        assert!(matches!(q.validate(), Err(AuditHistoryError::ModelClassRequired)));

        let mut q = query(None);
        q.model_id = String::new();
        assert!(matches!(q.validate(), Err(AuditHistoryError::ModelIdRequired)));
    }
}
