//! Audit API routes
//!
//! Read access to recorded history plus restore.
//!
//! # Route Structure
//!
//! - `GET /api/v1/audits/history?model_class=&model_id=&limit=` - History of one subject
//! - `GET /api/v1/audits/:id` - Single entry with its diff
//! - `POST /api/v1/audits/:id/restore` - Apply an entry's old values to the subject

use std::sync::Arc;

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::audit::Auditor;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{
    commands::{RestoreAuditEntryCommand, RestoreAuditEntryError},
    queries::{AuditHistoryError, AuditHistoryQuery, GetAuditEntryError, GetAuditEntryQuery},
};

// ============================================================================
// Router Configuration
// ============================================================================

pub fn audits_routes() -> Router<Arc<Auditor>> {
    Router::new()
        .route("/history", get(audit_history))
        .route("/:id", get(get_audit_entry))
        .route("/:id/restore", post(restore_audit_entry))
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

/// History of a single subject, newest first
///
/// # Endpoint
///
/// `GET /api/v1/audits/history?model_class=articles&model_id=1&limit=20`
///
/// # Response
///
/// - `200 OK` - `{model_class, model_id, count, audits: [{audit_id, event, created_at, user_id, diff}]}`
/// - `400 Bad Request` - Missing model, malformed id or limit outside 1..=200
/// - `404 Not Found` - Model class is not audited
#[tracing::instrument(skip(auditor, query), fields(model_class = %query.model_class, model_id = %query.model_id))]
async fn audit_history(
    State(auditor): State<Arc<Auditor>>,
    Query(query): Query<AuditHistoryQuery>,
) -> Result<Response, AuditApiError> {
    let response = super::queries::history::handle(auditor, query).await?;

    tracing::debug!(count = response.count, "Audit history retrieved via API");

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

/// Single audit entry
///
/// # Endpoint
///
/// `GET /api/v1/audits/:id`
#[tracing::instrument(skip(auditor))]
async fn get_audit_entry(
    State(auditor): State<Arc<Auditor>>,
    Path(id): Path<i64>,
) -> Result<Response, AuditApiError> {
    let response = super::queries::get::handle(auditor, GetAuditEntryQuery { id }).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Restore a subject from an audit entry
///
/// # Endpoint
///
/// `POST /api/v1/audits/:id/restore`
///
/// # Response
///
/// - `200 OK` - Subject after the restore
/// - `404 Not Found` - Entry or subject not found
#[tracing::instrument(skip(auditor))]
async fn restore_audit_entry(
    State(auditor): State<Arc<Auditor>>,
    Path(id): Path<i64>,
) -> Result<Response, AuditApiError> {
    let response = super::commands::restore::handle(auditor, RestoreAuditEntryCommand { id }).await?;

    tracing::info!(
        audit_id = response.audit_id,
        subject_type = %response.subject_type,
        subject_id = %response.subject_id,
        restored = response.restored,
        "Subject restored via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Unified error type for audit API endpoints
#[derive(Debug)]
enum AuditApiError {
    History(AuditHistoryError),
    Get(GetAuditEntryError),
    Restore(RestoreAuditEntryError),
}

impl From<AuditHistoryError> for AuditApiError {
    fn from(err: AuditHistoryError) -> Self {
        Self::History(err)
    }
}

impl From<GetAuditEntryError> for AuditApiError {
    fn from(err: GetAuditEntryError) -> Self {
        Self::Get(err)
    }
}

impl From<RestoreAuditEntryError> for AuditApiError {
    fn from(err: RestoreAuditEntryError) -> Self {
        Self::Restore(err)
    }
}

impl IntoResponse for AuditApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuditApiError::History(
                AuditHistoryError::ModelClassRequired
                | AuditHistoryError::ModelIdRequired
                | AuditHistoryError::InvalidLimit(_)
                | AuditHistoryError::InvalidModelId(_),
            ) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AuditApiError::History(AuditHistoryError::UnknownModelClass(_))
            | AuditApiError::Get(GetAuditEntryError::NotFound(_))
            | AuditApiError::Restore(
                RestoreAuditEntryError::EntryNotFound(_) | RestoreAuditEntryError::SubjectNotFound { .. },
            ) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AuditApiError::History(AuditHistoryError::Audit(_))
            | AuditApiError::Get(GetAuditEntryError::Audit(_))
            | AuditApiError::Restore(RestoreAuditEntryError::Audit(_)) => {
                tracing::error!("Audit store error: {}", self);
                let error = ErrorResponse::new("INTERNAL_ERROR", "An audit storage error occurred");
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response();
            },
        };

        let error = ErrorResponse::new(code, self.to_string());
        (status, Json(error)).into_response()
    }
}

impl std::fmt::Display for AuditApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::History(e) => write!(f, "{}", e),
            Self::Get(e) => write!(f, "{}", e),
            Self::Restore(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let response = AuditApiError::History(AuditHistoryError::InvalidLimit(500)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            AuditApiError::History(AuditHistoryError::UnknownModelClass("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AuditApiError::Restore(RestoreAuditEntryError::EntryNotFound(9)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_display() {
        let err = AuditApiError::Get(GetAuditEntryError::NotFound(4));
        assert_eq!(err.to_string(), "Audit entry 4 not found");
    }
}
