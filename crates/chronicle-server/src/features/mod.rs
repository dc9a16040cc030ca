//! Feature modules implementing the Chronicle API
//!
//! Each feature is a vertical slice following the CQRS (Command Query
//! Responsibility Segregation) pattern:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries implement `mediator::Request`, see `crate::cqrs`.

pub mod audits;

use std::sync::Arc;

use axum::Router;

use crate::audit::Auditor;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub auditor: Arc<Auditor>,
}

/// Creates the API router with all feature routes mounted
///
/// - `/audits` - Audit history and restore
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().nest("/audits", audits::audits_routes().with_state(state.auditor))
}
