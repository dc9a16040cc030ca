//! Chronicle Server Library
//!
//! Audit trail recorder for mutable entities.
//!
//! # Overview
//!
//! Whenever a registered subject is created, updated, soft-deleted,
//! hard-deleted or restored, the audit engine records what changed, who
//! changed it and the request it happened in:
//!
//! - **Audit Engine** (`audit`): lifecycle coordinator, change extraction,
//!   redaction, record store, diff/restore and retention pruning
//! - **Database**: PostgreSQL storage with SQLx
//! - **API**: read-only history endpoints plus restore
//! - **Configuration**: defaults, TOML file and environment via figment
//!
//! # Architecture
//!
//! The HTTP surface follows a **CQRS** layout:
//!
//! - **Queries** read recorded history (`GET /api/v1/audits/...`)
//! - **Commands** mutate subjects (`POST /api/v1/audits/:id/restore`); the
//!   mutation is itself recorded as an `updated` entry
//!
//! The `AuditContextLayer` captures URL, client IP, user agent and the
//! session user of each request so entries carry their request context.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chronicle_server::{audit::{Auditor, PgAuditStore}, config::Config, db};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     let store = PgAuditStore::new(pool, &config.audit.table)?;
//!     let _auditor = Auditor::new(Arc::new(config.audit.clone()), Arc::new(store));
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod cqrs;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;

// Re-export commonly used types
pub use audit::{AuditConfig, AuditError, AuditResult, Auditor};
pub use error::{ApiResult, AppError};
