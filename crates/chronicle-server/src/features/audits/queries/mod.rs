pub mod get;
pub mod history;

pub use get::{GetAuditEntryError, GetAuditEntryQuery, GetAuditEntryResponse};
pub use history::{AuditHistoryError, AuditHistoryQuery, AuditHistoryResponse, AuditSummary};
