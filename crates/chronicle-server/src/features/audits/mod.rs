pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{RestoreAuditEntryCommand, RestoreAuditEntryError, RestoreAuditEntryResponse};
pub use queries::{
    AuditHistoryError, AuditHistoryQuery, AuditHistoryResponse, AuditSummary, GetAuditEntryError,
    GetAuditEntryQuery, GetAuditEntryResponse,
};
pub use routes::audits_routes;
