pub mod restore;

pub use restore::{RestoreAuditEntryCommand, RestoreAuditEntryError, RestoreAuditEntryResponse};
