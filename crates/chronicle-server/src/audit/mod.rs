//! Audit trail engine
//!
//! Records a structured entry whenever a registered subject is created,
//! updated, deleted or restored: what changed, who changed it, and the
//! request it happened in.
//!
//! # Architecture
//!
//! A lifecycle transition flows through:
//! - **Coordinator** (`Auditor`): applies the configured policy per event
//! - **Change extraction** (`extract`): computes the old/new attribute pair
//! - **Field projection** (`projection`): removes redacted attributes
//! - **Record store** (`AuditStore`): appends the entry
//!
//! Independently, `diff`/`restore` work on persisted entries and the
//! `pruner` sweeps entries past the retention window.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use chronicle_common::{Attributes, SubjectId};
//! use chronicle_server::audit::{AuditConfig, Auditable, Auditor, InMemoryAuditStore};
//!
//! struct Article { id: i64, title: String }
//!
//! impl Auditable for Article {
//!     const SUBJECT_TYPE: &'static str = "articles";
//!
//!     fn subject_id(&self) -> SubjectId {
//!         SubjectId::Integer(self.id)
//!     }
//!
//!     fn audit_attributes(&self) -> Attributes {
//!         [("title".to_string(), self.title.clone().into())].into()
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryAuditStore::new());
//! let auditor = Auditor::new(Arc::new(AuditConfig::default()), store).register::<Article>();
//!
//! let article = Article { id: 1, title: "Hello".into() };
//! auditor.on_create(&article).await?;
//! # Ok(())
//! # }
//! ```

mod actor;
mod config;
mod context;
mod coordinator;
mod diff;
mod error;
mod extract;
mod middleware;
mod models;
mod projection;
mod pruner;
mod queries;
mod repository;
mod store;
mod subject;

pub use actor::{ActorChain, ActorResolver, FnResolver, Guard, GuardResolver, SessionResolver};
pub use config::{
    ActorConfig, AuditConfig, AuditTableConfig, AuditTableFields, PruningConfig, SubjectConfig,
    DEFAULT_AUDIT_TABLE, DEFAULT_GLOBAL_HIDDEN, DEFAULT_GUARDS, DEFAULT_KEEP_FOR_DAYS,
    MAX_KEEP_FOR_DAYS,
};
pub use context::{ContextProvider, RequestContext, StaticContext, TaskLocalContext};
pub use coordinator::{Auditor, Disposition, SkipReason};
pub use diff::{diff, restore, Diff, FieldChange, RestoreOutcome};
pub use error::{AuditError, AuditResult};
pub use extract::{ChangeSet, Extraction};
pub use middleware::{AuditContextLayer, USER_ID_HEADER};
pub use models::{
    AuditEntry, AuditEvent, HistoryQuery, NewAuditEntry, NewAuditEntryBuilder,
    DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT,
};
pub use projection::{project, RedactionSet};
pub use pruner::{cutoff, prune, RetentionScheduler};
pub use queries::PgAuditStore;
pub use repository::PgTableRepository;
pub use store::{AuditStore, InMemoryAuditStore};
pub use subject::{
    AuditProfile, Auditable, InMemorySubjectRepository, Registration, SubjectRegistry,
    SubjectRepository,
};
