//! Lifecycle coordinator
//!
//! `Auditor` is bound to the create/update/delete/restore transitions of
//! every registered subject type. For each transition it applies the
//! configured policy, extracts the change set, redacts it and appends one
//! entry. Auditing never fails the observed operation on policy grounds:
//! disabled or non-whitelisted events come back as `Disposition::Skipped`.
//! Only store failures are returned as errors, and they are not retried.

use std::sync::Arc;

use chronicle_common::{Attributes, SubjectId};
use tracing::{debug, warn};

use super::actor::ActorChain;
use super::config::AuditConfig;
use super::context::{ContextProvider, TaskLocalContext};
use super::diff::{self, RestoreOutcome};
use super::error::{AuditError, AuditResult};
use super::extract::{self, ChangeSet, Extraction};
use super::models::{AuditEntry, AuditEvent, HistoryQuery, NewAuditEntry};
use super::projection::{project, RedactionSet};
use super::store::AuditStore;
use super::subject::{AuditProfile, Auditable, Registration, SubjectRegistry, SubjectRepository};

/// What the coordinator did with a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Recorded(AuditEntry),
    /// History of a hard-deleted subject was removed
    Purged { removed: u64 },
    Skipped(SkipReason),
}

impl Disposition {
    pub fn entry(&self) -> Option<&AuditEntry> {
        match self {
            Self::Recorded(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    CreateAuditingDisabled,
    UpdateAuditingDisabled,
    /// Nothing changed, or only the automatic timestamp
    NoMaterialChange,
    EventNotAllowed,
    UnregisteredSubject,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAuditingDisabled => "create_auditing_disabled",
            Self::UpdateAuditingDisabled => "update_auditing_disabled",
            Self::NoMaterialChange => "no_material_change",
            Self::EventNotAllowed => "event_not_allowed",
            Self::UnregisteredSubject => "unregistered_subject",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Auditor {
    config: Arc<AuditConfig>,
    store: Arc<dyn AuditStore>,
    registry: SubjectRegistry,
    actors: ActorChain,
    context: Arc<dyn ContextProvider>,
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("actors", &self.actors)
            .finish_non_exhaustive()
    }
}

impl Auditor {
    /// Create an auditor that resolves actors from the request session and
    /// reads request metadata from the task-local context.
    pub fn new(config: Arc<AuditConfig>, store: Arc<dyn AuditStore>) -> Self {
        Self {
            config,
            store,
            registry: SubjectRegistry::default(),
            actors: ActorChain::session_only(),
            context: Arc::new(TaskLocalContext),
        }
    }

    pub fn with_actors(mut self, actors: ActorChain) -> Self {
        self.actors = actors;
        self
    }

    pub fn with_context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = context;
        self
    }

    /// Register an entity type for lifecycle auditing.
    pub fn register<T: Auditable>(self) -> Self {
        self.register_subject(T::SUBJECT_TYPE, T::audit_profile(), None)
    }

    /// Register an entity type together with the storage used to restore it.
    pub fn register_with_repository<T: Auditable>(self, repository: Arc<dyn SubjectRepository>) -> Self {
        self.register_subject(T::SUBJECT_TYPE, T::audit_profile(), Some(repository))
    }

    /// Register a subject type by tag, for types without a Rust model.
    pub fn register_subject(
        mut self,
        subject_type: impl Into<String>,
        profile: AuditProfile,
        repository: Option<Arc<dyn SubjectRepository>>,
    ) -> Self {
        let subject_type = subject_type.into();
        debug!(subject_type = %subject_type, restorable = repository.is_some(), "Registered audit subject");
        self.registry.insert(subject_type, Registration { profile, repository });
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn AuditStore> {
        self.store.clone()
    }

    pub fn profile(&self, subject_type: &str) -> Option<&AuditProfile> {
        self.registry.get(subject_type).map(|r| &r.profile)
    }

    // ========================================================================
    // Lifecycle transitions
    // ========================================================================

    pub async fn on_create<T: Auditable>(&self, entity: &T) -> AuditResult<Disposition> {
        if !self.config.audit_on_create {
            return Ok(self.skip::<T>(AuditEvent::Created, SkipReason::CreateAuditingDisabled));
        }

        let changes = extract::created(&entity.audit_attributes());
        self.record_event(T::SUBJECT_TYPE, &entity.subject_id(), AuditEvent::Created, changes)
            .await
    }

    /// `prior` is the state before the save; `changed_keys` comes from the
    /// caller's dirty tracking.
    pub async fn on_update<T, K>(&self, entity: &T, prior: &Attributes, changed_keys: &[K]) -> AuditResult<Disposition>
    where
        T: Auditable,
        K: AsRef<str>,
    {
        if !self.config.audit_on_update {
            return Ok(self.skip::<T>(AuditEvent::Updated, SkipReason::UpdateAuditingDisabled));
        }
        let Some(profile) = self.profile(T::SUBJECT_TYPE) else {
            return Ok(self.skip::<T>(AuditEvent::Updated, SkipReason::UnregisteredSubject));
        };

        let current = entity.audit_attributes();
        match extract::updated(prior, &current, changed_keys, profile.updated_at_column.as_deref()) {
            Extraction::Suppress => Ok(self.skip::<T>(AuditEvent::Updated, SkipReason::NoMaterialChange)),
            Extraction::Record(changes) => {
                self.record_event(T::SUBJECT_TYPE, &entity.subject_id(), AuditEvent::Updated, changes)
                    .await
            },
        }
    }

    /// A soft delete is honored only for types whose profile supports it;
    /// otherwise the delete is treated as permanent.
    pub async fn on_delete<T: Auditable>(&self, entity: &T, soft: bool) -> AuditResult<Disposition> {
        let Some(profile) = self.profile(T::SUBJECT_TYPE) else {
            return Ok(self.skip::<T>(AuditEvent::Deleted, SkipReason::UnregisteredSubject));
        };

        let subject_id = entity.subject_id();
        let changes = extract::deleted(&entity.audit_attributes());

        if soft && profile.soft_deletes {
            return self
                .record_event(T::SUBJECT_TYPE, &subject_id, AuditEvent::Deleted, changes)
                .await;
        }

        if self.config.remove_on_delete {
            let key = subject_id.storage_key();
            let removed = self.store.delete_for_subject(T::SUBJECT_TYPE, &key).await?;
            debug!(
                subject_type = T::SUBJECT_TYPE,
                subject_id = %key,
                removed,
                "Purged audit history of deleted subject"
            );
            return Ok(Disposition::Purged { removed });
        }

        self.record_event(T::SUBJECT_TYPE, &subject_id, AuditEvent::Deleted, changes)
            .await
    }

    pub async fn on_restore<T: Auditable>(&self, entity: &T) -> AuditResult<Disposition> {
        let changes = extract::restored(&entity.audit_attributes());
        self.record_event(T::SUBJECT_TYPE, &entity.subject_id(), AuditEvent::Restored, changes)
            .await
    }

    /// Record an arbitrary event outside the standard lifecycle.
    ///
    /// The event must still be whitelisted and both maps are redacted.
    pub async fn record_manual<T: Auditable>(
        &self,
        entity: &T,
        event: impl Into<AuditEvent>,
        old_values: Attributes,
        new_values: Attributes,
    ) -> AuditResult<Disposition> {
        let changes = ChangeSet {
            old_values,
            new_values,
        };
        self.record_event(T::SUBJECT_TYPE, &entity.subject_id(), event.into(), changes)
            .await
    }

    /// Redact and append one entry for a registered subject.
    pub async fn record_event(
        &self,
        subject_type: &str,
        subject_id: &SubjectId,
        event: AuditEvent,
        changes: ChangeSet,
    ) -> AuditResult<Disposition> {
        if !self.config.allows(&event) {
            if self.config.debug {
                warn!(
                    event = %event,
                    subject_type,
                    allowed = ?self.config.events,
                    "Audit event is not whitelisted; entry dropped"
                );
            }
            return Ok(Disposition::Skipped(SkipReason::EventNotAllowed));
        }

        let Some(registration) = self.registry.get(subject_type) else {
            debug!(subject_type, event = %event, "Subject type is not registered for auditing");
            return Ok(Disposition::Skipped(SkipReason::UnregisteredSubject));
        };

        let redaction = RedactionSet::new(&self.config.global_hidden, &registration.profile.hidden);
        let actor_id = self.actors.resolve().await;

        let draft = NewAuditEntry::builder()
            .subject(subject_type, subject_id.storage_key())
            .event(event)
            .actor_id(actor_id)
            .context(self.context.current())
            .old_values(project(&changes.old_values, &redaction))
            .new_values(project(&changes.new_values, &redaction))
            .build()
            .map_err(AuditError::store)?;

        let entry = self.store.append(draft).await?;

        debug!(
            audit_id = entry.id,
            event = %entry.event,
            subject_type = %entry.subject_type,
            subject_id = %entry.subject_id,
            actor_id = ?entry.actor_id,
            "Recorded audit entry"
        );

        Ok(Disposition::Recorded(entry))
    }

    fn skip<T: Auditable>(&self, event: AuditEvent, reason: SkipReason) -> Disposition {
        debug!(subject_type = T::SUBJECT_TYPE, event = %event, reason = %reason, "Skipped audit entry");
        Disposition::Skipped(reason)
    }

    // ========================================================================
    // History
    // ========================================================================

    pub async fn query_history(&self, query: &HistoryQuery) -> AuditResult<Vec<AuditEntry>> {
        self.store.history(query).await
    }

    /// Full history of `entity`, newest first.
    pub async fn history_for<T: Auditable>(&self, entity: &T, limit: Option<i64>) -> AuditResult<Vec<AuditEntry>> {
        self.event_history(entity, None, limit).await
    }

    pub async fn created_history<T: Auditable>(&self, entity: &T) -> AuditResult<Vec<AuditEntry>> {
        self.event_history(entity, Some(AuditEvent::Created), None).await
    }

    pub async fn updated_history<T: Auditable>(&self, entity: &T) -> AuditResult<Vec<AuditEntry>> {
        self.event_history(entity, Some(AuditEvent::Updated), None).await
    }

    pub async fn deleted_history<T: Auditable>(&self, entity: &T) -> AuditResult<Vec<AuditEntry>> {
        self.event_history(entity, Some(AuditEvent::Deleted), None).await
    }

    pub async fn restored_history<T: Auditable>(&self, entity: &T) -> AuditResult<Vec<AuditEntry>> {
        self.event_history(entity, Some(AuditEvent::Restored), None).await
    }

    async fn event_history<T: Auditable>(
        &self,
        entity: &T,
        event: Option<AuditEvent>,
        limit: Option<i64>,
    ) -> AuditResult<Vec<AuditEntry>> {
        let query = HistoryQuery {
            subject_type: T::SUBJECT_TYPE.to_string(),
            subject_id: entity.subject_id().storage_key(),
            event,
            limit,
        };
        self.store.history(&query).await
    }

    pub async fn find_entry(&self, id: i64) -> AuditResult<Option<AuditEntry>> {
        self.store.find(id).await
    }

    // ========================================================================
    // Restore
    // ========================================================================

    /// Apply `entry.old_values` to the live subject and record the resulting
    /// change as an `updated` entry.
    pub async fn restore_entry(&self, entry: &AuditEntry) -> AuditResult<RestoreOutcome> {
        let Some(repository) = self
            .registry
            .get(&entry.subject_type)
            .and_then(|r| r.repository.clone())
        else {
            debug!(
                audit_id = entry.id,
                subject_type = %entry.subject_type,
                "No repository registered for subject type"
            );
            return Ok(RestoreOutcome::NotFound);
        };

        let outcome = diff::restore(entry, repository.as_ref()).await?;

        if let RestoreOutcome::Restored { subject, previous, .. } = &outcome {
            match self.record_restore_update(entry, previous, subject).await {
                Ok(disposition) => {
                    debug!(audit_id = entry.id, recorded = disposition.is_recorded(), "Restore audited");
                },
                Err(e) => warn!(
                    audit_id = entry.id,
                    subject_type = %entry.subject_type,
                    subject_id = %entry.subject_id,
                    error = %e,
                    "Subject restored but the restore could not be audited"
                ),
            }
        }

        Ok(outcome)
    }

    async fn record_restore_update(
        &self,
        entry: &AuditEntry,
        previous: &Attributes,
        subject: &Attributes,
    ) -> AuditResult<Disposition> {
        if !self.config.audit_on_update {
            return Ok(Disposition::Skipped(SkipReason::UpdateAuditingDisabled));
        }
        let updated_at_column = self
            .profile(&entry.subject_type)
            .and_then(|p| p.updated_at_column.clone());

        let changed = extract::changed_keys(previous, subject);
        match extract::updated(previous, subject, &changed, updated_at_column.as_deref()) {
            Extraction::Suppress => Ok(Disposition::Skipped(SkipReason::NoMaterialChange)),
            Extraction::Record(changes) => {
                let subject_id = SubjectId::Key(entry.subject_id.clone());
                self.record_event(&entry.subject_type, &subject_id, AuditEvent::Updated, changes)
                    .await
            },
        }
    }
}
