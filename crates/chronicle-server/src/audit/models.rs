//! Audit data models

use chrono::{DateTime, Utc};
use chronicle_common::Attributes;
use serde::{Deserialize, Serialize};

use super::context::RequestContext;

// ============================================================================
// Audit Query Constants
// ============================================================================

/// Default number of entries returned by the read surface.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Maximum number of entries the read surface may return in one call.
pub const MAX_HISTORY_LIMIT: i64 = 200;

/// Kind of lifecycle event captured by an entry.
///
/// The four lifecycle kinds are built in; anything else is carried as
/// `Custom` and must still appear in the configured whitelist to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuditEvent {
    Created,
    Updated,
    Deleted,
    Restored,
    Custom(String),
}

impl AuditEvent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Restored => "restored",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for AuditEvent {
    fn from(name: &str) -> Self {
        match name {
            "created" => Self::Created,
            "updated" => Self::Updated,
            "deleted" => Self::Deleted,
            "restored" => Self::Restored,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for AuditEvent {
    fn from(name: String) -> Self {
        match name.as_str() {
            "created" | "updated" | "deleted" | "restored" => Self::from(name.as_str()),
            _ => Self::Custom(name),
        }
    }
}

impl From<AuditEvent> for String {
    fn from(event: AuditEvent) -> Self {
        match event {
            AuditEvent::Custom(name) => name,
            builtin => builtin.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit entry as persisted.
///
/// Entries are never mutated after `append`; `id` is the ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    /// Type tag of the audited entity
    pub subject_type: String,
    /// Storage key of the audited entity (see `SubjectId::storage_key`)
    pub subject_id: String,
    pub event: AuditEvent,
    /// Acting user, `None` for system or anonymous changes
    pub actor_id: Option<String>,
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub old_values: Attributes,
    pub new_values: Attributes,
    pub created_at: DateTime<Utc>,
}

/// Draft of an entry handed to an `AuditStore`; the store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub subject_type: String,
    pub subject_id: String,
    pub event: AuditEvent,
    pub actor_id: Option<String>,
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub old_values: Attributes,
    pub new_values: Attributes,
}

impl NewAuditEntry {
    /// Create a builder for constructing audit drafts
    pub fn builder() -> NewAuditEntryBuilder {
        NewAuditEntryBuilder::default()
    }

    /// Materialize the draft with store-assigned fields.
    pub fn into_entry(self, id: i64, created_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id,
            subject_type: self.subject_type,
            subject_id: self.subject_id,
            event: self.event,
            actor_id: self.actor_id,
            url: self.url,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            old_values: self.old_values,
            new_values: self.new_values,
            created_at,
        }
    }
}

/// Builder for audit drafts
#[derive(Debug, Clone, Default)]
pub struct NewAuditEntryBuilder {
    subject_type: Option<String>,
    subject_id: Option<String>,
    event: Option<AuditEvent>,
    actor_id: Option<String>,
    context: RequestContext,
    old_values: Attributes,
    new_values: Attributes,
}

impl NewAuditEntryBuilder {
    pub fn subject(mut self, subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        self.subject_type = Some(subject_type.into());
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn event(mut self, event: impl Into<AuditEvent>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn actor_id(mut self, actor_id: Option<String>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn old_values(mut self, values: Attributes) -> Self {
        self.old_values = values;
        self
    }

    pub fn new_values(mut self, values: Attributes) -> Self {
        self.new_values = values;
        self
    }

    /// Build the draft, failing when the subject or event is missing
    pub fn build(self) -> Result<NewAuditEntry, &'static str> {
        let subject_type = self.subject_type.ok_or("subject is required")?;
        let subject_id = self.subject_id.ok_or("subject is required")?;
        let event = self.event.ok_or("event is required")?;

        Ok(NewAuditEntry {
            subject_type,
            subject_id,
            event,
            actor_id: self.actor_id,
            url: self.context.url,
            ip_address: self.context.ip_address,
            user_agent: self.context.user_agent,
            old_values: self.old_values,
            new_values: self.new_values,
        })
    }
}

/// History lookup for a single subject, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryQuery {
    pub subject_type: String,
    pub subject_id: String,
    /// Only return entries of this event kind
    pub event: Option<AuditEvent>,
    /// Maximum number of entries; `None` returns the whole history
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn new(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            event: None,
            limit: None,
        }
    }

    pub fn event(mut self, event: impl Into<AuditEvent>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_as_str() {
        assert_eq!(AuditEvent::Created.as_str(), "created");
        assert_eq!(AuditEvent::Restored.as_str(), "restored");
        assert_eq!(AuditEvent::from("published"), AuditEvent::Custom("published".into()));
        assert_eq!(AuditEvent::from("deleted".to_string()), AuditEvent::Deleted);
    }

    #[test]
    fn test_event_serializes_as_plain_string() {
        let json = serde_json::to_string(&AuditEvent::Updated).unwrap();
        assert_eq!(json, r#""updated""#);

        let event: AuditEvent = serde_json::from_str(r#""archived""#).unwrap();
        assert_eq!(event, AuditEvent::Custom("archived".into()));
    }

    #[test]
    fn test_builder_copies_request_context() {
        let context = RequestContext {
            url: Some("https://app.test/articles/1".into()),
            ip_address: Some("10.0.0.7".into()),
            user_agent: Some("curl/8.0".into()),
            actor_id: None,
        };

        let draft = NewAuditEntry::builder()
            .subject("articles", "1")
            .event(AuditEvent::Created)
            .actor_id(Some("42".into()))
            .context(context)
            .new_values([("title".to_string(), json!("Hello"))].into())
            .build()
            .unwrap();

        assert_eq!(draft.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(draft.actor_id.as_deref(), Some("42"));
        assert!(draft.old_values.is_empty());
    }

    #[test]
    fn test_builder_requires_subject_and_event() {
        assert_eq!(
            NewAuditEntry::builder().event("created").build().unwrap_err(),
            "subject is required"
        );
        assert_eq!(
            NewAuditEntry::builder().subject("articles", "1").build().unwrap_err(),
            "event is required"
        );
    }
}
