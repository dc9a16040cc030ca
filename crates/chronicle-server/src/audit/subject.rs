//! Audited subjects: the capability an entity type implements and the
//! registry that resolves a type tag back to its storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_common::{Attributes, MorphKeyType, SubjectId};
use tokio::sync::RwLock;

use super::error::AuditResult;

/// Per-type audit policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditProfile {
    /// Redacted in addition to the global list
    pub hidden: Vec<String>,
    pub soft_deletes: bool,
    /// Column whose lone change does not produce an `updated` entry
    pub updated_at_column: Option<String>,
    pub key_type: MorphKeyType,
}

impl Default for AuditProfile {
    fn default() -> Self {
        Self {
            hidden: Vec::new(),
            soft_deletes: false,
            updated_at_column: Some("updated_at".to_string()),
            key_type: MorphKeyType::String,
        }
    }
}

impl AuditProfile {
    pub fn hidden<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn soft_deletes(mut self, enabled: bool) -> Self {
        self.soft_deletes = enabled;
        self
    }

    pub fn updated_at_column(mut self, column: Option<&str>) -> Self {
        self.updated_at_column = column.map(str::to_string);
        self
    }

    pub fn key_type(mut self, key_type: MorphKeyType) -> Self {
        self.key_type = key_type;
        self
    }
}

/// Capability of an entity type that participates in auditing.
///
/// Registration is explicit: call `Auditor::register::<T>()` at startup.
pub trait Auditable {
    /// Type tag persisted in `subject_type`
    const SUBJECT_TYPE: &'static str;

    fn subject_id(&self) -> SubjectId;

    /// Current attribute state, before redaction.
    fn audit_attributes(&self) -> Attributes;

    fn audit_profile() -> AuditProfile {
        AuditProfile::default()
    }
}

/// Live storage of one subject type, used by restore.
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Current attributes of a subject, `None` when it no longer exists.
    async fn find(&self, subject_id: &str) -> AuditResult<Option<Attributes>>;

    /// Whether `column` exists on the subject's storage schema.
    async fn has_column(&self, column: &str) -> AuditResult<bool>;

    /// Assign `values` bypassing write protection and persist; returns the
    /// updated subject, or `None` when it disappeared in the meantime.
    async fn force_fill(&self, subject_id: &str, values: &Attributes) -> AuditResult<Option<Attributes>>;
}

/// Registered subject type.
#[derive(Clone)]
pub struct Registration {
    pub profile: AuditProfile,
    pub repository: Option<Arc<dyn SubjectRepository>>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("profile", &self.profile)
            .field("repository", &self.repository.is_some())
            .finish()
    }
}

/// Maps type tags to their registration.
#[derive(Debug, Clone, Default)]
pub struct SubjectRegistry {
    entries: HashMap<String, Registration>,
}

impl SubjectRegistry {
    pub fn insert(&mut self, subject_type: impl Into<String>, registration: Registration) {
        self.entries.insert(subject_type.into(), registration);
    }

    pub fn get(&self, subject_type: &str) -> Option<&Registration> {
        self.entries.get(subject_type)
    }

    pub fn contains(&self, subject_type: &str) -> bool {
        self.entries.contains_key(subject_type)
    }

    pub fn subject_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Repository over an in-process map of rows.
#[derive(Debug, Default)]
pub struct InMemorySubjectRepository {
    columns: Vec<String>,
    rows: RwLock<HashMap<String, Attributes>>,
}

impl InMemorySubjectRepository {
    /// Create a repository whose schema has exactly `columns`.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, subject_id: impl Into<String>, row: Attributes) {
        self.rows.write().await.insert(subject_id.into(), row);
    }

    pub async fn remove(&self, subject_id: &str) -> Option<Attributes> {
        self.rows.write().await.remove(subject_id)
    }
}

#[async_trait]
impl SubjectRepository for InMemorySubjectRepository {
    async fn find(&self, subject_id: &str) -> AuditResult<Option<Attributes>> {
        Ok(self.rows.read().await.get(subject_id).cloned())
    }

    async fn has_column(&self, column: &str) -> AuditResult<bool> {
        Ok(self.columns.iter().any(|c| c == column))
    }

    async fn force_fill(&self, subject_id: &str, values: &Attributes) -> AuditResult<Option<Attributes>> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(subject_id) else {
            return Ok(None);
        };
        row.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Some(row.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_builder() {
        let profile = AuditProfile::default()
            .hidden(["api_token"])
            .soft_deletes(true)
            .updated_at_column(None)
            .key_type(MorphKeyType::Integer);

        assert_eq!(profile.hidden, vec!["api_token"]);
        assert!(profile.soft_deletes);
        assert!(profile.updated_at_column.is_none());
        assert_eq!(profile.key_type, MorphKeyType::Integer);
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = SubjectRegistry::default();
        registry.insert(
            "articles",
            Registration {
                profile: AuditProfile::default(),
                repository: None,
            },
        );

        assert!(registry.contains("articles"));
        assert!(registry.get("users").is_none());
        assert_eq!(registry.subject_types().collect::<Vec<_>>(), vec!["articles"]);
    }

    #[tokio::test]
    async fn test_in_memory_repository_force_fill() {
        let repo = InMemorySubjectRepository::new(["id", "title"]);
        repo.insert("1", [("id".to_string(), json!(1)), ("title".to_string(), json!("A"))].into())
            .await;

        let updated = repo
            .force_fill("1", &[("title".to_string(), json!("B"))].into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["title"], json!("B"));
        assert_eq!(updated["id"], json!(1));

        assert!(repo.force_fill("2", &Attributes::new()).await.unwrap().is_none());
        assert!(repo.has_column("title").await.unwrap());
        assert!(!repo.has_column("ghost").await.unwrap());
    }
}
