//! Audit engine configuration

use chronicle_common::{types::validate_identifier, ChronicleError, MorphKeyType};
use serde::{Deserialize, Serialize};

use super::models::AuditEvent;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_AUDIT_TABLE: &str = "model_audits";
pub const DEFAULT_KEEP_FOR_DAYS: i64 = 90;
/// Longest retention window accepted, one hundred years.
pub const MAX_KEEP_FOR_DAYS: i64 = 36_500;
pub const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 86_400;

/// Attribute names redacted from every entry regardless of subject type.
pub const DEFAULT_GLOBAL_HIDDEN: &[&str] = &[
    "password",
    "password_confirmation",
    "remember_token",
    "secret",
    "credit_card_number",
];

/// Authentication guards consulted, in order, when resolving the actor.
pub const DEFAULT_GUARDS: &[&str] = &["web", "api", "sanctum"];

/// Behavior of the audit engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Whitelist of event kinds that may be recorded
    pub events: Vec<AuditEvent>,
    /// Attribute names redacted from every subject type
    pub global_hidden: Vec<String>,
    pub audit_on_create: bool,
    pub audit_on_update: bool,
    /// Purge a subject's history on hard delete instead of recording `deleted`
    pub remove_on_delete: bool,
    /// Log skipped events that were filtered by the whitelist
    pub debug: bool,
    pub pruning: PruningConfig,
    pub table: AuditTableConfig,
    pub user: ActorConfig,
    /// Subject types backed by SQL tables, registered at startup
    pub subjects: Vec<SubjectConfig>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            events: vec![
                AuditEvent::Created,
                AuditEvent::Updated,
                AuditEvent::Deleted,
                AuditEvent::Restored,
            ],
            global_hidden: DEFAULT_GLOBAL_HIDDEN.iter().map(|s| s.to_string()).collect(),
            audit_on_create: true,
            audit_on_update: true,
            remove_on_delete: true,
            debug: false,
            pruning: PruningConfig::default(),
            table: AuditTableConfig::default(),
            user: ActorConfig::default(),
            subjects: Vec::new(),
        }
    }
}

impl AuditConfig {
    /// Whether `event` is in the whitelist.
    pub fn allows(&self, event: &AuditEvent) -> bool {
        self.events.contains(event)
    }

    /// Validate identifiers and retention settings.
    pub fn validate(&self) -> Result<(), ChronicleError> {
        self.table.validate()?;

        if !(0..=MAX_KEEP_FOR_DAYS).contains(&self.pruning.keep_for_days) {
            return Err(ChronicleError::config(format!(
                "audit.pruning.keep_for_days must be between 0 and {MAX_KEEP_FOR_DAYS}, got {}",
                self.pruning.keep_for_days
            )));
        }
        if self.pruning.interval_secs == 0 {
            return Err(ChronicleError::config("audit.pruning.interval_secs must be positive"));
        }

        for subject in &self.subjects {
            subject.validate()?;
        }

        Ok(())
    }
}

/// Retention settings for the pruning job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    pub enabled: bool,
    pub keep_for_days: i64,
    /// Seconds between background pruning runs
    pub interval_secs: u64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keep_for_days: DEFAULT_KEEP_FOR_DAYS,
            interval_secs: DEFAULT_PRUNE_INTERVAL_SECS,
        }
    }
}

/// Physical layout of the audit table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditTableConfig {
    pub name: String,
    pub fields: AuditTableFields,
}

impl Default for AuditTableConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AUDIT_TABLE.to_string(),
            fields: AuditTableFields::default(),
        }
    }
}

impl AuditTableConfig {
    fn validate(&self) -> Result<(), ChronicleError> {
        validate_identifier(&self.name)?;
        let f = &self.fields;
        for name in [
            &f.id,
            &f.actor_id,
            &f.event,
            &f.morph_prefix,
            &f.url,
            &f.ip_address,
            &f.user_agent,
            &f.old_values,
            &f.new_values,
            &f.created_at,
            &f.updated_at,
        ] {
            validate_identifier(name)?;
        }
        validate_identifier(&f.subject_type_column())?;
        validate_identifier(&f.subject_id_column())?;
        Ok(())
    }
}

/// Column names of the audit table.
///
/// The subject columns are derived from `morph_prefix` as `<prefix>_type`
/// and `<prefix>_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditTableFields {
    pub id: String,
    pub actor_id: String,
    pub event: String,
    pub morph_prefix: String,
    /// Column type of `<prefix>_id`
    pub morph_type: MorphKeyType,
    pub url: String,
    pub ip_address: String,
    pub user_agent: String,
    pub old_values: String,
    pub new_values: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Default for AuditTableFields {
    fn default() -> Self {
        Self {
            id: "audit_id".to_string(),
            actor_id: "user_id".to_string(),
            event: "event".to_string(),
            morph_prefix: "auditable".to_string(),
            morph_type: MorphKeyType::String,
            url: "url".to_string(),
            ip_address: "ip_address".to_string(),
            user_agent: "user_agent".to_string(),
            old_values: "old_values".to_string(),
            new_values: "new_values".to_string(),
            created_at: "created_at".to_string(),
            updated_at: "updated_at".to_string(),
        }
    }
}

impl AuditTableFields {
    pub fn subject_type_column(&self) -> String {
        format!("{}_type", self.morph_prefix)
    }

    pub fn subject_id_column(&self) -> String {
        format!("{}_id", self.morph_prefix)
    }
}

/// Actor resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Guard names tried in order; the first authenticated guard wins
    pub guards: Vec<String>,
    /// Accept the `x-user-id` request header as the session actor
    pub trust_request_header: bool,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            guards: DEFAULT_GUARDS.iter().map(|s| s.to_string()).collect(),
            trust_request_header: false,
        }
    }
}

/// A subject type whose rows live in a Postgres table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectConfig {
    pub subject_type: String,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub key_type: MorphKeyType,
    /// Attribute names redacted for this type only
    #[serde(default)]
    pub hidden: Vec<String>,
    #[serde(default)]
    pub soft_deletes: bool,
    /// Timestamp column ignored when deciding whether an update is material
    #[serde(default = "default_updated_at_column")]
    pub updated_at_column: Option<String>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_updated_at_column() -> Option<String> {
    Some("updated_at".to_string())
}

impl SubjectConfig {
    fn validate(&self) -> Result<(), ChronicleError> {
        if self.subject_type.trim().is_empty() {
            return Err(ChronicleError::config("audit.subjects[].subject_type must not be empty"));
        }
        validate_identifier(&self.table)?;
        validate_identifier(&self.primary_key)?;
        Ok(())
    }
}
