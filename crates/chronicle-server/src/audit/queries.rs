//! Postgres-backed audit record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_common::{types::quote_identifier, Attributes, MorphKeyType};
use sqlx::{types::Json, FromRow, PgPool};
use tracing::debug;

use super::config::AuditTableConfig;
use super::error::AuditResult;
use super::models::{AuditEntry, AuditEvent, HistoryQuery, NewAuditEntry};
use super::store::AuditStore;

/// Postgres type a subject id is cast through for the given scheme.
///
/// The cast rejects malformed keys and normalizes them (`007` to `7`, upper
/// to lower case UUIDs) so stored and looked-up ids compare equal.
pub(crate) fn morph_sql_type(key_type: MorphKeyType) -> &'static str {
    match key_type {
        MorphKeyType::String => "varchar",
        MorphKeyType::Integer => "bigint",
        MorphKeyType::Uuid => "uuid",
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: i64,
    subject_type: String,
    subject_id: String,
    event: String,
    actor_id: Option<String>,
    url: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    old_values: Option<Json<Attributes>>,
    new_values: Option<Json<Attributes>>,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            subject_type: row.subject_type,
            subject_id: row.subject_id,
            event: AuditEvent::from(row.event),
            actor_id: row.actor_id,
            url: row.url,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            old_values: row.old_values.map(|v| v.0).unwrap_or_default(),
            new_values: row.new_values.map(|v| v.0).unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

/// Statements rendered once from the configured table layout.
#[derive(Debug, Clone)]
struct Statements {
    insert: String,
    find: String,
    history: String,
    count_for_subject: String,
    delete_for_subject: String,
    delete_older_than: String,
}

impl Statements {
    fn render(table: &AuditTableConfig) -> AuditResult<Self> {
        let f = &table.fields;
        let t = quote_identifier(&table.name)?;
        let id = quote_identifier(&f.id)?;
        let subject_type = quote_identifier(&f.subject_type_column())?;
        let subject_id = quote_identifier(&f.subject_id_column())?;
        let event = quote_identifier(&f.event)?;
        let actor_id = quote_identifier(&f.actor_id)?;
        let url = quote_identifier(&f.url)?;
        let ip_address = quote_identifier(&f.ip_address)?;
        let user_agent = quote_identifier(&f.user_agent)?;
        let old_values = quote_identifier(&f.old_values)?;
        let new_values = quote_identifier(&f.new_values)?;
        let created_at = quote_identifier(&f.created_at)?;
        let updated_at = quote_identifier(&f.updated_at)?;
        let id_type = morph_sql_type(f.morph_type);

        let columns = format!(
            "{id} AS id, {subject_type} AS subject_type, {subject_id}::text AS subject_id, \
             {event} AS event, {actor_id}::text AS actor_id, {url} AS url, \
             {ip_address} AS ip_address, {user_agent} AS user_agent, \
             {old_values} AS old_values, {new_values} AS new_values, {created_at} AS created_at"
        );
        // The column may be text or the native key type, so compare as text.
        let subject_match =
            format!("{subject_type} = $1 AND {subject_id}::text = CAST($2 AS {id_type})::text");

        Ok(Self {
            insert: format!(
                "INSERT INTO {t} ({subject_type}, {subject_id}, {event}, {actor_id}, {url}, \
                 {ip_address}, {user_agent}, {old_values}, {new_values}, {created_at}, {updated_at}) \
                 VALUES ($1, CAST($2 AS {id_type}), $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) \
                 RETURNING {columns}"
            ),
            find: format!("SELECT {columns} FROM {t} WHERE {id} = $1"),
            history: format!(
                "SELECT {columns} FROM {t} WHERE {subject_match} \
                 AND ($3::text IS NULL OR {event} = $3) \
                 ORDER BY {id} DESC LIMIT $4"
            ),
            count_for_subject: format!("SELECT COUNT(*) FROM {t} WHERE {subject_match}"),
            delete_for_subject: format!("DELETE FROM {t} WHERE {subject_match}"),
            delete_older_than: format!("DELETE FROM {t} WHERE {created_at} <= $1"),
        })
    }
}

/// Audit store on a Postgres table.
#[derive(Debug, Clone)]
pub struct PgAuditStore {
    pool: PgPool,
    statements: Statements,
}

impl PgAuditStore {
    /// Create a store for the configured table; fails on unsafe identifiers.
    pub fn new(pool: PgPool, table: &AuditTableConfig) -> AuditResult<Self> {
        Ok(Self {
            pool,
            statements: Statements::render(table)?,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, entry: NewAuditEntry) -> AuditResult<AuditEntry> {
        let row = sqlx::query_as::<_, AuditRow>(&self.statements.insert)
            .bind(&entry.subject_type)
            .bind(&entry.subject_id)
            .bind(entry.event.as_str())
            .bind(&entry.actor_id)
            .bind(&entry.url)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(Json(&entry.old_values))
            .bind(Json(&entry.new_values))
            .fetch_one(&self.pool)
            .await?;

        debug!(
            audit_id = row.id,
            event = %entry.event,
            subject_type = %entry.subject_type,
            subject_id = %entry.subject_id,
            "Created audit entry"
        );

        Ok(row.into())
    }

    async fn find(&self, id: i64) -> AuditResult<Option<AuditEntry>> {
        let row = sqlx::query_as::<_, AuditRow>(&self.statements.find)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn history(&self, query: &HistoryQuery) -> AuditResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(&self.statements.history)
            .bind(&query.subject_type)
            .bind(&query.subject_id)
            .bind(query.event.as_ref().map(AuditEvent::as_str))
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(
            subject_type = %query.subject_type,
            subject_id = %query.subject_id,
            count = rows.len(),
            "Retrieved audit history"
        );

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_for_subject(&self, subject_type: &str, subject_id: &str) -> AuditResult<u64> {
        let count: i64 = sqlx::query_scalar(&self.statements.count_for_subject)
            .bind(subject_type)
            .bind(subject_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn delete_for_subject(&self, subject_type: &str, subject_id: &str) -> AuditResult<u64> {
        let result = sqlx::query(&self.statements.delete_for_subject)
            .bind(subject_type)
            .bind(subject_id)
            .execute(&self.pool)
            .await?;

        debug!(
            subject_type,
            subject_id,
            removed = result.rows_affected(),
            "Purged audit history"
        );

        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AuditResult<u64> {
        let result = sqlx::query(&self.statements.delete_older_than)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        debug!(cutoff = %cutoff, removed = result.rows_affected(), "Pruned audit entries");

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_use_configured_names() {
        let mut table = AuditTableConfig::default();
        table.name = "entity_history".to_string();
        table.fields.morph_prefix = "subject".to_string();
        table.fields.morph_type = MorphKeyType::Integer;

        let statements = Statements::render(&table).unwrap();

        assert!(statements.insert.starts_with("INSERT INTO \"entity_history\""));
        assert!(statements.history.contains("\"subject_type\" = $1"));
        assert!(statements
            .history
            .contains("\"subject_id\"::text = CAST($2 AS bigint)::text"));
        assert!(statements.insert.contains("VALUES ($1, CAST($2 AS bigint),"));
        assert!(statements.history.contains("ORDER BY \"audit_id\" DESC"));
        assert!(statements.delete_older_than.ends_with("\"created_at\" <= $1"));
    }

    #[test]
    fn test_statements_reject_unsafe_table_name() {
        let mut table = AuditTableConfig::default();
        table.name = "audits\"; DROP TABLE users; --".to_string();
        assert!(Statements::render(&table).is_err());
    }

    #[test]
    fn test_row_with_null_values_maps_to_empty_attributes() {
        let row = AuditRow {
            id: 3,
            subject_type: "articles".into(),
            subject_id: "9".into(),
            event: "deleted".into(),
            actor_id: None,
            url: None,
            ip_address: None,
            user_agent: None,
            old_values: Some(Json([("title".to_string(), serde_json::json!("A"))].into())),
            new_values: None,
            created_at: Utc::now(),
        };

        let entry = AuditEntry::from(row);
        assert_eq!(entry.event, AuditEvent::Deleted);
        assert_eq!(entry.old_values.len(), 1);
        assert!(entry.new_values.is_empty());
    }
}
