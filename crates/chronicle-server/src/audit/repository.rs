//! Subject repository over an arbitrary Postgres table.
//!
//! Rows travel as JSON: `to_jsonb` on read, `jsonb_populate_record` on write
//! so that Postgres casts each value to its column type.

use async_trait::async_trait;
use chronicle_common::{types::quote_identifier, Attributes, MorphKeyType};
use sqlx::{types::Json, PgPool};
use tracing::debug;

use super::config::SubjectConfig;
use super::error::AuditResult;
use super::queries::morph_sql_type;
use super::subject::SubjectRepository;

#[derive(Debug, Clone)]
pub struct PgTableRepository {
    pool: PgPool,
    table_name: String,
    table: String,
    primary_key: String,
    key_type: MorphKeyType,
}

impl PgTableRepository {
    pub fn new(
        pool: PgPool,
        table: &str,
        primary_key: &str,
        key_type: MorphKeyType,
    ) -> AuditResult<Self> {
        Ok(Self {
            pool,
            table_name: table.to_string(),
            table: quote_identifier(table)?,
            primary_key: quote_identifier(primary_key)?,
            key_type,
        })
    }

    pub fn from_config(pool: PgPool, subject: &SubjectConfig) -> AuditResult<Self> {
        Self::new(pool, &subject.table, &subject.primary_key, subject.key_type)
    }

    fn key_match(&self) -> String {
        format!("{} = CAST($1 AS {})", self.primary_key, morph_sql_type(self.key_type))
    }
}

#[async_trait]
impl SubjectRepository for PgTableRepository {
    async fn find(&self, subject_id: &str) -> AuditResult<Option<Attributes>> {
        let sql = format!(
            "SELECT to_jsonb(s) FROM {} AS s WHERE {}",
            self.table,
            self.key_match()
        );

        let row: Option<Json<Attributes>> = sqlx::query_scalar(&sql)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0))
    }

    async fn has_column(&self, column: &str) -> AuditResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.columns
                WHERE table_schema = current_schema()
                  AND table_name = $1
                  AND column_name = $2
            )
            "#,
        )
        .bind(&self.table_name)
        .bind(column)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn force_fill(&self, subject_id: &str, values: &Attributes) -> AuditResult<Option<Attributes>> {
        if values.is_empty() {
            return self.find(subject_id).await;
        }

        let columns = values
            .keys()
            .map(|k| quote_identifier(k))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let sql = format!(
            "UPDATE {table} AS s SET ({columns}) = \
             (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $2)) \
             WHERE s.{key_match} RETURNING to_jsonb(s)",
            table = self.table,
            key_match = self.key_match(),
        );

        let row: Option<Json<Attributes>> = sqlx::query_scalar(&sql)
            .bind(subject_id)
            .bind(Json(values))
            .fetch_optional(&self.pool)
            .await?;

        debug!(
            table = %self.table_name,
            subject_id,
            columns = values.len(),
            found = row.is_some(),
            "Force-filled subject"
        );

        Ok(row.map(|r| r.0))
    }
}
