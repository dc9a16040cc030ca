//! Audit record store contract and the in-process implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::error::AuditResult;
use super::models::{AuditEntry, HistoryQuery, NewAuditEntry};

/// Append-only persistence of audit entries.
///
/// Implementations assign `id` in append order and never rewrite an entry.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> AuditResult<AuditEntry>;

    async fn find(&self, id: i64) -> AuditResult<Option<AuditEntry>>;

    /// Entries of one subject, newest first.
    async fn history(&self, query: &HistoryQuery) -> AuditResult<Vec<AuditEntry>>;

    async fn count_for_subject(&self, subject_type: &str, subject_id: &str) -> AuditResult<u64>;

    async fn delete_for_subject(&self, subject_type: &str, subject_id: &str) -> AuditResult<u64>;

    /// Delete every entry with `created_at <= cutoff`.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AuditResult<u64>;
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<AuditEntry>,
    next_id: i64,
}

/// Store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    inner: RwLock<Inner>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append with an explicit capture time.
    pub async fn append_at(&self, entry: NewAuditEntry, created_at: DateTime<Utc>) -> AuditEntry {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let entry = entry.into_entry(inner.next_id, created_at);
        inner.entries.push(entry.clone());
        entry
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: NewAuditEntry) -> AuditResult<AuditEntry> {
        Ok(self.append_at(entry, Utc::now()).await)
    }

    async fn find(&self, id: i64) -> AuditResult<Option<AuditEntry>> {
        let inner = self.inner.read().await;
        Ok(inner.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn history(&self, query: &HistoryQuery) -> AuditResult<Vec<AuditEntry>> {
        let inner = self.inner.read().await;
        let limit = query
            .limit
            .map(|l| usize::try_from(l.max(0)).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(inner
            .entries
            .iter()
            .rev()
            .filter(|e| e.subject_type == query.subject_type && e.subject_id == query.subject_id)
            .filter(|e| query.event.as_ref().map_or(true, |event| &e.event == event))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_for_subject(&self, subject_type: &str, subject_id: &str) -> AuditResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.subject_type == subject_type && e.subject_id == subject_id)
            .count() as u64)
    }

    async fn delete_for_subject(&self, subject_type: &str, subject_id: &str) -> AuditResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|e| !(e.subject_type == subject_type && e.subject_id == subject_id));
        Ok((before - inner.entries.len()) as u64)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AuditResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|e| e.created_at > cutoff);
        Ok((before - inner.entries.len()) as u64)
    }
}
