//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chronicle_common::{Attributes, MorphKeyType, SubjectId};
use chronicle_server::audit::{
    AuditConfig, AuditProfile, Auditable, Auditor, InMemoryAuditStore, InMemorySubjectRepository,
};
use serde_json::{json, Value};

/// Soft-deletable subject with an integer key and one locally hidden field.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub api_token: String,
    pub password: String,
    pub updated_at: String,
}

impl Article {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            title: "Original".to_string(),
            body: "First draft".to_string(),
            api_token: "tok-123".to_string(),
            password: "hunter2".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }
}

impl Auditable for Article {
    const SUBJECT_TYPE: &'static str = "articles";

    fn subject_id(&self) -> SubjectId {
        SubjectId::Integer(self.id)
    }

    fn audit_attributes(&self) -> Attributes {
        attrs(&[
            ("id", json!(self.id)),
            ("title", json!(self.title)),
            ("body", json!(self.body)),
            ("api_token", json!(self.api_token)),
            ("password", json!(self.password)),
            ("updated_at", json!(self.updated_at)),
        ])
    }

    fn audit_profile() -> AuditProfile {
        AuditProfile::default()
            .hidden(["api_token"])
            .soft_deletes(true)
            .key_type(MorphKeyType::Integer)
    }
}

/// Subject without soft delete support.
#[derive(Debug, Clone)]
pub struct Tag {
    pub slug: String,
    pub label: String,
}

impl Auditable for Tag {
    const SUBJECT_TYPE: &'static str = "tags";

    fn subject_id(&self) -> SubjectId {
        SubjectId::Key(self.slug.clone())
    }

    fn audit_attributes(&self) -> Attributes {
        attrs(&[("slug", json!(self.slug)), ("label", json!(self.label))])
    }
}

pub fn attrs(pairs: &[(&str, Value)]) -> Attributes {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Columns of the in-memory `articles` table.
pub const ARTICLE_COLUMNS: &[&str] = &["id", "title", "body", "api_token", "password", "updated_at"];

pub struct Harness {
    pub auditor: Arc<Auditor>,
    pub store: Arc<InMemoryAuditStore>,
    pub articles: Arc<InMemorySubjectRepository>,
}

pub fn harness(config: AuditConfig) -> Harness {
    chronicle_common::logging::init_test_logging();

    let store = Arc::new(InMemoryAuditStore::new());
    let articles = Arc::new(InMemorySubjectRepository::new(ARTICLE_COLUMNS.iter().copied()));
    let auditor = Auditor::new(Arc::new(config), store.clone())
        .register_with_repository::<Article>(articles.clone())
        .register::<Tag>();

    Harness {
        auditor: Arc::new(auditor),
        store,
        articles,
    }
}
