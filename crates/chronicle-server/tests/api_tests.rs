//! HTTP API tests for the audit endpoints
//!
//! The full router runs against the in-memory store, so no database is
//! needed. These tests verify:
//! - History listing, validation and status codes
//! - Single entry lookup with its diff
//! - Restore through the API is itself audited
//! - Request context capture by the audit layer

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chronicle_server::{
    api::{create_router, AppState},
    audit::{AuditConfig, AuditEvent, Auditable},
    config::Config,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

use common::{attrs, harness, Article, Harness};

fn app(h: &Harness) -> Router {
    let state = AppState {
        db: None,
        auditor: h.auditor.clone(),
    };
    create_router(state, &Config::default())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_without_database() {
    let h = harness(AuditConfig::default());

    let (status, body) = send(app(&h), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], json!("not configured"));
}

#[tokio::test]
async fn test_history_lists_newest_first_with_diff() {
    let h = harness(AuditConfig::default());
    let mut article = Article::new(1);
    h.auditor.on_create(&article).await.unwrap();
    let prior = article.audit_attributes();
    article.title = "Edited".to_string();
    h.auditor.on_update(&article, &prior, &["title"]).await.unwrap();

    let (status, body) = send(app(&h), get("/api/v1/audits/history?model_class=articles&model_id=1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let data = &body["data"];
    assert_eq!(data["model_class"], json!("articles"));
    assert_eq!(data["model_id"], json!("1"));
    assert_eq!(data["count"], json!(2));
    assert_eq!(data["audits"][0]["event"], json!("updated"));
    assert_eq!(data["audits"][0]["diff"]["title"], json!({"old": "Original", "new": "Edited"}));
    assert_eq!(data["audits"][1]["event"], json!("created"));
}

#[tokio::test]
async fn test_history_respects_limit() {
    let h = harness(AuditConfig::default());
    let article = Article::new(1);
    h.auditor.on_create(&article).await.unwrap();
    h.auditor.on_delete(&article, true).await.unwrap();

    let (status, body) = send(
        app(&h),
        get("/api/v1/audits/history?model_class=articles&model_id=1&limit=1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], json!(1));
    assert_eq!(body["data"]["audits"][0]["event"], json!("deleted"));
}

#[tokio::test]
async fn test_history_validation_errors() {
    let h = harness(AuditConfig::default());

    for uri in [
        "/api/v1/audits/history?model_id=1",
        "/api/v1/audits/history?model_class=articles",
        "/api/v1/audits/history?model_class=articles&model_id=1&limit=0",
        "/api/v1/audits/history?model_class=articles&model_id=1&limit=201",
        "/api/v1/audits/history?model_class=articles&model_id=abc",
    ] {
        let (status, body) = send(app(&h), get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"), "{uri}");
    }
}

#[tokio::test]
async fn test_history_of_unknown_model_class_is_not_found() {
    let h = harness(AuditConfig::default());

    let (status, body) = send(app(&h), get("/api/v1/audits/history?model_class=invoices&model_id=1")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_get_entry() {
    let h = harness(AuditConfig::default());
    let entry = h
        .auditor
        .on_create(&Article::new(1))
        .await
        .unwrap()
        .entry()
        .cloned()
        .unwrap();

    let (status, body) = send(app(&h), get(&format!("/api/v1/audits/{}", entry.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["event"], json!("created"));
    assert_eq!(body["data"]["diff"]["title"]["new"], json!("Original"));

    let (status, _) = send(app(&h), get("/api/v1/audits/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_restore_through_api() {
    let h = harness(AuditConfig::default());
    h.articles
        .insert("1", attrs(&[("id", json!(1)), ("title", json!("Edited"))]))
        .await;
    let entry = h
        .auditor
        .record_manual(
            &Article::new(1),
            AuditEvent::Updated,
            attrs(&[("title", json!("Original"))]),
            attrs(&[("title", json!("Edited"))]),
        )
        .await
        .unwrap()
        .entry()
        .cloned()
        .unwrap();

    let (status, body) = send(app(&h), post(&format!("/api/v1/audits/{}/restore", entry.id))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["restored"], json!(true));
    assert_eq!(body["data"]["applied"], json!(["title"]));
    assert_eq!(body["data"]["subject"]["title"], json!("Original"));
    assert_eq!(h.store.len().await, 2);

    let (status, _) = send(app(&h), post("/api/v1/audits/999/restore")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_restore_of_deleted_subject_is_not_found() {
    let h = harness(AuditConfig::default());
    let entry = h
        .auditor
        .record_manual(
            &Article::new(5),
            AuditEvent::Updated,
            attrs(&[("title", json!("Original"))]),
            attrs(&[]),
        )
        .await
        .unwrap()
        .entry()
        .cloned()
        .unwrap();

    let (status, body) = send(app(&h), post(&format!("/api/v1/audits/{}/restore", entry.id))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("NOT_FOUND"));
}

#[tokio::test]
async fn test_untrusted_forwarded_for_is_not_recorded() {
    let h = harness(AuditConfig::default());
    h.articles
        .insert("1", attrs(&[("id", json!(1)), ("title", json!("Edited"))]))
        .await;
    let entry = h
        .auditor
        .record_manual(
            &Article::new(1),
            AuditEvent::Updated,
            attrs(&[("title", json!("Original"))]),
            attrs(&[("title", json!("Edited"))]),
        )
        .await
        .unwrap()
        .entry()
        .cloned()
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/audits/{}/restore", entry.id))
        .header("x-forwarded-for", "x".repeat(200))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::OK);

    let latest = &h.auditor.history_for(&Article::new(1), Some(1)).await.unwrap()[0];
    assert_eq!(latest.ip_address, None);
}

#[tokio::test]
async fn test_restore_records_request_context() {
    let h = harness(AuditConfig::default());
    h.articles
        .insert("1", attrs(&[("id", json!(1)), ("title", json!("Edited"))]))
        .await;
    let entry = h
        .auditor
        .record_manual(
            &Article::new(1),
            AuditEvent::Updated,
            attrs(&[("title", json!("Original"))]),
            attrs(&[("title", json!("Edited"))]),
        )
        .await
        .unwrap()
        .entry()
        .cloned()
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/audits/{}/restore", entry.id))
        .header("host", "audit.example.com")
        .header("user-agent", "integration-test")
        .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let mut config = Config::default();
    config.server.trust_forwarded_headers = true;
    let router = create_router(
        AppState {
            db: None,
            auditor: h.auditor.clone(),
        },
        &config,
    );
    let (status, _) = send(router, request).await;
    assert_eq!(status, StatusCode::OK);

    let latest = &h.auditor.history_for(&Article::new(1), Some(1)).await.unwrap()[0];
    assert_eq!(latest.ip_address.as_deref(), Some("198.51.100.4"));
    assert_eq!(latest.user_agent.as_deref(), Some("integration-test"));
    assert!(latest
        .url
        .as_deref()
        .is_some_and(|url| url.ends_with(&format!("/api/v1/audits/{}/restore", entry.id))));
}
