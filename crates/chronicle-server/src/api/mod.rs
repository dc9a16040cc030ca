pub mod response;

use crate::audit::{AuditContextLayer, Auditor};
use crate::config::Config;
use crate::db;
use crate::error::{ApiResult, AppError};
use crate::features;
use crate::middleware;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::{future::Future, net::SocketAddr, sync::Arc};

#[derive(Clone)]
pub struct AppState {
    /// Absent when the auditor runs on an in-memory store
    pub db: Option<PgPool>,
    pub auditor: Arc<Auditor>,
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(config: &Config, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state, config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server shut down gracefully");

    Ok(())
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let feature_state = features::FeatureState {
        auditor: state.auditor.clone(),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
        .nest("/api/v1", features::router(feature_state))
        // Apply layers from innermost to outermost
        .layer(
            AuditContextLayer::new(config.audit.user.trust_request_header)
                .trust_forwarded_headers(config.server.trust_forwarded_headers),
        )
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Chronicle Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(State(state): State<AppState>) -> ApiResult<Response> {
    let database = match &state.db {
        Some(pool) => {
            db::health_check(pool)
                .await
                .map_err(|e| AppError::Unavailable(format!("database check failed: {e}")))?;
            "connected"
        },
        None => "not configured",
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "database": database
        })),
    )
        .into_response())
}
