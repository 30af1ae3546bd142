use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::audit::{AuditSink, JsonlAuditLog};
use crate::review::{TokenReviewAuthenticator, TokenReviewRequest};
use crate::store::SqliteCredentialStore;

/// Configuration for the webhook server.
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub audit_log: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = crate::config::ServerSection::default();
        Self {
            bind: defaults.bind,
            port: defaults.port,
            db_path: defaults.db_path,
            audit_log: defaults.audit_log,
        }
    }
}

impl From<&crate::config::ServerSection> for ServerConfig {
    fn from(section: &crate::config::ServerSection) -> Self {
        Self {
            bind: section.bind.clone(),
            port: section.port,
            db_path: section.db_path.clone(),
            audit_log: section.audit_log.clone(),
        }
    }
}

/// Build the router: `POST /authenticate` and `GET /health`.
pub fn build_router(authenticator: Arc<TokenReviewAuthenticator>) -> Router {
    Router::new()
        .route("/authenticate", post(authenticate))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(authenticator)
}

/// A body that is not a review object is treated as one with no fields,
/// which the authenticator rejects as malformed.
async fn authenticate(
    State(authenticator): State<Arc<TokenReviewAuthenticator>>,
    body: Bytes,
) -> impl IntoResponse {
    let request: TokenReviewRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "unparseable review body");
        TokenReviewRequest::default()
    });
    let outcome = authenticator.review(&request).await;
    (outcome.status, Json(outcome.body))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Open the store and audit log, then serve until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let store = SqliteCredentialStore::open(&config.db_path)
        .context("Failed to open credential database")?;
    let audit: Arc<dyn AuditSink> = Arc::new(
        JsonlAuditLog::open(&config.audit_log).context("Failed to open audit log")?,
    );
    let authenticator = Arc::new(TokenReviewAuthenticator::new(Arc::new(store), audit));

    let app = build_router(authenticator);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, db = %config.db_path.display(), "token review webhook listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
