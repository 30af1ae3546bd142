//! Local token review: `tokengate review <token>`.

use std::sync::Arc;

use anyhow::{Context, Result};

use tokengate::audit::NullAuditSink;
use tokengate::config::TokengateConfig;
use tokengate::review::{TokenReviewAuthenticator, TokenReviewRequest};
use tokengate::store::SqliteCredentialStore;

pub async fn cmd_review(config: &TokengateConfig, token: &str) -> Result<()> {
    let store = SqliteCredentialStore::open(&config.server.db_path)
        .context("Failed to open credential database")?;
    let authenticator = TokenReviewAuthenticator::new(Arc::new(store), Arc::new(NullAuditSink));

    let outcome = authenticator
        .review(&TokenReviewRequest::for_token(token))
        .await;

    eprintln!("HTTP {}", outcome.status);
    println!("{}", serde_json::to_string_pretty(&outcome.body)?);
    Ok(())
}
