use std::sync::Arc;

use axum::http::StatusCode;

use super::wire::{TOKEN_REVIEW_KIND, TokenReviewRequest, TokenReviewResponse};
use crate::audit::{AuditAction, AuditEvent, AuditSink, token_fingerprint};
use crate::errors::ReviewError;
use crate::store::{CredentialStore, StoredUser};

/// Status code plus body for one review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub status: StatusCode,
    pub body: TokenReviewResponse,
}

impl ReviewOutcome {
    fn rejected(reason: ReviewError) -> Self {
        Self {
            status: reason.status_code(),
            body: TokenReviewResponse::unauthenticated(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.body.status.authenticated
    }
}

/// Answers token reviews against a read-only credential store.
///
/// Holds no mutable state of its own; one instance is shared by every
/// request handler.
pub struct TokenReviewAuthenticator {
    store: Arc<dyn CredentialStore>,
    audit: Arc<dyn AuditSink>,
}

impl TokenReviewAuthenticator {
    pub fn new(store: Arc<dyn CredentialStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Review one request. Never fails: every outcome is a response and a status.
    pub async fn review(&self, request: &TokenReviewRequest) -> ReviewOutcome {
        self.audit(AuditAction::ReviewReceived {
            kind: request.kind.clone(),
            api_version: request.api_version.clone(),
            token_fingerprint: request.token().map(token_fingerprint),
        });

        match self.resolve(request).await {
            Ok(user) => {
                tracing::info!(user = %user.name, "token review authenticated");
                self.audit(AuditAction::Authenticated {
                    name: user.name.clone(),
                    username: user.email.clone(),
                });
                ReviewOutcome {
                    status: StatusCode::OK,
                    body: TokenReviewResponse::authenticated(user.email.clone(), groups_for(&user)),
                }
            }
            Err(reason) => {
                tracing::debug!(%reason, "token review rejected");
                ReviewOutcome::rejected(reason)
            }
        }
    }

    async fn resolve(&self, request: &TokenReviewRequest) -> Result<StoredUser, ReviewError> {
        if request.kind.as_deref() != Some(TOKEN_REVIEW_KIND) {
            return Err(ReviewError::MalformedRequest);
        }
        let token = request.token().ok_or(ReviewError::MissingCredential)?;
        match self.store.lookup(token).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ReviewError::UnknownCredential),
            Err(e) => {
                tracing::warn!(error = %e, "credential lookup failed");
                Err(ReviewError::UnknownCredential)
            }
        }
    }

    fn audit(&self, action: AuditAction) {
        if let Err(e) = self.audit.record(&AuditEvent::new(action)) {
            tracing::warn!(error = %e, "failed to write audit event");
        }
    }
}

/// Group membership reported for a user. Not populated yet.
fn groups_for(_user: &StoredUser) -> Vec<String> {
    Vec::new()
}
