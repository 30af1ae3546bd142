//! Typed error hierarchy for tokengate.
//!
//! Three top-level enums cover the three subsystems:
//! - `ReviewError`: token-review rejections (each maps to a fixed HTTP status)
//! - `BackendError`: client-side calls to the primary and identity backends
//! - `StoreError`: credential store failures on the server

use axum::http::StatusCode;
use thiserror::Error;

/// Message shown when a backend call got no response at all.
pub const UNREACHABLE_MESSAGE: &str = "server is not responding, try later";

/// Message shown when a request could not even be built or sent.
pub const CLIENT_ERROR_MESSAGE: &str = "client error";

/// Message shown when a backend issued an identity without a credential.
pub const INVALID_TOKEN_MESSAGE: &str = "invalid token";

/// Reasons a token review answers `authenticated: false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("request kind is not TokenReview")]
    MalformedRequest,

    #[error("no token supplied")]
    MissingCredential,

    #[error("token is not known")]
    UnknownCredential,
}

impl ReviewError {
    pub fn status_code(self) -> StatusCode {
        match self {
            ReviewError::MalformedRequest => StatusCode::BAD_REQUEST,
            ReviewError::MissingCredential | ReviewError::UnknownCredential => {
                StatusCode::UNAUTHORIZED
            }
        }
    }
}

/// Errors from the primary backend and the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend answered with a non-success status.
    #[error("backend responded with {status}: {message}")]
    Response { status: u16, message: String },

    /// The request went out but no response came back.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The request could not be built or sent.
    #[error("failed to construct request: {0}")]
    ClientConstruction(String),

    /// The backend returned an identity that carries no credential.
    #[error("issued identity has no credential")]
    InvalidIssuedIdentity,
}

impl BackendError {
    /// The user-facing text for this failure.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Response { message, .. } => message.clone(),
            BackendError::Unreachable(_) => UNREACHABLE_MESSAGE.to_string(),
            BackendError::ClientConstruction(_) => CLIENT_ERROR_MESSAGE.to_string(),
            BackendError::InvalidIssuedIdentity => INVALID_TOKEN_MESSAGE.to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return BackendError::ClientConstruction(err.to_string());
        }
        if let Some(status) = err.status() {
            return BackendError::Response {
                status: status.as_u16(),
                message: String::new(),
            };
        }
        BackendError::Unreachable(err.to_string())
    }
}

/// Errors from the server-side credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("User {email} not found")]
    UserNotFound { email: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.into())
    }
}
