use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub mod logger;
pub use logger::JsonlAuditLog;

/// Append-only destination for audit events.
///
/// Callers treat recording as best-effort: an `Err` is logged and dropped,
/// it never changes the outcome of the operation being audited.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Sink that discards everything.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: &AuditEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    /// A review request arrived, before any validation.
    ReviewReceived {
        kind: Option<String>,
        api_version: Option<String>,
        token_fingerprint: Option<String>,
    },
    /// A token resolved to a user.
    Authenticated { name: String, username: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub action: AuditAction,
}

impl AuditEvent {
    pub fn new(action: AuditAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            ts: Utc::now(),
            action,
        }
    }
}

/// Short SHA-256 fingerprint of a token, safe to write to logs.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}
