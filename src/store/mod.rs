//! Server-side credential store: maps an opaque token to the user it belongs to.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::StoreError;

pub mod sqlite;
pub use sqlite::SqliteCredentialStore;

/// User a token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub name: String,
    pub email: String,
    pub authority: String,
}

/// Read-only token lookup used by the token-review authenticator.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact-match lookup. `Ok(None)` means the token is not known.
    async fn lookup(&self, token: &str) -> Result<Option<StoredUser>, StoreError>;
}

/// In-memory store, for tests and static deployments.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    tokens: HashMap<String, StoredUser>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, user: StoredUser) -> Self {
        self.tokens.insert(token.to_string(), user);
        self
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup(&self, token: &str) -> Result<Option<StoredUser>, StoreError> {
        Ok(self.tokens.get(token).cloned())
    }
}
