use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use super::{CredentialStore, StoredUser};
use crate::errors::StoreError;

/// SQLite-backed credential store.
///
/// The connection sits behind `Arc<Mutex>` and every query runs on tokio's
/// blocking pool, so synchronous SQLite I/O never ties up async workers.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    inner: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                authority TEXT NOT NULL DEFAULT '',
                api_token TEXT UNIQUE,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )
        .context("Failed to create tables")?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure with the connection on a blocking thread.
    async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("Store task panicked")?
    }

    /// Insert a user holding `token`, replacing any user with the same email.
    pub async fn upsert_user(&self, user: StoredUser, token: String) -> Result<(), StoreError> {
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO users (name, email, authority, api_token) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(email) DO UPDATE SET
                    name = excluded.name,
                    authority = excluded.authority,
                    api_token = excluded.api_token",
                params![user.name, user.email, user.authority, token],
            )?;
            Ok(())
        })
        .await
    }

    /// Clear the token of the user with this email.
    pub async fn revoke(&self, email: String) -> Result<(), StoreError> {
        self.call(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET api_token = NULL WHERE email = ?1",
                params![email],
            )?;
            if changed == 0 {
                return Err(StoreError::UserNotFound { email });
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn lookup(&self, token: &str) -> Result<Option<StoredUser>, StoreError> {
        let token = token.to_string();
        self.call(move |conn| {
            let user = conn
                .query_row(
                    "SELECT name, email, authority FROM users WHERE api_token = ?1",
                    params![token],
                    |row| {
                        Ok(StoredUser {
                            name: row.get(0)?,
                            email: row.get(1)?,
                            authority: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await
    }
}
