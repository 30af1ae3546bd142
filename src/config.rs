//! Configuration loaded from `tokengate.toml`.
//!
//! Layered the usual way: file → environment → CLI flags. A missing file
//! yields the defaults below.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1"
//! port = 8089
//! db_path = ".tokengate/credentials.db"
//! audit_log = ".tokengate/audit/token-review.jsonl"
//! log_dir = ".tokengate/logs"
//!
//! [client]
//! primary_url = "http://127.0.0.1:8000"
//! identity_api_url = "https://k8s.example.org:6443"
//! identity_api_prefix = "/apis/apps.edgenet.io/v1alpha"
//! request_timeout_secs = 30
//! logout_policy = "retain"
//!
//! [client.paths]
//! login = "/login"
//! whoami = "/api/user"
//! logout = "/logout"
//! password_email = "/password/email"
//! password_reset = "/password/reset"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "tokengate.toml";
pub const ENV_DB_PATH: &str = "TOKENGATE_DB";
pub const ENV_IDENTITY_API: &str = "TOKENGATE_IDENTITY_API";

/// What a failed logout does to the stored credential.
///
/// | Policy           | Logout succeeds | Logout fails          |
/// |------------------|-----------------|-----------------------|
/// | `Retain`         | cleared         | kept in storage       |
/// | `ClearOnFailure` | cleared         | cleared as well       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutPolicy {
    #[default]
    Retain,
    ClearOnFailure,
}

impl std::fmt::Display for LogoutPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogoutPolicy::Retain => write!(f, "retain"),
            LogoutPolicy::ClearOnFailure => write!(f, "clear_on_failure"),
        }
    }
}

impl std::str::FromStr for LogoutPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "retain" => Ok(LogoutPolicy::Retain),
            "clear_on_failure" => Ok(LogoutPolicy::ClearOnFailure),
            _ => anyhow::bail!(
                "Invalid logout policy '{}'. Valid values: retain, clear_on_failure",
                s
            ),
        }
    }
}

/// Webhook server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,
    /// When set, logs are also written to a daily-rolling file here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8089
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".tokengate/credentials.db")
}

fn default_audit_log() -> PathBuf {
    PathBuf::from(".tokengate/audit/token-review.jsonl")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            db_path: default_db_path(),
            audit_log: default_audit_log(),
            log_dir: None,
        }
    }
}

/// Primary backend endpoint paths, relative to `primary_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_login_path")]
    pub login: String,
    #[serde(default = "default_whoami_path")]
    pub whoami: String,
    #[serde(default = "default_logout_path")]
    pub logout: String,
    #[serde(default = "default_password_email_path")]
    pub password_email: String,
    #[serde(default = "default_password_reset_path")]
    pub password_reset: String,
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_whoami_path() -> String {
    "/api/user".to_string()
}

fn default_logout_path() -> String {
    "/logout".to_string()
}

fn default_password_email_path() -> String {
    "/password/email".to_string()
}

fn default_password_reset_path() -> String {
    "/password/reset".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            login: default_login_path(),
            whoami: default_whoami_path(),
            logout: default_logout_path(),
            password_email: default_password_email_path(),
            password_reset: default_password_reset_path(),
        }
    }
}

/// Session client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Base URL of the identity API. No default: it must be configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_api_url: Option<String>,
    #[serde(default = "default_identity_api_prefix")]
    pub identity_api_prefix: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub logout_policy: LogoutPolicy,
    /// Where the session credential is kept between runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
    #[serde(default)]
    pub paths: PathsSection,
}

fn default_primary_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_identity_api_prefix() -> String {
    "/apis/apps.edgenet.io/v1alpha".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            identity_api_url: None,
            identity_api_prefix: default_identity_api_prefix(),
            request_timeout_secs: default_request_timeout_secs(),
            logout_policy: LogoutPolicy::default(),
            storage_path: None,
            paths: PathsSection::default(),
        }
    }
}

impl ClientSection {
    /// The identity API URL, or an error naming how to configure it.
    pub fn require_identity_api_url(&self) -> Result<&str> {
        self.identity_api_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Identity API endpoint not configured: set client.identity_api_url in {} or {}",
                DEFAULT_CONFIG_FILE,
                ENV_IDENTITY_API
            )
        })
    }

    /// Storage slot for the session credential.
    pub fn storage_path(&self) -> PathBuf {
        self.storage_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tokengate")
                .join("api_token")
        })
    }
}

/// The complete `tokengate.toml` structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokengateConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub client: ClientSection,
}

impl TokengateConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse tokengate.toml")
    }

    /// Load from `path` if it exists, else defaults; then apply environment overrides.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize tokengate.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(db) = std::env::var(ENV_DB_PATH) {
            if !db.is_empty() {
                self.server.db_path = PathBuf::from(db);
            }
        }
        if let Ok(url) = std::env::var(ENV_IDENTITY_API) {
            if !url.is_empty() {
                self.client.identity_api_url = Some(url);
            }
        }
    }
}
