//! Remote collaborators of the session controller.
//!
//! Every call takes the bearer credential as an explicit argument; the HTTP
//! clients keep no default `Authorization` header between calls.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};

use crate::config::{ClientSection, PathsSection};
use crate::errors::BackendError;
use crate::identity::{Credential, LocalIdentity, RemoteIdentity};

/// Body of `POST /password/reset`.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordReset {
    pub email: String,
    pub token: String,
    pub password: String,
    pub password_confirmation: String,
}

/// The application backend that issues credentials.
#[async_trait]
pub trait PrimaryBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LocalIdentity, BackendError>;

    /// Resolve the user a credential belongs to.
    async fn whoami(&self, bearer: &Credential) -> Result<LocalIdentity, BackendError>;

    async fn logout(&self, bearer: Option<&Credential>) -> Result<(), BackendError>;

    async fn send_reset_link(&self, email: &str) -> Result<(), BackendError>;

    async fn reset_password(&self, reset: &PasswordReset) -> Result<(), BackendError>;
}

/// The independent identity source that must corroborate a local identity.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn fetch_user(
        &self,
        authority: &str,
        name: &str,
        bearer: Option<&Credential>,
    ) -> Result<RemoteIdentity, BackendError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ResetLinkBody<'a> {
    email: &'a str,
}

fn build_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("tokengate/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

fn with_bearer(request: RequestBuilder, bearer: Option<&Credential>) -> RequestBuilder {
    match bearer {
        Some(credential) => request.header(AUTHORIZATION, credential.bearer_header()),
        None => request,
    }
}

/// Send a request, turning non-success statuses into `BackendError::Response`
/// carrying the server's `message` field when it has one.
async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
    let response = request.header(ACCEPT, "application/json").send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_default();
    Err(BackendError::Response {
        status: status.as_u16(),
        message,
    })
}

/// Read an identity body. Anything that is not an identity counts as an
/// identity without a credential.
async fn read_identity(response: Response) -> Result<LocalIdentity, BackendError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(error = %e, "backend returned an unreadable identity");
        BackendError::InvalidIssuedIdentity
    })
}

/// HTTP client for the primary backend.
pub struct HttpPrimaryBackend {
    client: reqwest::Client,
    base_url: String,
    paths: PathsSection,
}

impl HttpPrimaryBackend {
    pub fn new(base_url: &str, paths: PathsSection, timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            paths,
        })
    }

    pub fn from_config(config: &ClientSection) -> anyhow::Result<Self> {
        Self::new(
            &config.primary_url,
            config.paths.clone(),
            config.request_timeout_secs,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PrimaryBackend for HttpPrimaryBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LocalIdentity, BackendError> {
        let request = self
            .client
            .post(self.url(&self.paths.login))
            .json(&LoginBody { email, password });
        read_identity(send(request).await?).await
    }

    async fn whoami(&self, bearer: &Credential) -> Result<LocalIdentity, BackendError> {
        let request = with_bearer(self.client.get(self.url(&self.paths.whoami)), Some(bearer));
        read_identity(send(request).await?).await
    }

    async fn logout(&self, bearer: Option<&Credential>) -> Result<(), BackendError> {
        let request = with_bearer(self.client.post(self.url(&self.paths.logout)), bearer);
        send(request).await?;
        Ok(())
    }

    async fn send_reset_link(&self, email: &str) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.url(&self.paths.password_email))
            .json(&ResetLinkBody { email });
        send(request).await?;
        Ok(())
    }

    async fn reset_password(&self, reset: &PasswordReset) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.url(&self.paths.password_reset))
            .json(reset);
        send(request).await?;
        Ok(())
    }
}

/// HTTP client for the identity API, addressing users as
/// `<base><prefix>/namespaces/authority-{authority}/users/{name}`.
pub struct HttpIdentityDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityDirectory {
    pub fn new(api_url: &str, prefix: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: format!(
                "{}/{}",
                api_url.trim_end_matches('/'),
                prefix.trim_matches('/')
            ),
        })
    }

    pub fn from_config(config: &ClientSection) -> anyhow::Result<Self> {
        Self::new(
            config.require_identity_api_url()?,
            &config.identity_api_prefix,
            config.request_timeout_secs,
        )
    }

    pub fn user_url(&self, authority: &str, name: &str) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| BackendError::ClientConstruction(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| {
                BackendError::ClientConstruction(format!("{} cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .push("namespaces")
            .push(&format!("authority-{}", authority))
            .push("users")
            .push(name);
        Ok(url)
    }
}

#[async_trait]
impl IdentityDirectory for HttpIdentityDirectory {
    async fn fetch_user(
        &self,
        authority: &str,
        name: &str,
        bearer: Option<&Credential>,
    ) -> Result<RemoteIdentity, BackendError> {
        let url = self.user_url(authority, name)?;
        let response = send(with_bearer(self.client.get(url), bearer)).await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map(RemoteIdentity::new)
            .map_err(|e| BackendError::Response {
                status,
                message: format!("unreadable identity record: {}", e),
            })
    }
}
