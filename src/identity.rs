//! Credential and identity records shared by the webhook and the session controller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque bearer token. Never parsed, only compared.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value for an `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// User record returned by the primary backend once a credential resolves.
///
/// The backend may attach any number of additional attributes; they are kept
/// verbatim in `extra` so callers can read them without this crate knowing
/// their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub authority: String,
    #[serde(default, rename = "api_token", skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LocalIdentity {
    /// The credential, if present and non-empty.
    pub fn usable_credential(&self) -> Option<&Credential> {
        self.credential.as_ref().filter(|c| !c.is_empty())
    }
}

/// Corroborating identity record from the secondary identity backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteIdentity(Value);

impl RemoteIdentity {
    pub fn new(record: Value) -> Self {
        Self(record)
    }

    /// `metadata.name` of the record, when the record has one.
    pub fn name(&self) -> Option<&str> {
        self.0.pointer("/metadata/name").and_then(Value::as_str)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
