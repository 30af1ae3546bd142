//! Token-review wire contract, as consumed by the orchestrator's webhook
//! token authenticator.

use serde::{Deserialize, Serialize};

pub const TOKEN_REVIEW_KIND: &str = "TokenReview";
pub const TOKEN_REVIEW_API_VERSION: &str = "authentication.k8s.io/v1beta1";

/// Inbound review. Every field is optional so that malformed requests still
/// reach validation and get a structured answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewRequest {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub spec: Option<TokenReviewSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenReviewSpec {
    #[serde(default)]
    pub token: Option<String>,
}

impl TokenReviewRequest {
    pub fn for_token(token: &str) -> Self {
        Self {
            kind: Some(TOKEN_REVIEW_KIND.to_string()),
            api_version: Some(TOKEN_REVIEW_API_VERSION.to_string()),
            spec: Some(TokenReviewSpec {
                token: Some(token.to_string()),
            }),
        }
    }

    /// The supplied token, if present and non-empty.
    pub fn token(&self) -> Option<&str> {
        self.spec
            .as_ref()
            .and_then(|s| s.token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub status: TokenReviewStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenReviewStatus {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ReviewedUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedUser {
    pub username: String,
    /// Always serialized, empty until group membership is populated.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl TokenReviewResponse {
    pub fn unauthenticated() -> Self {
        Self {
            api_version: TOKEN_REVIEW_API_VERSION.to_string(),
            kind: TOKEN_REVIEW_KIND.to_string(),
            status: TokenReviewStatus {
                authenticated: false,
                user: None,
            },
        }
    }

    pub fn authenticated(username: String, groups: Vec<String>) -> Self {
        Self {
            api_version: TOKEN_REVIEW_API_VERSION.to_string(),
            kind: TOKEN_REVIEW_KIND.to_string(),
            status: TokenReviewStatus {
                authenticated: true,
                user: Some(ReviewedUser { username, groups }),
            },
        }
    }
}
