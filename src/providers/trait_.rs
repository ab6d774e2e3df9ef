//! OAuth provider trait definition
//!
//! Defines the interface implemented by every OAuth-capable provider. Token
//! exchange and refresh are single POSTs with no retry; callers surface any
//! upstream failure to the user and stop.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Provider-level error types
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-2xx response from the provider
    #[error("provider returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    /// Network or connectivity error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body did not match the expected shape
    #[error("malformed provider response: {0}")]
    Malformed(String),
    /// The provider does not implement this operation
    #[error("operation not supported: {0}")]
    NotSupported(String),
    /// Invalid URL construction
    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ProviderError {
    /// Upstream status code, when this error carries one
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ProviderError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Token response from a provider's token endpoint.
///
/// The deserialization shape covers the fields Google, Fitbit, and Amazon
/// return; everything past `access_token` is optional on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Fitbit reports the provider-side account id in the token response
    #[serde(default)]
    pub user_id: Option<String>,
}

impl TokenGrant {
    /// Absolute expiry computed from `expires_in` at the moment of exchange
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .map(|seconds| Utc::now() + Duration::seconds(seconds))
    }

    /// Granted scopes as a JSON array, when the provider reported any
    pub fn scopes_json(&self) -> Option<serde_json::Value> {
        self.scope.as_ref().map(|scope| {
            serde_json::Value::Array(
                scope
                    .split_whitespace()
                    .map(|s| serde_json::Value::String(s.to_string()))
                    .collect(),
            )
        })
    }
}

/// Result of a connection probe: the upstream status plus whatever JSON body
/// came back. Non-2xx statuses are data here, not errors, because the tester
/// inspects them (401 triggers the one-shot refresh path).
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Service slug this provider serves
    fn slug(&self) -> &'static str;

    /// Build the provider authorization URL for user redirection
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, ProviderError>;

    /// Exchange an authorization code for tokens (single POST, no retry)
    async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, ProviderError>;

    /// Redeem a refresh token for a new grant (single POST, no retry)
    async fn refresh_token(
        &self,
        http: &reqwest::Client,
        refresh_token: &str,
    ) -> Result<TokenGrant, ProviderError>;

    /// Make one probe call against the provider API with the given token
    async fn probe(
        &self,
        http: &reqwest::Client,
        access_token: &str,
    ) -> Result<ProbeOutcome, ProviderError>;
}

/// Read a token-endpoint response, mapping non-2xx to `Upstream` and decode
/// failures to `Malformed`.
pub(crate) async fn read_token_response(
    response: reqwest::Response,
) -> Result<TokenGrant, ProviderError> {
    let status = response.status();
    if status.is_success() {
        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}

/// Read a probe response into a [`ProbeOutcome`], tolerating non-JSON bodies.
pub(crate) async fn read_probe_response(
    response: reqwest::Response,
) -> Result<ProbeOutcome, ProviderError> {
    let status = response.status().as_u16();
    let body = response
        .json::<serde_json::Value>()
        .await
        .unwrap_or(serde_json::Value::Null);

    Ok(ProbeOutcome { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_at_is_relative_to_now() {
        let grant = TokenGrant {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            scope: None,
            token_type: None,
            user_id: None,
        };

        let expires_at = grant.expires_at().expect("expiry present");
        let delta = expires_at - Utc::now();
        assert!(delta.num_seconds() > 3590 && delta.num_seconds() <= 3600);
    }

    #[test]
    fn missing_expires_in_yields_no_expiry() {
        let grant = TokenGrant {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_in: None,
            scope: None,
            token_type: None,
            user_id: None,
        };

        assert!(grant.expires_at().is_none());
    }

    #[test]
    fn scopes_json_splits_on_whitespace() {
        let grant = TokenGrant {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_in: None,
            scope: Some("activity sleep profile".to_string()),
            token_type: None,
            user_id: None,
        };

        assert_eq!(
            grant.scopes_json(),
            Some(serde_json::json!(["activity", "sleep", "profile"]))
        );
    }

    #[test]
    fn token_grant_deserializes_minimal_response() {
        let grant: TokenGrant =
            serde_json::from_value(serde_json::json!({"access_token": "abc"})).unwrap();
        assert_eq!(grant.access_token, "abc");
        assert!(grant.refresh_token.is_none());
        assert!(grant.expires_in.is_none());
    }

    #[test]
    fn probe_outcome_success_range() {
        let ok = ProbeOutcome {
            status: 204,
            body: serde_json::Value::Null,
        };
        let unauthorized = ProbeOutcome {
            status: 401,
            body: serde_json::Value::Null,
        };
        assert!(ok.is_success());
        assert!(!unauthorized.is_success());
    }
}
