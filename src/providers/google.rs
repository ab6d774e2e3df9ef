//! Google provider implementation
//!
//! Google OAuth2 web flow (offline access for refresh tokens) plus the
//! Calendar event operations the routine planner drives: patching and deleting
//! events on the user's primary calendar.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

use crate::providers::trait_::{
    OAuthProvider, ProbeOutcome, ProviderError, TokenGrant, read_probe_response,
    read_token_response,
};

pub const GOOGLE_SLUG: &str = "google";

/// Scopes requested for routine scheduling
const GOOGLE_SCOPES: &str =
    "https://www.googleapis.com/auth/calendar https://www.googleapis.com/auth/userinfo.profile";

/// Fields accepted when patching a calendar event. `None` fields are omitted
/// from the request so Google keeps the existing values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CalendarEventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<serde_json::Value>,
}

impl CalendarEventPatch {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.description.is_none()
            && self.start.is_none()
            && self.end.is_none()
    }
}

/// Google OAuth and Calendar API client
#[derive(Clone)]
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    oauth_base: String,
    token_base: String,
    api_base: String,
}

impl GoogleProvider {
    /// Create a new Google provider with the given app registration and bases
    pub fn new(
        client_id: String,
        client_secret: String,
        oauth_base: String,
        token_base: String,
        api_base: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            oauth_base,
            token_base,
            api_base,
        }
    }

    /// Patch an event on the user's primary calendar
    pub async fn update_event(
        &self,
        http: &reqwest::Client,
        access_token: &str,
        event_id: &str,
        patch: &CalendarEventPatch,
    ) -> Result<serde_json::Value, ProviderError> {
        let response = http
            .patch(format!(
                "{}/calendar/v3/calendars/primary/events/{}",
                self.api_base, event_id
            ))
            .bearer_auth(access_token)
            .json(patch)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<serde_json::Value>()
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

    /// Delete an event from the user's primary calendar
    pub async fn delete_event(
        &self,
        http: &reqwest::Client,
        access_token: &str,
        event_id: &str,
    ) -> Result<(), ProviderError> {
        let response = http
            .delete(format!(
                "{}/calendar/v3/calendars/primary/events/{}",
                self.api_base, event_id
            ))
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Upstream {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn slug(&self) -> &'static str {
        GOOGLE_SLUG
    }

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/o/oauth2/v2/auth", self.oauth_base))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", GOOGLE_SCOPES)
            // offline + consent so Google issues a refresh token on every grant
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        Ok(url)
    }

    async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, ProviderError> {
        let mut params = HashMap::new();
        params.insert("client_id", self.client_id.clone());
        params.insert("client_secret", self.client_secret.clone());
        params.insert("code", code.to_string());
        params.insert("redirect_uri", redirect_uri.to_string());
        params.insert("grant_type", "authorization_code".to_string());

        let response = http
            .post(format!("{}/token", self.token_base))
            .form(&params)
            .send()
            .await?;

        read_token_response(response).await
    }

    async fn refresh_token(
        &self,
        http: &reqwest::Client,
        refresh_token: &str,
    ) -> Result<TokenGrant, ProviderError> {
        let mut params = HashMap::new();
        params.insert("client_id", self.client_id.clone());
        params.insert("client_secret", self.client_secret.clone());
        params.insert("refresh_token", refresh_token.to_string());
        params.insert("grant_type", "refresh_token".to_string());

        let response = http
            .post(format!("{}/token", self.token_base))
            .form(&params)
            .send()
            .await?;

        read_token_response(response).await
    }

    async fn probe(
        &self,
        http: &reqwest::Client,
        access_token: &str,
    ) -> Result<ProbeOutcome, ProviderError> {
        let response = http
            .get(format!(
                "{}/calendar/v3/users/me/calendarList",
                self.api_base
            ))
            .query(&[("maxResults", "1")])
            .bearer_auth(access_token)
            .send()
            .await?;

        read_probe_response(response).await
    }
}
