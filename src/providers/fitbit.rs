//! Fitbit provider implementation
//!
//! Fitbit OAuth2 web flow. Fitbit's token endpoint authenticates the app with
//! HTTP Basic `client_id:client_secret` rather than form fields, for both the
//! code exchange and the refresh grant. The probe hits the profile endpoint.

use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

use crate::providers::trait_::{
    OAuthProvider, ProbeOutcome, ProviderError, TokenGrant, read_probe_response,
    read_token_response,
};

pub const FITBIT_SLUG: &str = "fitbit";

/// Scopes covering the health metrics the routine dashboard reads
const FITBIT_SCOPES: &str = "activity heartrate sleep profile";

/// Fitbit OAuth and Web API client
#[derive(Clone)]
pub struct FitbitProvider {
    client_id: String,
    client_secret: String,
    oauth_base: String,
    api_base: String,
}

impl FitbitProvider {
    /// Create a new Fitbit provider with the given app registration and bases
    pub fn new(
        client_id: String,
        client_secret: String,
        oauth_base: String,
        api_base: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            oauth_base,
            api_base,
        }
    }
}

#[async_trait]
impl OAuthProvider for FitbitProvider {
    fn slug(&self) -> &'static str {
        FITBIT_SLUG
    }

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/oauth2/authorize", self.oauth_base))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", FITBIT_SCOPES)
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
        params.insert("code", code.to_string());
        params.insert("redirect_uri", redirect_uri.to_string());
        params.insert("grant_type", "authorization_code".to_string());

        let response = http
            .post(format!("{}/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
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
        params.insert("grant_type", "refresh_token".to_string());
        params.insert("refresh_token", refresh_token.to_string());

        let response = http
            .post(format!("{}/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
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
            .get(format!("{}/1/user/-/profile.json", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await?;

        read_probe_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> FitbitProvider {
        FitbitProvider::new(
            "fitbit-client-id".to_string(),
            "fitbit-client-secret".to_string(),
            "https://www.fitbit.com".to_string(),
            "https://api.fitbit.com".to_string(),
        )
    }

    #[test]
    fn authorize_url_carries_required_parameters() {
        let url = provider()
            .authorize_url("https://api.routinely.app/connect/fitbit/callback", "state-xyz")
            .unwrap();

        assert_eq!(url.host_str(), Some("www.fitbit.com"));
        assert_eq!(url.path(), "/oauth2/authorize");

        let query: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(query.get("client_id").map(|v| v.as_ref()), Some("fitbit-client-id"));
        assert_eq!(query.get("state").map(|v| v.as_ref()), Some("state-xyz"));
        assert_eq!(
            query.get("scope").map(|v| v.as_ref()),
            Some("activity heartrate sleep profile")
        );
    }

    #[test]
    fn authorize_url_has_no_fragment() {
        let url = provider()
            .authorize_url("https://api.routinely.app/connect/fitbit/callback", "s")
            .unwrap();
        assert!(url.fragment().is_none());
    }
}
