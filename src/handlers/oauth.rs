//! # OAuth Handlers
//!
//! Handlers for the three-legged OAuth credential exchange: the authenticated
//! start endpoint that issues an authorization URL, and the unauthenticated
//! callback the provider redirects the user's browser to.
//!
//! The flow for one request is linear with no retry:
//! start issues a signed state and persists a state row; the callback verifies
//! the state signature, consumes the row, performs one token-exchange POST,
//! and upserts the credential. Any failure renders a terminal HTML page.
//!
//! Because a browser lands on the callback, its failures degrade to HTML
//! pages; the start endpoint speaks problem+json like the rest of the API.

use crate::auth::{OperatorAuth, UserExtension};
use crate::error::ApiError;
use crate::providers::{AuthKind, ProviderError, RegistryError};
use crate::repositories::credential::{CredentialRepository, TokenUpdate};
use crate::repositories::oauth_state::OAuthStateRepository;
use crate::server::AppState;
use crate::state_token;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Json},
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;
use utoipa::ToSchema;

/// Request path parameter for provider name
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProviderPath {
    /// Provider identifier (snake_case, e.g., "fitbit")
    pub provider: String,
}

/// OAuth authorization URL response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeUrlResponse {
    /// Complete authorization URL for user redirection.
    /// Must be HTTPS, valid per RFC 3986, max 2048 chars, no fragment
    pub auth_url: String,
    /// Short instruction for the app to show alongside the redirect
    pub message: String,
}

/// Query parameters delivered by the provider redirect
#[derive(Debug, Deserialize, ToSchema)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Start OAuth flow for a provider
///
/// Issues a signed state token, persists the pending-flow row, and returns the
/// provider authorization URL for the app to open in a browser.
#[utoipa::path(
    post,
    path = "/connect/{provider}",
    security(("bearer_auth" = [])),
    params(
        ("provider" = String, Path, description = "Provider identifier (snake_case, e.g., 'fitbit')"),
    ),
    responses(
        (status = 200, description = "OAuth authorization URL generated successfully", body = AuthorizeUrlResponse),
        (status = 400, description = "Provider does not support OAuth2", body = ApiError),
        (status = 401, description = "Missing or invalid authorization token", body = ApiError),
        (status = 404, description = "Provider not found", body = ApiError),
        (status = 503, description = "Provider not configured on this deployment", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "oauth"
)]
pub async fn start_oauth(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    UserExtension(user): UserExtension,
    Path(provider_path): Path<ProviderPath>,
) -> Result<Json<AuthorizeUrlResponse>, ApiError> {
    let provider = provider_path.provider;

    // Unknown slugs and non-OAuth services are caller errors, distinguished
    let metadata = match state.registry.metadata(&provider) {
        Ok(metadata) => metadata.clone(),
        Err(RegistryError::ServiceNotFound { name }) | Err(RegistryError::NotConfigured { name }) => {
            return Err(ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("provider '{}' not found", name),
            ));
        }
    };

    if metadata.auth_kind != AuthKind::OAuth2 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            &format!("provider '{}' does not support OAuth2", provider),
        ));
    }

    let connector = match state.registry.oauth(&provider) {
        Ok(connector) => connector,
        Err(RegistryError::NotConfigured { name }) => {
            return Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                &format!("provider '{}' is not configured on this deployment", name),
            ));
        }
        Err(RegistryError::ServiceNotFound { name }) => {
            return Err(ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("provider '{}' not found", name),
            ));
        }
    };

    let Some(secret) = state.config.state_secret.as_deref() else {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "State secret is not configured",
        ));
    };

    // Signed, time-bounded state binds the eventual callback to this user
    let state_token = state_token::issue(secret, user.0, &provider);

    let oauth_state_repo = OAuthStateRepository::new(Arc::new(state.db.clone()));
    let oauth_state = match oauth_state_repo
        .create(
            user.0,
            &provider,
            &state_token,
            state.config.state_ttl_minutes,
        )
        .await
    {
        Ok(row) => row,
        Err(err) => {
            tracing::error!("Failed to persist OAuth state: {:?}", err);
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Failed to create OAuth state",
            ));
        }
    };

    let redirect_uri = state.config.redirect_uri(&provider);
    let authorize_url = match connector.authorize_url(&redirect_uri, &state_token) {
        Ok(url) => url,
        Err(err) => {
            tracing::error!(
                "Failed to generate authorize URL for provider '{}': {:?}",
                provider,
                err
            );

            // The flow never reached the user; drop the orphaned state row
            let _ = oauth_state_repo.delete_by_id(oauth_state.id).await;

            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Failed to generate authorization URL",
            ));
        }
    };

    validate_authorize_url(&authorize_url)?;

    tracing::info!(
        user_id = %user.0,
        provider = %provider,
        state_id = %oauth_state.id,
        "OAuth flow initiated"
    );

    Ok(Json(AuthorizeUrlResponse {
        auth_url: authorize_url.to_string(),
        message: format!("Authorize Routinely to access your {} account", metadata.display_name),
    }))
}

/// OAuth callback endpoint
///
/// Target of the provider's browser redirect. Always responds with a
/// self-closing HTML page; every validation or upstream failure is terminal.
#[utoipa::path(
    get,
    path = "/connect/{provider}/callback",
    params(
        ("provider" = String, Path, description = "Provider identifier"),
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "Signed state token"),
        ("error" = Option<String>, Query, description = "Provider-reported error"),
    ),
    responses(
        (status = 200, description = "Self-closing HTML page reporting the outcome", content_type = "text/html")
    ),
    tag = "oauth"
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider_path): Path<ProviderPath>,
    Query(query): Query<CallbackQuery>,
) -> Html<String> {
    let provider = provider_path.provider;

    // Provider denied or user cancelled: report verbatim, touch nothing
    if let Some(error) = query.error {
        return render_error_page(&provider, &error);
    }

    let (Some(code), Some(state_param)) = (query.code, query.state) else {
        return render_error_page(&provider, "missing code or state parameter");
    };

    let Some(secret) = state.config.state_secret.as_deref() else {
        return render_error_page(&provider, "service is not fully configured");
    };

    // Signature and age check happen before any database access
    let max_age_seconds = state.config.state_ttl_minutes * 60;
    let claims = match state_token::verify(secret, &state_param, &provider, max_age_seconds) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(provider = %provider, "Rejected OAuth callback: {}", err);
            return render_error_page(&provider, &format!("invalid state token: {}", err));
        }
    };

    // Consume the pending-flow row so the same state cannot be redeemed twice
    let oauth_state_repo = OAuthStateRepository::new(Arc::new(state.db.clone()));
    match oauth_state_repo
        .find_and_consume(claims.user_id, &provider, &state_param)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => {
            return render_error_page(
                &provider,
                "authorization request expired or was already completed",
            );
        }
        Err(err) => {
            tracing::error!("Failed to consume OAuth state: {:?}", err);
            return render_error_page(&provider, "a storage error occurred");
        }
    }

    let connector = match state.registry.oauth(&provider) {
        Ok(connector) => connector,
        Err(err) => {
            tracing::error!("OAuth callback for unavailable provider: {}", err);
            return render_error_page(&provider, "provider is not available");
        }
    };

    // Single token-exchange POST; a non-2xx answer ends the flow
    let redirect_uri = state.config.redirect_uri(&provider);
    let grant = match connector.exchange_code(&state.http, &code, &redirect_uri).await {
        Ok(grant) => grant,
        Err(ProviderError::Upstream { status, body }) => {
            counter!("oauth_exchange_total", "service" => provider.clone(), "outcome" => "failure")
                .increment(1);
            tracing::warn!(
                provider = %provider,
                status,
                body = %body,
                "Token exchange rejected"
            );
            return render_error_page(
                &provider,
                &format!("{} rejected the authorization code (status {})", provider, status),
            );
        }
        Err(err) => {
            counter!("oauth_exchange_total", "service" => provider.clone(), "outcome" => "failure")
                .increment(1);
            tracing::error!(provider = %provider, "Token exchange failed: {}", err);
            return render_error_page(&provider, &format!("token exchange failed: {}", err));
        }
    };

    counter!("oauth_exchange_total", "service" => provider.clone(), "outcome" => "success")
        .increment(1);

    let credential_repo = CredentialRepository::new(
        Arc::new(state.db.clone()),
        state.crypto_key.clone(),
    );
    let update = TokenUpdate {
        access_token: Some(&grant.access_token),
        refresh_token: grant.refresh_token.as_deref(),
        expires_at: grant.expires_at(),
        scopes: grant.scopes_json(),
        external_id: grant.user_id.as_deref(),
    };

    match credential_repo
        .upsert_tokens(&claims.user_id, &provider, update)
        .await
    {
        Ok(_) => {
            tracing::info!(
                user_id = %claims.user_id,
                provider = %provider,
                "OAuth credential stored"
            );
            render_success_page(&provider)
        }
        Err(err) => {
            tracing::error!("Failed to store credential: {:?}", err);
            render_error_page(&provider, "failed to store the new credential")
        }
    }
}

/// Validate authorization URL meets OAuth 2.0 and security requirements
fn validate_authorize_url(url: &Url) -> Result<(), ApiError> {
    // Must be HTTPS
    if url.scheme() != "https" {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Provider bug: generated authorization URL must use HTTPS",
        ));
    }

    // Must not include a fragment per OAuth 2.0 RFC 6749 section 3.1
    if url.fragment().is_some() {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Provider bug: generated authorization URL must not include fragment component",
        ));
    }

    // Maximum length 2048 characters
    if url.as_str().len() > 2048 {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Provider bug: generated authorization URL exceeds maximum length of 2048 characters",
        ));
    }

    Ok(())
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn render_page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>body{{font-family:sans-serif;text-align:center;padding-top:4rem;}}</style>\n\
         </head>\n<body>\n<h2>{title}</h2>\n<p>{body}</p>\n\
         <p>This window will close automatically.</p>\n\
         <script>setTimeout(function() {{ window.close(); }}, 3000);</script>\n\
         </body>\n</html>\n"
    ))
}

fn render_success_page(provider: &str) -> Html<String> {
    render_page(
        &format!("{} connected", escape_html(provider)),
        "Your account was linked successfully. You can return to the app.",
    )
}

fn render_error_page(provider: &str, message: &str) -> Html<String> {
    render_page(
        &format!("{} connection failed", escape_html(provider)),
        &escape_html(message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::{Credential, OAuthState};
    use crate::providers::ProviderRegistry;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database, EntityTrait, PaginatorTrait};
    use uuid::Uuid;

    const TEST_STATE_SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn test_config() -> AppConfig {
        AppConfig {
            operator_tokens: vec!["test-token".to_string()],
            crypto_key: Some(vec![0u8; 32]),
            state_secret: Some(TEST_STATE_SECRET.to_string()),
            google_client_id: Some("google-client-id".to_string()),
            google_client_secret: Some("google-client-secret".to_string()),
            fitbit_client_id: Some("fitbit-client-id".to_string()),
            fitbit_client_secret: Some("fitbit-client-secret".to_string()),
            alexa_client_id: Some("alexa-client-id".to_string()),
            alexa_client_secret: Some("alexa-client-secret".to_string()),
            ..Default::default()
        }
    }

    async fn create_test_app_state() -> AppState {
        let config = test_config();

        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1);
        let db = Database::connect(opts).await.expect("connect test db");
        Migrator::up(&db, None).await.expect("apply migrations");

        let crypto_key = crate::crypto::CryptoKey::new(vec![0u8; 32]).expect("test crypto key");
        let registry = Arc::new(ProviderRegistry::from_config(&config));

        AppState {
            config: Arc::new(config),
            db,
            crypto_key,
            registry,
            http: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn start_oauth_returns_verifiable_state() {
        let app_state = create_test_app_state().await;
        let user_id = Uuid::new_v4();

        let result = start_oauth(
            State(app_state),
            OperatorAuth,
            UserExtension(crate::auth::UserId(user_id)),
            Path(ProviderPath {
                provider: "fitbit".to_string(),
            }),
        )
        .await
        .expect("start_oauth succeeds");

        let auth_url = &result.0.auth_url;
        assert!(auth_url.starts_with("https://"));
        assert!(auth_url.contains("client_id=fitbit-client-id"));
        assert!(auth_url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080"));
        assert!(auth_url.len() < 2048);
        assert!(!auth_url.contains('#'));

        // The embedded state must verify back to the caller's user id
        let url = Url::parse(auth_url).unwrap();
        let state_param = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.to_string())
            .expect("state parameter present");

        let claims =
            state_token::verify(TEST_STATE_SECRET, &state_param, "fitbit", 900).expect("verifies");
        assert_eq!(claims.user_id, user_id);
    }

    #[tokio::test]
    async fn start_oauth_unknown_provider_returns_404() {
        let app_state = create_test_app_state().await;

        let result = start_oauth(
            State(app_state),
            OperatorAuth,
            UserExtension(crate::auth::UserId(Uuid::new_v4())),
            Path(ProviderPath {
                provider: "nonexistent_provider".to_string(),
            }),
        )
        .await;

        let error = result.expect_err("unknown provider should fail");
        assert_eq!(error.status, StatusCode::NOT_FOUND);
        assert_eq!(error.code.as_ref(), "NOT_FOUND");
        assert!(error.message.contains("not found"));
    }

    #[tokio::test]
    async fn start_oauth_non_oauth_provider_returns_400() {
        let app_state = create_test_app_state().await;

        let result = start_oauth(
            State(app_state),
            OperatorAuth,
            UserExtension(crate::auth::UserId(Uuid::new_v4())),
            Path(ProviderPath {
                provider: "home_assistant".to_string(),
            }),
        )
        .await;

        let error = result.expect_err("webhook service cannot start OAuth");
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code.as_ref(), "VALIDATION_FAILED");
        assert!(error.message.contains("does not support OAuth2"));
    }

    #[tokio::test]
    async fn callback_with_provider_error_writes_nothing() {
        let app_state = create_test_app_state().await;
        let db = app_state.db.clone();

        let Html(page) = oauth_callback(
            State(app_state),
            Path(ProviderPath {
                provider: "fitbit".to_string(),
            }),
            Query(CallbackQuery {
                code: None,
                state: None,
                error: Some("access_denied".to_string()),
            }),
        )
        .await;

        // The literal provider error appears in the page
        assert!(page.contains("access_denied"));
        assert!(page.contains("window.close()"));

        let credentials = Credential::find().count(&db).await.unwrap();
        let states = OAuthState::find().count(&db).await.unwrap();
        assert_eq!(credentials, 0);
        assert_eq!(states, 0);
    }

    #[tokio::test]
    async fn callback_with_forged_state_attempts_no_exchange() {
        let app_state = create_test_app_state().await;
        let db = app_state.db.clone();

        // Unsigned base64 blob in place of a signed token; the exchange POST
        // would hit the network, so reaching it would also fail the test.
        let Html(page) = oauth_callback(
            State(app_state),
            Path(ProviderPath {
                provider: "fitbit".to_string(),
            }),
            Query(CallbackQuery {
                code: Some("auth-code".to_string()),
                state: Some("eyJ1c2VyX2lkIjoiYWJjIn0".to_string()),
                error: None,
            }),
        )
        .await;

        assert!(page.contains("invalid state token"));

        let credentials = Credential::find().count(&db).await.unwrap();
        assert_eq!(credentials, 0);
    }

    #[tokio::test]
    async fn callback_with_unknown_state_row_reports_expiry() {
        let app_state = create_test_app_state().await;

        // Well-signed token whose backing row was never created
        let token = state_token::issue(TEST_STATE_SECRET, Uuid::new_v4(), "fitbit");

        let Html(page) = oauth_callback(
            State(app_state),
            Path(ProviderPath {
                provider: "fitbit".to_string(),
            }),
            Query(CallbackQuery {
                code: Some("auth-code".to_string()),
                state: Some(token),
                error: None,
            }),
        )
        .await;

        assert!(page.contains("expired or was already completed"));
    }

    #[test]
    fn validate_authorize_url_rules() {
        let valid = Url::parse("https://example.com/oauth/authorize?state=abc").unwrap();
        assert!(validate_authorize_url(&valid).is_ok());

        let http_url = Url::parse("http://example.com/oauth/authorize").unwrap();
        assert!(validate_authorize_url(&http_url).is_err());

        let fragment_url = Url::parse("https://example.com/oauth/authorize#fragment").unwrap();
        assert!(validate_authorize_url(&fragment_url).is_err());

        let mut long_url_str = "https://example.com/oauth/authorize?".to_string();
        long_url_str.push_str(&"a".repeat(2048 - long_url_str.len() + 1));
        let long_url = Url::parse(&long_url_str).unwrap();
        assert!(validate_authorize_url(&long_url).is_err());
    }

    #[test]
    fn error_page_escapes_html() {
        let Html(page) = render_error_page("fitbit", "<script>alert(1)</script>");
        assert!(!page.contains("<script>alert"));
        assert!(page.contains("&lt;script&gt;"));
    }
}
