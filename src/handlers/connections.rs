//! # Credential & Connection Handlers
//!
//! Handlers for saving webhook-style credentials, listing a user's stored
//! credentials, and testing stored connections against their providers.
//!
//! The connection tester makes one probe call per request. For Fitbit a 401
//! probe answer with a stored refresh token triggers exactly one refresh POST;
//! the refreshed tokens are persisted back to the credential row.

use crate::auth::{OperatorAuth, UserExtension};
use crate::error::{ApiError, validation_error};
use crate::handlers::types::OutcomeResponse;
use crate::models::credential;
use crate::notifications::{Notification, RelayKind, forward};
use crate::providers::{AuthKind, ProviderError};
use crate::repositories::credential::{CredentialRepository, TokenUpdate};
use crate::server::AppState;

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;
use utoipa::ToSchema;

/// Request body for the connection tester
#[derive(Debug, Deserialize, ToSchema)]
pub struct TestConnectionRequest {
    /// Service slug to test (e.g., "fitbit")
    pub service: String,
}

/// Request body for saving webhook-style credentials
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertCredentialRequest {
    /// Webhook target URL (Home Assistant, IFTTT, n8n)
    pub webhook_url: Option<String>,
    /// Access code or long-lived token (Notify Me, Home Assistant)
    pub api_key: Option<String>,
}

/// Sanitized view of a stored credential; token material never leaves storage
#[derive(Debug, Serialize, ToSchema)]
pub struct CredentialSummary {
    pub service: String,
    /// Whether an access token is stored ("connected" in the app UI)
    pub connected: bool,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub external_id: Option<String>,
    pub has_webhook_url: bool,
    pub has_api_key: bool,
}

impl From<credential::Model> for CredentialSummary {
    fn from(model: credential::Model) -> Self {
        Self {
            service: model.service,
            connected: model.access_token_ciphertext.is_some(),
            expires_at: model.expires_at,
            external_id: model.external_id,
            has_webhook_url: model.webhook_url.is_some(),
            has_api_key: model.api_key.is_some(),
        }
    }
}

/// Save webhook configuration for a relay-style service
#[utoipa::path(
    put,
    path = "/credentials/{service}",
    security(("bearer_auth" = [])),
    params(
        ("service" = String, Path, description = "Service slug (e.g., 'home_assistant')"),
    ),
    request_body = UpsertCredentialRequest,
    responses(
        (status = 200, description = "Credential stored", body = CredentialSummary),
        (status = 400, description = "Validation failure", body = ApiError),
        (status = 401, description = "Missing or invalid authorization token", body = ApiError),
        (status = 404, description = "Unknown service", body = ApiError),
    ),
    tag = "credentials"
)]
pub async fn upsert_credential(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    UserExtension(user): UserExtension,
    Path(service): Path<String>,
    payload: Result<Json<UpsertCredentialRequest>, JsonRejection>,
) -> Result<Json<CredentialSummary>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from)?;

    let metadata = state.registry.metadata(&service).map_err(|_| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("service '{}' not found", service),
        )
    })?;

    if metadata.auth_kind == AuthKind::OAuth2 {
        return Err(validation_error(
            "OAuth services are connected through the authorization flow",
            serde_json::json!({ "service": "use POST /connect/{provider} instead" }),
        ));
    }

    if request.webhook_url.is_none() && request.api_key.is_none() {
        return Err(validation_error(
            "Nothing to store",
            serde_json::json!({ "webhook_url": "provide a webhook URL or an API key" }),
        ));
    }

    if let Some(ref webhook_url) = request.webhook_url {
        let parsed = Url::parse(webhook_url).map_err(|_| {
            validation_error(
                "Invalid webhook URL",
                serde_json::json!({ "webhook_url": "must be a valid URL" }),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(validation_error(
                "Invalid webhook URL",
                serde_json::json!({ "webhook_url": "must use http or https" }),
            ));
        }
    }

    let repo = CredentialRepository::new(Arc::new(state.db.clone()), state.crypto_key.clone());
    let model = repo
        .upsert_webhook_config(
            &user.0,
            &service,
            request.webhook_url.as_deref(),
            request.api_key.as_deref(),
        )
        .await?;

    tracing::info!(user_id = %user.0, service = %service, "Stored webhook credential");

    Ok(Json(model.into()))
}

/// List the caller's stored credentials (sanitized)
#[utoipa::path(
    get,
    path = "/credentials",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Stored credentials", body = [CredentialSummary]),
        (status = 401, description = "Missing or invalid authorization token", body = ApiError),
    ),
    tag = "credentials"
)]
pub async fn list_credentials(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    UserExtension(user): UserExtension,
) -> Result<Json<Vec<CredentialSummary>>, ApiError> {
    let repo = CredentialRepository::new(Arc::new(state.db.clone()), state.crypto_key.clone());
    let rows = repo.list_by_user(&user.0).await?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Test a stored connection against its provider
#[utoipa::path(
    post,
    path = "/connections/test",
    security(("bearer_auth" = [])),
    request_body = TestConnectionRequest,
    responses(
        (status = 200, description = "Test outcome (failures are reported in-band)", body = OutcomeResponse),
        (status = 401, description = "Missing or invalid authorization token", body = ApiError),
        (status = 404, description = "Unknown service or no stored credential", body = ApiError),
    ),
    tag = "connections"
)]
pub async fn test_connection(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    UserExtension(user): UserExtension,
    payload: Result<Json<TestConnectionRequest>, JsonRejection>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from)?;
    let service = request.service;

    state.registry.metadata(&service).map_err(|_| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("service '{}' not found", service),
        )
    })?;

    let repo = CredentialRepository::new(Arc::new(state.db.clone()), state.crypto_key.clone());
    let credential = repo
        .find_by_user_service(&user.0, &service)
        .await?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("no {} credential stored for this user", service),
            )
        })?;

    let outcome = match service.as_str() {
        "fitbit" => test_fitbit(&state, &repo, &user.0, &credential).await?,
        "google" => test_google(&state, &repo, &credential).await?,
        "home_assistant" => test_home_assistant(&state, &credential).await,
        other => OutcomeResponse::failed(format!(
            "connection test not implemented for {}",
            other
        )),
    };

    Ok(Json(outcome))
}

async fn test_fitbit(
    state: &AppState,
    repo: &CredentialRepository,
    user_id: &uuid::Uuid,
    credential: &credential::Model,
) -> Result<OutcomeResponse, ApiError> {
    let (access_token, refresh_token) = repo.decrypt_tokens(credential)?;

    let Some(access_token) = access_token else {
        return Ok(OutcomeResponse::failed(
            "fitbit is not yet authorized; complete the connection flow first",
        ));
    };

    let provider = state.registry.oauth("fitbit").map_err(|err| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            &err.to_string(),
        )
    })?;

    let probe = match provider.probe(&state.http, &access_token).await {
        Ok(probe) => probe,
        Err(err) => {
            return Ok(OutcomeResponse::failed(format!(
                "fitbit probe failed: {}",
                err
            )));
        }
    };

    if probe.is_success() {
        // Live token: the refresh path is deliberately not touched
        return Ok(OutcomeResponse::ok("fitbit connection verified")
            .with_status(probe.status)
            .with_data(probe.body));
    }

    if probe.status != 401 {
        return Ok(OutcomeResponse::failed(format!(
            "fitbit probe returned status {}",
            probe.status
        ))
        .with_status(probe.status));
    }

    let Some(refresh_token) = refresh_token else {
        return Ok(OutcomeResponse::failed(
            "fitbit token is expired and no refresh token is stored; reconnect the account",
        )
        .with_status(401));
    };

    // Exactly one refresh attempt; its outcome is the test result
    match provider.refresh_token(&state.http, &refresh_token).await {
        Ok(grant) => {
            let update = TokenUpdate {
                access_token: Some(&grant.access_token),
                refresh_token: grant.refresh_token.as_deref(),
                expires_at: grant.expires_at(),
                scopes: grant.scopes_json(),
                external_id: grant.user_id.as_deref(),
            };
            repo.upsert_tokens(user_id, "fitbit", update).await?;

            counter!("token_refresh_total", "service" => "fitbit", "outcome" => "success")
                .increment(1);
            tracing::info!(user_id = %user_id, "Refreshed expired fitbit token during test");

            Ok(OutcomeResponse::ok(
                "fitbit token was expired and has been refreshed",
            ))
        }
        Err(ProviderError::Upstream { status, .. }) => {
            counter!("token_refresh_total", "service" => "fitbit", "outcome" => "failure")
                .increment(1);
            Ok(OutcomeResponse::failed(format!(
                "fitbit token refresh failed with status {}",
                status
            ))
            .with_status(status))
        }
        Err(err) => {
            counter!("token_refresh_total", "service" => "fitbit", "outcome" => "failure")
                .increment(1);
            Ok(OutcomeResponse::failed(format!(
                "fitbit token refresh failed: {}",
                err
            )))
        }
    }
}

async fn test_google(
    state: &AppState,
    repo: &CredentialRepository,
    credential: &credential::Model,
) -> Result<OutcomeResponse, ApiError> {
    let (access_token, _) = repo.decrypt_tokens(credential)?;

    let Some(access_token) = access_token else {
        return Ok(OutcomeResponse::failed(
            "google is not yet authorized; complete the connection flow first",
        ));
    };

    let provider = state.registry.oauth("google").map_err(|err| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            &err.to_string(),
        )
    })?;

    match provider.probe(&state.http, &access_token).await {
        Ok(probe) if probe.is_success() => Ok(OutcomeResponse::ok(
            "google calendar connection verified",
        )
        .with_status(probe.status)),
        Ok(probe) if probe.status == 401 => Ok(OutcomeResponse::failed(
            "google authorization expired; reconnect the account",
        )
        .with_status(probe.status)),
        Ok(probe) => Ok(OutcomeResponse::failed(format!(
            "google probe returned status {}",
            probe.status
        ))
        .with_status(probe.status)),
        Err(err) => Ok(OutcomeResponse::failed(format!(
            "google probe failed: {}",
            err
        ))),
    }
}

async fn test_home_assistant(
    state: &AppState,
    credential: &credential::Model,
) -> OutcomeResponse {
    let Some(webhook_url) = credential.webhook_url.as_deref() else {
        return OutcomeResponse::failed(
            "no Home Assistant webhook URL configured; save one in settings first",
        );
    };

    let notification = Notification {
        title: "Routinely".to_string(),
        body: "Connection test".to_string(),
        extra: None,
    };
    let payload = RelayKind::HomeAssistant.build_payload(&notification, None);

    let report = forward(
        &state.http,
        "home_assistant",
        webhook_url,
        &payload,
        credential.api_key.as_deref(),
    )
    .await;

    OutcomeResponse {
        success: report.success,
        message: report.message,
        status: report.status,
        data: None,
    }
}
