//! # Calendar Event Handlers
//!
//! Updates and deletes Google Calendar events backing scheduled routines,
//! using the caller's stored Google credential. An expired access token is
//! refreshed once (and persisted) before the calendar call.

use crate::auth::{OperatorAuth, UserExtension};
use crate::error::{ApiError, provider_error, validation_error};
use crate::providers::{CalendarEventPatch, GoogleProvider, OAuthProvider, ProviderError};
use crate::repositories::credential::{CredentialRepository, TokenUpdate};
use crate::server::AppState;

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Request body for updating a calendar event
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEventRequest {
    /// Event title
    pub title: Option<String>,
    /// Event description
    pub description: Option<String>,
    /// RFC3339 start time
    pub start_time: Option<String>,
    /// RFC3339 end time
    pub end_time: Option<String>,
}

/// Response for calendar event operations
#[derive(Debug, Serialize, ToSchema)]
pub struct CalendarEventResponse {
    pub success: bool,
    /// Updated event resource as returned by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<serde_json::Value>,
}

/// Update a calendar event on the user's primary calendar
#[utoipa::path(
    patch,
    path = "/calendar/events/{event_id}",
    security(("bearer_auth" = [])),
    params(
        ("event_id" = String, Path, description = "Provider event identifier"),
    ),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = CalendarEventResponse),
        (status = 400, description = "Validation failure or account not connected", body = ApiError),
        (status = 401, description = "Missing or invalid authorization token", body = ApiError),
        (status = 404, description = "No stored Google credential", body = ApiError),
        (status = 502, description = "Provider rejected the request", body = ApiError),
    ),
    tag = "calendar"
)]
pub async fn update_calendar_event(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    UserExtension(user): UserExtension,
    Path(event_id): Path<String>,
    payload: Result<Json<UpdateEventRequest>, JsonRejection>,
) -> Result<Json<CalendarEventResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from)?;

    let patch = CalendarEventPatch {
        summary: request.title,
        description: request.description,
        start: request
            .start_time
            .map(|t| serde_json::json!({ "dateTime": t })),
        end: request.end_time.map(|t| serde_json::json!({ "dateTime": t })),
    };

    if patch.is_empty() {
        return Err(validation_error(
            "Nothing to update",
            serde_json::json!({ "title": "at least one field is required" }),
        ));
    }

    let (provider, access_token) = google_access_token(&state, &user.0).await?;

    match provider
        .update_event(&state.http, &access_token, &event_id, &patch)
        .await
    {
        Ok(event) => Ok(Json(CalendarEventResponse {
            success: true,
            event: Some(event),
        })),
        Err(err) => Err(map_calendar_error(err)),
    }
}

/// Delete a calendar event from the user's primary calendar
#[utoipa::path(
    delete,
    path = "/calendar/events/{event_id}",
    security(("bearer_auth" = [])),
    params(
        ("event_id" = String, Path, description = "Provider event identifier"),
    ),
    responses(
        (status = 200, description = "Event deleted", body = CalendarEventResponse),
        (status = 401, description = "Missing or invalid authorization token", body = ApiError),
        (status = 404, description = "No stored Google credential", body = ApiError),
        (status = 502, description = "Provider rejected the request", body = ApiError),
    ),
    tag = "calendar"
)]
pub async fn delete_calendar_event(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    UserExtension(user): UserExtension,
    Path(event_id): Path<String>,
) -> Result<Json<CalendarEventResponse>, ApiError> {
    let (provider, access_token) = google_access_token(&state, &user.0).await?;

    match provider
        .delete_event(&state.http, &access_token, &event_id)
        .await
    {
        Ok(()) => Ok(Json(CalendarEventResponse {
            success: true,
            event: None,
        })),
        Err(err) => Err(map_calendar_error(err)),
    }
}

/// Resolve a usable Google access token for the user, refreshing once if the
/// stored one is already past its expiry.
async fn google_access_token(
    state: &AppState,
    user_id: &Uuid,
) -> Result<(Arc<GoogleProvider>, String), ApiError> {
    let provider = state.registry.google().map_err(|err| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            &err.to_string(),
        )
    })?;

    let repo = CredentialRepository::new(Arc::new(state.db.clone()), state.crypto_key.clone());
    let credential = repo
        .find_by_user_service(user_id, "google")
        .await?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "no google credential stored for this user",
            )
        })?;

    let (access_token, refresh_token) = repo.decrypt_tokens(&credential)?;

    let Some(access_token) = access_token else {
        return Err(validation_error(
            "Google account is not connected",
            serde_json::json!({ "service": "complete the google connection flow first" }),
        ));
    };

    let expired = credential
        .expires_at
        .is_some_and(|expires_at| expires_at <= Utc::now());

    if !expired {
        return Ok((provider, access_token));
    }

    let Some(refresh_token) = refresh_token else {
        // Expired with no refresh path: let the provider call surface the 401
        return Ok((provider, access_token));
    };

    let grant = provider
        .refresh_token(&state.http, &refresh_token)
        .await
        .map_err(map_calendar_error)?;

    let update = TokenUpdate {
        access_token: Some(&grant.access_token),
        refresh_token: grant.refresh_token.as_deref(),
        expires_at: grant.expires_at(),
        scopes: grant.scopes_json(),
        external_id: grant.user_id.as_deref(),
    };
    repo.upsert_tokens(user_id, "google", update).await?;

    tracing::info!(user_id = %user_id, "Refreshed expired google token before calendar call");

    Ok((provider, grant.access_token))
}

fn map_calendar_error(err: ProviderError) -> ApiError {
    match err {
        ProviderError::Upstream { status, body } => {
            provider_error("google".to_string(), status, Some(body))
        }
        other => ApiError::new(
            StatusCode::BAD_GATEWAY,
            "PROVIDER_ERROR",
            &format!("google request failed: {}", other),
        ),
    }
}
