//! # Notification Forwarding Handlers
//!
//! One endpoint relays a canonical notification to the target configured for
//! the named service. Delivery is a single POST with the outcome reported
//! synchronously; there is no queue and no retry.

use crate::auth::{OperatorAuth, UserExtension};
use crate::error::{ApiError, validation_error};
use crate::handlers::types::OutcomeResponse;
use crate::notifications::{Notification, RelayKind, forward};
use crate::repositories::credential::CredentialRepository;
use crate::server::AppState;

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Request body for notification forwarding
#[derive(Debug, Deserialize, ToSchema)]
pub struct ForwardNotificationRequest {
    #[serde(flatten)]
    pub notification: Notification,
    /// Per-request access code override (Notify Me)
    pub access_code: Option<String>,
}

/// Forward a notification to a configured relay target
#[utoipa::path(
    post,
    path = "/notifications/{service}",
    security(("bearer_auth" = [])),
    params(
        ("service" = String, Path, description = "Relay service slug (home_assistant, ifttt, n8n, notify_me)"),
    ),
    request_body = ForwardNotificationRequest,
    responses(
        (status = 200, description = "Delivery outcome (failures are reported in-band)", body = OutcomeResponse),
        (status = 400, description = "Service not configured for this user", body = ApiError),
        (status = 401, description = "Missing or invalid authorization token", body = ApiError),
        (status = 404, description = "Unknown relay service", body = ApiError),
    ),
    tag = "notifications"
)]
pub async fn forward_notification(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    UserExtension(user): UserExtension,
    Path(service): Path<String>,
    payload: Result<Json<ForwardNotificationRequest>, JsonRejection>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from)?;

    let Some(kind) = RelayKind::from_service(&service) else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("'{}' is not a notification relay service", service),
        ));
    };

    if request.notification.title.is_empty() && request.notification.body.is_empty() {
        return Err(validation_error(
            "Empty notification",
            serde_json::json!({ "title": "title or body is required" }),
        ));
    }

    let repo = CredentialRepository::new(Arc::new(state.db.clone()), state.crypto_key.clone());
    let credential = repo.find_by_user_service(&user.0, &service).await?;

    // Notify Me authenticates per payload; a request-supplied access code can
    // stand in for a stored one.
    let access_code = request
        .access_code
        .clone()
        .or_else(|| credential.as_ref().and_then(|c| c.api_key.clone()));

    let (target_url, bearer_token) = if kind.uses_stored_url() {
        let Some(webhook_url) = credential.as_ref().and_then(|c| c.webhook_url.clone()) else {
            return Err(validation_error(
                "Relay target missing",
                serde_json::json!({
                    "webhook_url": format!("no webhook URL configured for {}", service)
                }),
            ));
        };
        // Home Assistant optionally carries its long-lived token as a bearer
        let bearer = match kind {
            RelayKind::HomeAssistant => credential.as_ref().and_then(|c| c.api_key.clone()),
            _ => None,
        };
        (webhook_url, bearer)
    } else {
        if access_code.as_deref().is_none_or(str::is_empty) {
            return Err(validation_error(
                "Access code missing",
                serde_json::json!({
                    "access_code": "provide an access code or store one for notify_me"
                }),
            ));
        }
        (state.config.notify_me_endpoint.clone(), None)
    };

    let wire_payload = kind.build_payload(&request.notification, access_code.as_deref());
    let report = forward(
        &state.http,
        kind.service(),
        &target_url,
        &wire_payload,
        bearer_token.as_deref(),
    )
    .await;

    Ok(Json(OutcomeResponse {
        success: report.success,
        message: report.message,
        status: report.status,
        data: None,
    }))
}
