//! # Device Registration Handlers
//!
//! Registers FCM push tokens for the caller's devices. Registration is an
//! upsert: the same token re-registered refreshes its metadata in place.

use crate::auth::{OperatorAuth, UserExtension};
use crate::error::{ApiError, validation_error};
use crate::repositories::device_token::DeviceTokenRepository;
use crate::server::AppState;

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Request body for FCM token registration
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterDeviceRequest {
    /// FCM registration token
    pub token: String,
    /// Client-reported device metadata (platform, model, app version)
    pub device_info: Option<serde_json::Value>,
}

/// Response for FCM token registration
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterDeviceResponse {
    pub success: bool,
    /// Identifier of the stored token row
    pub token_id: Uuid,
}

/// Register an FCM push token for the calling user
#[utoipa::path(
    post,
    path = "/devices/fcm",
    security(("bearer_auth" = [])),
    request_body = RegisterDeviceRequest,
    responses(
        (status = 200, description = "Token registered", body = RegisterDeviceResponse),
        (status = 400, description = "Validation failure", body = ApiError),
        (status = 401, description = "Missing or invalid authorization token", body = ApiError),
    ),
    tag = "devices"
)]
pub async fn register_fcm_token(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    UserExtension(user): UserExtension,
    payload: Result<Json<RegisterDeviceRequest>, JsonRejection>,
) -> Result<Json<RegisterDeviceResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from)?;

    if request.token.trim().is_empty() {
        return Err(validation_error(
            "Missing token",
            serde_json::json!({ "token": "token must not be empty" }),
        ));
    }

    let repo = DeviceTokenRepository::new(Arc::new(state.db.clone()));
    let model = repo
        .register(&user.0, request.token.trim(), request.device_info)
        .await?;

    tracing::info!(user_id = %user.0, token_id = %model.id, "Registered FCM token");

    Ok(Json(RegisterDeviceResponse {
        success: true,
        token_id: model.id,
    }))
}
