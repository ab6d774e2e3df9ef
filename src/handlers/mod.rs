//! # API Handlers
//!
//! HTTP endpoint handlers for the integrations API.

use crate::models::ServiceInfo;
use axum::response::Json;

pub mod calendar;
pub mod connections;
pub mod devices;
pub mod notifications;
pub mod oauth;
pub mod types;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}
