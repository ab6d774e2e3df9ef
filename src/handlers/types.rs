//! # Common API Types
//!
//! Shared response structures used across multiple API handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome envelope for action-style endpoints (connection tests, webhook
/// forwards). These report operational failures in-band with `success: false`
/// rather than as HTTP errors, because the caller triggered the action and
/// needs the result either way.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OutcomeResponse {
    /// Whether the action succeeded
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Upstream status code, when one was observed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Provider response payload, when useful to the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl OutcomeResponse {
    /// Successful outcome with a message
    pub fn ok<S: Into<String>>(message: S) -> Self {
        Self {
            success: true,
            message: message.into(),
            status: None,
            data: None,
        }
    }

    /// Failed outcome with a message
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
            status: None,
            data: None,
        }
    }

    /// Attach an upstream status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a provider payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
