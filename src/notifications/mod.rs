//! Notification forwarding
//!
//! One canonical notification record, relayed to user-configured targets.
//! Each relay service gets a payload builder that produces its wire shape, so
//! the "build payload, POST, interpret status" skeleton exists exactly once.
//! Delivery is fire-and-forget reported synchronously: a single POST, success
//! is a 2xx status, and no attempt is ever retried.

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::{info, warn};
use utoipa::ToSchema;

/// Canonical notification record produced by the app
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    /// Short headline (routine name, reminder label)
    pub title: String,
    /// Message body
    pub body: String,
    /// Free-form extra fields forwarded to targets that accept them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<JsonValue>,
}

/// Relay targets keyed by service slug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    HomeAssistant,
    Ifttt,
    N8n,
    NotifyMe,
}

impl RelayKind {
    /// Resolve a relay kind from a service slug
    pub fn from_service(slug: &str) -> Option<Self> {
        match slug {
            "home_assistant" => Some(RelayKind::HomeAssistant),
            "ifttt" => Some(RelayKind::Ifttt),
            "n8n" => Some(RelayKind::N8n),
            "notify_me" => Some(RelayKind::NotifyMe),
            _ => None,
        }
    }

    /// Service slug for this relay kind
    pub fn service(&self) -> &'static str {
        match self {
            RelayKind::HomeAssistant => "home_assistant",
            RelayKind::Ifttt => "ifttt",
            RelayKind::N8n => "n8n",
            RelayKind::NotifyMe => "notify_me",
        }
    }

    /// Whether delivery uses a user-supplied webhook URL (as opposed to a
    /// fixed relay endpoint)
    pub fn uses_stored_url(&self) -> bool {
        !matches!(self, RelayKind::NotifyMe)
    }

    /// Build the provider wire payload from the canonical record.
    ///
    /// `access_code` is only meaningful for Notify Me, whose endpoint
    /// authenticates per payload.
    pub fn build_payload(&self, notification: &Notification, access_code: Option<&str>) -> JsonValue {
        match self {
            RelayKind::HomeAssistant => {
                let mut payload = json!({
                    "title": notification.title,
                    "message": notification.body,
                });
                if let Some(extra) = &notification.extra {
                    payload["data"] = extra.clone();
                }
                payload
            }
            RelayKind::Ifttt => {
                let mut payload = json!({
                    "value1": notification.title,
                    "value2": notification.body,
                });
                if let Some(extra) = &notification.extra {
                    payload["value3"] = JsonValue::String(extra.to_string());
                }
                payload
            }
            RelayKind::N8n => {
                let mut payload = json!({
                    "title": notification.title,
                    "message": notification.body,
                    "source": "routinely",
                });
                if let Some(extra) = &notification.extra {
                    payload["data"] = extra.clone();
                }
                payload
            }
            RelayKind::NotifyMe => json!({
                "notification": notification.body,
                "accessCode": access_code.unwrap_or_default(),
            }),
        }
    }
}

/// Outcome of a single forward attempt
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ForwardReport {
    /// Whether the target answered with a 2xx status
    pub success: bool,
    /// Upstream status code, when a response was received at all
    pub status: Option<u16>,
    /// Human-readable outcome, including the status code on failure
    pub message: String,
}

/// POST one payload to one target. Exactly one attempt; a thrown network
/// error and a non-2xx status are both reported as failures.
pub async fn forward(
    http: &reqwest::Client,
    service: &str,
    url: &str,
    payload: &JsonValue,
    bearer_token: Option<&str>,
) -> ForwardReport {
    let mut request = http.post(url).json(payload);
    if let Some(token) = bearer_token {
        request = request.bearer_auth(token);
    }

    let report = match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            if response.status().is_success() {
                ForwardReport {
                    success: true,
                    status: Some(status),
                    message: format!("{} accepted the notification", service),
                }
            } else {
                ForwardReport {
                    success: false,
                    status: Some(status),
                    message: format!("{} returned status {}", service, status),
                }
            }
        }
        Err(err) => ForwardReport {
            success: false,
            status: None,
            message: format!("{} delivery failed: {}", service, err),
        },
    };

    let outcome = if report.success { "success" } else { "failure" };
    counter!(
        "notification_forward_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    if report.success {
        info!(service = %service, status = ?report.status, "Notification forwarded");
    } else {
        warn!(service = %service, status = ?report.status, "Notification forward failed");
    }

    report
}
