//! Service metadata types
//!
//! Defines the metadata structure for integrated services and how each one
//! authenticates.

use serde::{Deserialize, Serialize};

/// Authentication style of an integrated service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// OAuth 2.0 authorization code flow
    OAuth2,
    /// User-supplied webhook URL, optionally with a long-lived token
    Webhook,
    /// Fixed relay endpoint authenticated by a per-user access code
    AccessCode,
}

/// Metadata about an integrated service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceMetadata {
    /// Unique slug for the service (e.g., "fitbit")
    pub slug: String,
    /// Human-readable name shown in the app
    pub display_name: String,
    /// How the service authenticates
    pub auth_kind: AuthKind,
    /// OAuth scopes requested (empty for non-OAuth services)
    pub scopes: Vec<String>,
}

impl ServiceMetadata {
    /// Create new service metadata
    pub fn new(slug: &str, display_name: &str, auth_kind: AuthKind, scopes: Vec<String>) -> Self {
        Self {
            slug: slug.to_string(),
            display_name: display_name.to_string(),
            auth_kind,
            scopes,
        }
    }
}
