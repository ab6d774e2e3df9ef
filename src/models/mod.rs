//! # Data Models
//!
//! SeaORM entities and shared response models for the integrations API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod credential;
pub mod device_token;
pub mod oauth_state;

pub use credential::Entity as Credential;
pub use device_token::Entity as DeviceToken;
pub use oauth_state::Entity as OAuthState;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "routinely-integrations".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
