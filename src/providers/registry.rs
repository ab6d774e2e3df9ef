//! Provider registry
//!
//! In-memory registry mapping service slugs to metadata and, for OAuth
//! services whose app registration is configured, to a live provider
//! implementation. Built once from [`AppConfig`] at startup and shared through
//! application state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::providers::alexa::{ALEXA_SLUG, AlexaProvider};
use crate::providers::fitbit::{FITBIT_SLUG, FitbitProvider};
use crate::providers::google::{GOOGLE_SLUG, GoogleProvider};
use crate::providers::metadata::{AuthKind, ServiceMetadata};
use crate::providers::trait_::OAuthProvider;

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("service '{name}' not found")]
    ServiceNotFound { name: String },
    #[error("service '{name}' is not configured on this deployment")]
    NotConfigured { name: String },
}

/// Registry of integrated services
#[derive(Clone)]
pub struct ProviderRegistry {
    metadata: HashMap<String, ServiceMetadata>,
    oauth: HashMap<String, Arc<dyn OAuthProvider>>,
    google: Option<Arc<GoogleProvider>>,
}

impl ProviderRegistry {
    /// Build the registry from application configuration. Metadata is always
    /// present for every known service; OAuth providers are only registered
    /// when their app credentials are configured.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut metadata = HashMap::new();
        for meta in [
            ServiceMetadata::new(
                GOOGLE_SLUG,
                "Google Calendar",
                AuthKind::OAuth2,
                vec![
                    "https://www.googleapis.com/auth/calendar".to_string(),
                    "https://www.googleapis.com/auth/userinfo.profile".to_string(),
                ],
            ),
            ServiceMetadata::new(
                FITBIT_SLUG,
                "Fitbit",
                AuthKind::OAuth2,
                vec![
                    "activity".to_string(),
                    "heartrate".to_string(),
                    "sleep".to_string(),
                    "profile".to_string(),
                ],
            ),
            ServiceMetadata::new(ALEXA_SLUG, "Amazon Alexa", AuthKind::OAuth2, vec![
                "profile".to_string(),
            ]),
            ServiceMetadata::new("home_assistant", "Home Assistant", AuthKind::Webhook, vec![]),
            ServiceMetadata::new("ifttt", "IFTTT", AuthKind::Webhook, vec![]),
            ServiceMetadata::new("n8n", "n8n", AuthKind::Webhook, vec![]),
            ServiceMetadata::new("notify_me", "Notify Me", AuthKind::AccessCode, vec![]),
        ] {
            metadata.insert(meta.slug.clone(), meta);
        }

        let mut oauth: HashMap<String, Arc<dyn OAuthProvider>> = HashMap::new();

        let mut google = None;
        if let (Some(client_id), Some(client_secret)) = (
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
        ) {
            let provider = Arc::new(GoogleProvider::new(
                client_id,
                client_secret,
                config.google_oauth_base.clone(),
                config.google_token_base.clone(),
                config.google_api_base.clone(),
            ));
            oauth.insert(GOOGLE_SLUG.to_string(), provider.clone());
            google = Some(provider);
        } else {
            warn!("Google provider not registered: missing client credentials");
        }

        if let (Some(client_id), Some(client_secret)) = (
            config.fitbit_client_id.clone(),
            config.fitbit_client_secret.clone(),
        ) {
            oauth.insert(
                FITBIT_SLUG.to_string(),
                Arc::new(FitbitProvider::new(
                    client_id,
                    client_secret,
                    config.fitbit_oauth_base.clone(),
                    config.fitbit_api_base.clone(),
                )),
            );
        } else {
            warn!("Fitbit provider not registered: missing client credentials");
        }

        if let (Some(client_id), Some(client_secret)) = (
            config.alexa_client_id.clone(),
            config.alexa_client_secret.clone(),
        ) {
            oauth.insert(
                ALEXA_SLUG.to_string(),
                Arc::new(AlexaProvider::new(
                    client_id,
                    client_secret,
                    config.amazon_oauth_base.clone(),
                    config.amazon_api_base.clone(),
                )),
            );
        } else {
            warn!("Alexa provider not registered: missing client credentials");
        }

        Self {
            metadata,
            oauth,
            google,
        }
    }

    /// Resolve metadata for a service slug
    pub fn metadata(&self, slug: &str) -> Result<&ServiceMetadata, RegistryError> {
        self.metadata
            .get(slug)
            .ok_or_else(|| RegistryError::ServiceNotFound {
                name: slug.to_string(),
            })
    }

    /// Resolve the OAuth provider for a slug. Unknown slugs and known slugs
    /// without a configured app registration are distinguished so handlers can
    /// return 404 versus 503.
    pub fn oauth(&self, slug: &str) -> Result<Arc<dyn OAuthProvider>, RegistryError> {
        if !self.metadata.contains_key(slug) {
            return Err(RegistryError::ServiceNotFound {
                name: slug.to_string(),
            });
        }

        self.oauth
            .get(slug)
            .cloned()
            .ok_or_else(|| RegistryError::NotConfigured {
                name: slug.to_string(),
            })
    }

    /// Typed handle for the Google provider, which carries calendar operations
    /// beyond the OAuth trait surface
    pub fn google(&self) -> Result<Arc<GoogleProvider>, RegistryError> {
        self.google
            .clone()
            .ok_or_else(|| RegistryError::NotConfigured {
                name: GOOGLE_SLUG.to_string(),
            })
    }

    /// Whether the slug names an OAuth2 service
    pub fn is_oauth_service(&self, slug: &str) -> bool {
        self.metadata
            .get(slug)
            .is_some_and(|meta| meta.auth_kind == AuthKind::OAuth2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AppConfig {
        AppConfig {
            google_client_id: Some("gid".to_string()),
            google_client_secret: Some("gsecret".to_string()),
            fitbit_client_id: Some("fid".to_string()),
            fitbit_client_secret: Some("fsecret".to_string()),
            alexa_client_id: Some("aid".to_string()),
            alexa_client_secret: Some("asecret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn configured_oauth_services_resolve() {
        let registry = ProviderRegistry::from_config(&configured());

        for slug in ["google", "fitbit", "alexa"] {
            assert!(registry.oauth(slug).is_ok(), "{slug} should resolve");
            assert!(registry.is_oauth_service(slug));
        }
        assert!(registry.google().is_ok());
    }

    #[test]
    fn unknown_service_is_not_found() {
        let registry = ProviderRegistry::from_config(&configured());

        assert!(matches!(
            registry.oauth("pagerduty"),
            Err(RegistryError::ServiceNotFound { .. })
        ));
        assert!(registry.metadata("pagerduty").is_err());
    }

    #[test]
    fn unconfigured_known_service_is_distinguished() {
        let registry = ProviderRegistry::from_config(&AppConfig::default());

        assert!(matches!(
            registry.oauth("google"),
            Err(RegistryError::NotConfigured { .. })
        ));
        // Metadata still resolves so the UI can list the service
        assert!(registry.metadata("google").is_ok());
    }

    #[test]
    fn webhook_services_are_known_but_not_oauth() {
        let registry = ProviderRegistry::from_config(&configured());

        for slug in ["home_assistant", "ifttt", "n8n", "notify_me"] {
            assert!(registry.metadata(slug).is_ok());
            assert!(!registry.is_oauth_service(slug));
            assert!(matches!(
                registry.oauth(slug),
                Err(RegistryError::NotConfigured { .. })
            ));
        }
    }
}
