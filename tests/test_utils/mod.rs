//! Shared helpers for integration tests: SQLite-backed app instances and
//! pre-seeded credentials.

#![allow(dead_code)]

use std::sync::Arc;

use integrations::config::AppConfig;
use integrations::crypto::CryptoKey;
use integrations::providers::ProviderRegistry;
use integrations::repositories::credential::{CredentialRepository, TokenUpdate};
use integrations::server::{AppState, create_app};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use uuid::Uuid;

pub const OPERATOR_TOKEN: &str = "test-operator-token";
pub const STATE_SECRET: &str = "0123456789abcdef0123456789abcdef";

/// Baseline config with every provider registered; tests override endpoint
/// bases to point at their mock servers.
pub fn test_config() -> AppConfig {
    AppConfig {
        operator_tokens: vec![OPERATOR_TOKEN.to_string()],
        crypto_key: Some(vec![0u8; 32]),
        state_secret: Some(STATE_SECRET.to_string()),
        google_client_id: Some("google-client-id".to_string()),
        google_client_secret: Some("google-client-secret".to_string()),
        fitbit_client_id: Some("fitbit-client-id".to_string()),
        fitbit_client_secret: Some("fitbit-client-secret".to_string()),
        alexa_client_id: Some("alexa-client-id".to_string()),
        alexa_client_secret: Some("alexa-client-secret".to_string()),
        ..Default::default()
    }
}

/// Fresh migrated SQLite database. A single pooled connection keeps every
/// query on the same in-memory instance.
pub async fn setup_test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1);
    let db = Database::connect(opts).await.expect("connect test db");
    Migrator::up(&db, None).await.expect("apply migrations");
    db
}

/// A running app instance bound to an ephemeral port
pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
}

impl TestApp {
    /// Spawn the app with the given config on a random port
    pub async fn spawn(config: AppConfig) -> Self {
        let db = setup_test_db().await;

        let crypto_key =
            CryptoKey::new(config.crypto_key.clone().expect("crypto key set")).expect("valid key");
        let registry = Arc::new(ProviderRegistry::from_config(&config));

        let state = AppState {
            config: Arc::new(config),
            db,
            crypto_key,
            registry,
            http: reqwest::Client::new(),
        };

        let app = create_app(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Repository handle sharing the app's database and crypto key
    pub fn credential_repo(&self) -> CredentialRepository {
        CredentialRepository::new(
            Arc::new(self.state.db.clone()),
            self.state.crypto_key.clone(),
        )
    }

    /// Seed a stored OAuth credential for a user
    pub async fn seed_oauth_credential(
        &self,
        user_id: &Uuid,
        service: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) {
        self.credential_repo()
            .upsert_tokens(
                user_id,
                service,
                TokenUpdate {
                    access_token: Some(access_token),
                    refresh_token,
                    expires_at,
                    ..Default::default()
                },
            )
            .await
            .expect("seed credential");
    }

    /// Seed a stored webhook configuration for a user
    pub async fn seed_webhook_credential(
        &self,
        user_id: &Uuid,
        service: &str,
        webhook_url: Option<&str>,
        api_key: Option<&str>,
    ) {
        self.credential_repo()
            .upsert_webhook_config(user_id, service, webhook_url, api_key)
            .await
            .expect("seed webhook credential");
    }
}

/// Standard auth headers for protected endpoints
pub fn authed(request: reqwest::RequestBuilder, user_id: &Uuid) -> reqwest::RequestBuilder {
    request
        .bearer_auth(OPERATOR_TOKEN)
        .header("X-User-Id", user_id.to_string())
}
