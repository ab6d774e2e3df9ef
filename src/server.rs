//! # Server Configuration
//!
//! Router assembly, shared application state, and server startup for the
//! integrations API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, header},
    middleware,
    routing::{get, patch, post, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::handlers;
use crate::providers::ProviderRegistry;
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub crypto_key: CryptoKey,
    pub registry: Arc<ProviderRegistry>,
    /// Shared outbound HTTP client for provider and webhook calls
    pub http: reqwest::Client,
}

#[cfg(test)]
impl AppState {
    /// State with a disconnected database, for middleware-level tests
    pub(crate) fn for_tests(config: Arc<AppConfig>) -> Self {
        let registry = Arc::new(ProviderRegistry::from_config(&config));
        Self {
            config,
            db: DatabaseConnection::default(),
            crypto_key: CryptoKey::new(vec![0u8; 32]).expect("test crypto key"),
            registry,
            http: reqwest::Client::new(),
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    // The mobile/web clients call from arbitrary origins; headers mirror what
    // the app sends alongside its bearer token.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-user-id"),
        ]);

    // Everything except the service root and the browser-facing OAuth
    // callback sits behind operator auth.
    let protected = Router::new()
        .route("/connect/{provider}", post(handlers::oauth::start_oauth))
        .route(
            "/connections/test",
            post(handlers::connections::test_connection),
        )
        .route("/credentials", get(handlers::connections::list_credentials))
        .route(
            "/credentials/{service}",
            put(handlers::connections::upsert_credential),
        )
        .route(
            "/notifications/{service}",
            post(handlers::notifications::forward_notification),
        )
        .route("/devices/fcm", post(handlers::devices::register_fcm_token))
        .route(
            "/calendar/events/{event_id}",
            patch(handlers::calendar::update_calendar_event)
                .delete(handlers::calendar::delete_calendar_event),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route(
            "/connect/{provider}/callback",
            get(handlers::oauth::oauth_callback),
        )
        .merge(protected)
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
        .layer(cors)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let crypto_key = CryptoKey::new(
        config
            .crypto_key
            .clone()
            .ok_or("crypto key missing from configuration")?,
    )?;
    let registry = Arc::new(ProviderRegistry::from_config(&config));
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_seconds))
        .build()?;

    let state = AppState {
        config: Arc::new(config),
        db,
        crypto_key,
        registry,
        http,
    };

    let addr = state
        .config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let app = create_app(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %state.config.profile, "Server listening");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        crate::handlers::root,
        crate::handlers::oauth::start_oauth,
        crate::handlers::oauth::oauth_callback,
        crate::handlers::connections::upsert_credential,
        crate::handlers::connections::list_credentials,
        crate::handlers::connections::test_connection,
        crate::handlers::notifications::forward_notification,
        crate::handlers::devices::register_fcm_token,
        crate::handlers::calendar::update_calendar_event,
        crate::handlers::calendar::delete_calendar_event,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::error::UpstreamError,
            crate::handlers::types::OutcomeResponse,
            crate::handlers::oauth::AuthorizeUrlResponse,
            crate::handlers::connections::TestConnectionRequest,
            crate::handlers::connections::UpsertCredentialRequest,
            crate::handlers::connections::CredentialSummary,
            crate::handlers::notifications::ForwardNotificationRequest,
            crate::notifications::Notification,
            crate::handlers::calendar::UpdateEventRequest,
            crate::handlers::calendar::CalendarEventResponse,
            crate::handlers::devices::RegisterDeviceRequest,
            crate::handlers::devices::RegisterDeviceResponse,
        )
    ),
    info(
        title = "Routinely Integrations API",
        description = "OAuth credential exchange, connection testing, and notification relays for the Routinely app",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
