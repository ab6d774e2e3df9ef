//! Credential entity model
//!
//! SeaORM entity for the credentials table: one row per (user, service),
//! carrying sealed OAuth tokens for OAuth providers and webhook targets or
//! access codes for relay-style services. Provider app registrations
//! (client id/secret) live in process configuration, not here.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Credential entity representing a user's authorization for one service
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "credentials")]
pub struct Model {
    /// Unique identifier for the credential (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Application user that owns this credential
    pub user_id: Uuid,

    /// Service slug (e.g., "google", "fitbit", "home_assistant")
    pub service: String,

    /// Sealed access token; absence means "not yet authorized"
    pub access_token_ciphertext: Option<Vec<u8>>,

    /// Sealed refresh token
    pub refresh_token_ciphertext: Option<Vec<u8>>,

    /// Access token expiry, computed as exchange time + expires_in
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,

    /// OAuth scopes granted (JSON array)
    #[sea_orm(column_type = "JsonBinary")]
    pub scopes: Option<JsonValue>,

    /// Provider-side account identifier, when the provider reports one
    pub external_id: Option<String>,

    /// User-supplied webhook target (Home Assistant, IFTTT, n8n)
    pub webhook_url: Option<String>,

    /// Access code or long-lived token for relay services (Notify Me)
    pub api_key: Option<String>,

    /// Timestamp when the credential was created
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Timestamp when the credential was last updated
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
