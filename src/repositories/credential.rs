//! Credential repository for database operations
//!
//! Encapsulates SeaORM operations for the credentials table. All writes go
//! through upsert-on-conflict against the unique (user_id, service) index,
//! which is the only safeguard against two concurrent callbacks for the same
//! pair; there is no application-level locking.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::{CryptoKey, decrypt_credential_tokens, encrypt_credential_tokens};
use crate::models::credential::{self, Entity as Credential};

/// Token fields persisted after an OAuth exchange or refresh.
///
/// `refresh_token`, `scopes`, and `external_id` are only written when present,
/// so a refresh grant that does not rotate the refresh token keeps the stored
/// one.
#[derive(Debug, Default)]
pub struct TokenUpdate<'a> {
    pub access_token: Option<&'a str>,
    pub refresh_token: Option<&'a str>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Option<JsonValue>,
    pub external_id: Option<&'a str>,
}

/// Repository for credential database operations
#[derive(Debug, Clone)]
pub struct CredentialRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Crypto key for token sealing
    pub crypto_key: CryptoKey,
}

impl CredentialRepository {
    /// Creates a new CredentialRepository instance
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Finds the credential for a (user, service) pair
    pub async fn find_by_user_service(
        &self,
        user_id: &Uuid,
        service: &str,
    ) -> Result<Option<credential::Model>> {
        Ok(Credential::find()
            .filter(credential::Column::UserId.eq(*user_id))
            .filter(credential::Column::Service.eq(service))
            .one(&*self.db)
            .await?)
    }

    /// Lists all credentials for a user ordered by service slug
    pub async fn list_by_user(&self, user_id: &Uuid) -> Result<Vec<credential::Model>> {
        Ok(Credential::find()
            .filter(credential::Column::UserId.eq(*user_id))
            .order_by_asc(credential::Column::Service)
            .all(&*self.db)
            .await?)
    }

    /// Decrypts the token pair from a credential row
    pub fn decrypt_tokens(
        &self,
        credential: &credential::Model,
    ) -> Result<(Option<String>, Option<String>)> {
        decrypt_credential_tokens(&self.crypto_key, credential).map_err(|e| {
            tracing::error!(
                user_id = %credential.user_id,
                service = %credential.service,
                "Token decryption failed"
            );
            anyhow!("Token decryption failed: {}", e)
        })
    }

    /// Seals and persists tokens for a (user, service) pair, inserting the row
    /// if it does not exist yet.
    pub async fn upsert_tokens(
        &self,
        user_id: &Uuid,
        service: &str,
        update: TokenUpdate<'_>,
    ) -> Result<credential::Model> {
        let now = Utc::now();

        // Temporary model carrying the AAD identity for sealing
        let aad_model = credential::Model {
            id: Uuid::new_v4(),
            user_id: *user_id,
            service: service.to_string(),
            access_token_ciphertext: None,
            refresh_token_ciphertext: None,
            expires_at: None,
            scopes: None,
            external_id: None,
            webhook_url: None,
            api_key: None,
            created_at: now,
            updated_at: now,
        };

        let (access_cipher, refresh_cipher) = encrypt_credential_tokens(
            &self.crypto_key,
            &aad_model,
            update.access_token,
            update.refresh_token,
        )
        .map_err(|e| anyhow!("Token encryption failed: {}", e))?;

        let mut update_columns = vec![
            credential::Column::AccessTokenCiphertext,
            credential::Column::ExpiresAt,
            credential::Column::UpdatedAt,
        ];
        if update.refresh_token.is_some() {
            update_columns.push(credential::Column::RefreshTokenCiphertext);
        }
        if update.scopes.is_some() {
            update_columns.push(credential::Column::Scopes);
        }
        if update.external_id.is_some() {
            update_columns.push(credential::Column::ExternalId);
        }

        let active = credential::ActiveModel {
            id: Set(aad_model.id),
            user_id: Set(*user_id),
            service: Set(service.to_string()),
            access_token_ciphertext: Set(access_cipher),
            refresh_token_ciphertext: Set(refresh_cipher),
            expires_at: Set(update.expires_at),
            scopes: Set(update.scopes.clone()),
            external_id: Set(update.external_id.map(|s| s.to_string())),
            webhook_url: sea_orm::ActiveValue::NotSet,
            api_key: sea_orm::ActiveValue::NotSet,
            created_at: Set(now),
            updated_at: Set(now),
        };

        Credential::insert(active)
            .on_conflict(
                OnConflict::columns([credential::Column::UserId, credential::Column::Service])
                    .update_columns(update_columns)
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        self.find_by_user_service(user_id, service)
            .await?
            .ok_or_else(|| anyhow!("credential not persisted for service '{}'", service))
    }

    /// Upserts webhook configuration for relay-style services. Only provided
    /// fields are written on conflict.
    pub async fn upsert_webhook_config(
        &self,
        user_id: &Uuid,
        service: &str,
        webhook_url: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<credential::Model> {
        let now = Utc::now();

        let mut update_columns = vec![credential::Column::UpdatedAt];
        if webhook_url.is_some() {
            update_columns.push(credential::Column::WebhookUrl);
        }
        if api_key.is_some() {
            update_columns.push(credential::Column::ApiKey);
        }

        let active = credential::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(*user_id),
            service: Set(service.to_string()),
            access_token_ciphertext: sea_orm::ActiveValue::NotSet,
            refresh_token_ciphertext: sea_orm::ActiveValue::NotSet,
            expires_at: sea_orm::ActiveValue::NotSet,
            scopes: sea_orm::ActiveValue::NotSet,
            external_id: sea_orm::ActiveValue::NotSet,
            webhook_url: Set(webhook_url.map(|s| s.to_string())),
            api_key: Set(api_key.map(|s| s.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Credential::insert(active)
            .on_conflict(
                OnConflict::columns([credential::Column::UserId, credential::Column::Service])
                    .update_columns(update_columns)
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        self.find_by_user_service(user_id, service)
            .await?
            .ok_or_else(|| anyhow!("credential not persisted for service '{}'", service))
    }
}
