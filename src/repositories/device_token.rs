//! Device token repository
//!
//! Database operations for registered FCM push tokens. Re-registering an
//! existing (user, token) pair refreshes its metadata in place.

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::device_token::{self, Entity as DeviceToken};

/// Repository for device token database operations
#[derive(Debug, Clone)]
pub struct DeviceTokenRepository {
    db: Arc<DatabaseConnection>,
}

impl DeviceTokenRepository {
    /// Creates a new DeviceTokenRepository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Registers a push token for a user, updating metadata when the token is
    /// already known.
    pub async fn register(
        &self,
        user_id: &Uuid,
        token: &str,
        device_info: Option<JsonValue>,
    ) -> Result<device_token::Model> {
        let now = Utc::now();

        let active = device_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(*user_id),
            token: Set(token.to_string()),
            device_info: Set(device_info),
            created_at: Set(now),
            updated_at: Set(now),
        };

        DeviceToken::insert(active)
            .on_conflict(
                OnConflict::columns([device_token::Column::UserId, device_token::Column::Token])
                    .update_columns([
                        device_token::Column::DeviceInfo,
                        device_token::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        self.find_by_user_token(user_id, token)
            .await?
            .ok_or_else(|| anyhow!("device token not persisted"))
    }

    /// Finds a registered token for a user
    pub async fn find_by_user_token(
        &self,
        user_id: &Uuid,
        token: &str,
    ) -> Result<Option<device_token::Model>> {
        Ok(DeviceToken::find()
            .filter(device_token::Column::UserId.eq(*user_id))
            .filter(device_token::Column::Token.eq(token))
            .one(&*self.db)
            .await?)
    }
}
