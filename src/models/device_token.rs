//! Device token entity model
//!
//! SeaORM entity for registered FCM push tokens, one row per (user, token).

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Registered push notification token for a user's device
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "device_tokens")]
pub struct Model {
    /// Primary key UUID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning application user
    pub user_id: Uuid,

    /// FCM registration token
    pub token: String,

    /// Client-reported device metadata (platform, model, app version)
    #[sea_orm(column_type = "JsonBinary")]
    pub device_info: Option<JsonValue>,

    /// Timestamp when the token was first registered
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Timestamp when the token was last re-registered
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
