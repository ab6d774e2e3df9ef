//! # OAuth State Model
//!
//! SeaORM entity for pending OAuth flow state rows. A row is created when a
//! flow starts and consumed (deleted) by the first callback that presents its
//! state value, which is what makes replayed callbacks fail.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OAuth state entity for in-flight authorization flows
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth_states")]
pub struct Model {
    /// Primary key UUID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User that initiated the flow
    pub user_id: Uuid,

    /// Provider slug (e.g., "google", "fitbit", "alexa")
    pub provider: String,

    /// Signed state token issued to the provider
    pub state: String,

    /// Expiration timestamp
    pub expires_at: chrono::DateTime<chrono::Utc>,

    /// When the state was created
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// When the state was last updated
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
