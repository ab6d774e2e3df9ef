//! # OAuth State Repository
//!
//! Database operations for pending OAuth flow state rows.

use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::oauth_state::{self, ActiveModel, Entity, Model};

/// Repository for OAuth state database operations
pub struct OAuthStateRepository {
    db: Arc<DatabaseConnection>,
}

impl OAuthStateRepository {
    /// Create a new OAuth state repository
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new OAuth state record with the given lifetime
    pub async fn create(
        &self,
        user_id: Uuid,
        provider: &str,
        state: &str,
        expires_in_minutes: i64,
    ) -> Result<Model, sea_orm::DbErr> {
        let now = Utc::now();
        let model = Model {
            id: Uuid::new_v4(),
            user_id,
            provider: provider.to_string(),
            state: state.to_string(),
            expires_at: now + Duration::minutes(expires_in_minutes),
            created_at: now,
            updated_at: now,
        };

        let active: ActiveModel = ActiveModel {
            id: Set(model.id),
            user_id: Set(model.user_id),
            provider: Set(model.provider.clone()),
            state: Set(model.state.clone()),
            expires_at: Set(model.expires_at),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        };

        // exec_without_returning sidesteps insert-id unpacking on SQLite
        Entity::insert(active)
            .exec_without_returning(&*self.db)
            .await?;

        Ok(model)
    }

    /// Find a live (unexpired) OAuth state by user, provider, and state token
    pub async fn find_by_user_provider_state(
        &self,
        user_id: Uuid,
        provider: &str,
        state: &str,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        Entity::find()
            .filter(oauth_state::Column::UserId.eq(user_id))
            .filter(oauth_state::Column::Provider.eq(provider))
            .filter(oauth_state::Column::State.eq(state))
            .filter(oauth_state::Column::ExpiresAt.gt(Utc::now()))
            .one(&*self.db)
            .await
    }

    /// Find and consume an OAuth state (deleted after retrieval so the same
    /// state cannot be redeemed twice)
    pub async fn find_and_consume(
        &self,
        user_id: Uuid,
        provider: &str,
        state: &str,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        let oauth_state = self
            .find_by_user_provider_state(user_id, provider, state)
            .await?;

        if let Some(ref state_model) = oauth_state {
            Entity::delete_by_id(state_model.id).exec(&*self.db).await?;
        }

        Ok(oauth_state)
    }

    /// Clean up expired OAuth states, returning the number of rows removed
    pub async fn cleanup_expired(&self) -> Result<u64, sea_orm::DbErr> {
        let result = Entity::delete_many()
            .filter(oauth_state::Column::ExpiresAt.lt(Utc::now()))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected)
    }

    /// Delete a specific OAuth state by ID
    pub async fn delete_by_id(&self, id: Uuid) -> Result<bool, sea_orm::DbErr> {
        let result = Entity::delete_by_id(id).exec(&*self.db).await?;
        Ok(result.rows_affected > 0)
    }
}
