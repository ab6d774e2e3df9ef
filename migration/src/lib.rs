//! Database migrations for the Routinely integrations service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_12_01_000001_create_credentials;
mod m2025_12_01_000002_create_oauth_states;
mod m2025_12_01_000003_create_device_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_12_01_000001_create_credentials::Migration),
            Box::new(m2025_12_01_000002_create_oauth_states::Migration),
            Box::new(m2025_12_01_000003_create_device_tokens::Migration),
        ]
    }
}
