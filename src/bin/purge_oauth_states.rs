//! Operator tool that removes expired OAuth state rows.
//!
//! States are consumed by successful callbacks, but abandoned flows leave
//! expired rows behind; this runs from cron or by hand.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use integrations::models::oauth_state::{self, Entity as OAuthState};
use integrations::{config::ConfigLoader, db, repositories::OAuthStateRepository};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[derive(Parser)]
#[command(name = "purge-oauth-states", about = "Remove expired OAuth state rows")]
struct Args {
    /// Report how many rows would be removed without deleting them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loader = ConfigLoader::new();
    let config = loader.load().context("loading configuration")?;

    let db = Arc::new(
        db::init_pool(&config)
            .await
            .context("initializing database connection pool")?,
    );

    if args.dry_run {
        let expired = OAuthState::find()
            .filter(oauth_state::Column::ExpiresAt.lt(chrono::Utc::now()))
            .count(&*db)
            .await
            .context("counting expired states")?;
        println!("{} expired OAuth state(s) would be removed.", expired);
        return Ok(());
    }

    let repo = OAuthStateRepository::new(db);
    let removed = repo
        .cleanup_expired()
        .await
        .context("purging expired states")?;
    println!("Removed {} expired OAuth state(s).", removed);

    Ok(())
}
