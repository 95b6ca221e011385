//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! sf-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! Migrations live in `crates/sync/migrations/`.

use super::{CommandError, database_url};

/// Run catalog database migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database URL is missing, the connection
/// fails, or a migration fails to apply.
pub async fn run() -> Result<(), CommandError> {
    dotenvy::dotenv().ok();

    let url = database_url()?;

    tracing::info!("Connecting to catalog database...");
    let pool = shopfleet_sync::db::create_pool(&url).await?;

    tracing::info!("Running catalog migrations...");
    sqlx::migrate!("../sync/migrations").run(&pool).await?;

    tracing::info!("Catalog migrations complete!");
    Ok(())
}
