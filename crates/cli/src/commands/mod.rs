//! Command implementations.

use std::sync::Arc;

use secrecy::SecretString;
use shopfleet_core::InvalidShopifyId;
use shopfleet_sync::config::{ConfigError, ShopifyAdminConfig};
use shopfleet_sync::db::{self, PgCatalogStore, RepositoryError};
use shopfleet_sync::services::PropagationError;
use shopfleet_sync::shopify::{AdminClient, ShopifyError};
use thiserror::Error;

pub mod catalog;
pub mod migrate;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    #[error("Propagation error: {0}")]
    Propagation(#[from] PropagationError),

    #[error("Invalid product ID: {0}")]
    InvalidId(#[from] InvalidShopifyId),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Database URL, preferring `SYNC_DATABASE_URL` over `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    std::env::var("SYNC_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("SYNC_DATABASE_URL"))
}

/// Connect to the catalog database.
async fn connect_store() -> Result<Arc<PgCatalogStore>, CommandError> {
    let url = database_url()?;
    tracing::info!("Connecting to catalog database...");
    let pool = db::create_pool(&url).await?;
    Ok(Arc::new(PgCatalogStore::new(pool)))
}

/// Build a Shopify Admin API client from the environment.
fn connect_shopify() -> Result<Arc<AdminClient>, CommandError> {
    let config = ShopifyAdminConfig::from_env()?;
    Ok(Arc::new(AdminClient::new(&config)?))
}
