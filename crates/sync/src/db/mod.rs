//! Catalog document store.
//!
//! # Database: `shopfleet`
//!
//! Records are JSONB documents keyed by relational columns. Writes are
//! patches merged into the stored document with `data || patch`, so a field
//! written by the pipeline never clobbers fields owned by other writers.
//!
//! ## Tables
//!
//! - `catalog.storefront` - Known storefronts
//! - `catalog.canonical_item` - One mirror per Shopify product
//! - `catalog.product` - Per-storefront products (indexed on Shopify ID)
//! - `catalog.variant` - Per-storefront variants, cascading from products
//!
//! # Migrations
//!
//! Migrations are stored in `crates/sync/migrations/` and run via:
//! ```bash
//! cargo run -p shopfleet-cli -- migrate
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use shopfleet_core::{
    CanonicalItem, CanonicalPatch, Product, ProductId, ProductPatch, ShopifyProductId,
    StorefrontId, Variant, VariantId, VariantPatch,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

mod catalog;
mod memory;

pub use catalog::PgCatalogStore;
pub use memory::MemoryCatalogStore;

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Document store operations used by the pipeline.
///
/// Patch and delete operations on a missing record return
/// `RepositoryError::NotFound`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Check connectivity.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Every known storefront.
    async fn storefronts(&self) -> Result<Vec<StorefrontId>, RepositoryError>;

    async fn canonical_item(
        &self,
        id: ShopifyProductId,
    ) -> Result<Option<CanonicalItem>, RepositoryError>;

    async fn patch_canonical(
        &self,
        id: ShopifyProductId,
        patch: &CanonicalPatch,
    ) -> Result<(), RepositoryError>;

    async fn product(
        &self,
        storefront: &StorefrontId,
        id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError>;

    /// The storefront's product for a Shopify product, if imported.
    async fn product_by_shopify_id(
        &self,
        storefront: &StorefrontId,
        id: ShopifyProductId,
    ) -> Result<Option<Product>, RepositoryError>;

    async fn patch_product(
        &self,
        storefront: &StorefrontId,
        id: &ProductId,
        patch: &ProductPatch,
    ) -> Result<(), RepositoryError>;

    /// Delete a product and its variants.
    async fn delete_product(
        &self,
        storefront: &StorefrontId,
        id: &ProductId,
    ) -> Result<(), RepositoryError>;

    async fn variants(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
    ) -> Result<Vec<Variant>, RepositoryError>;

    async fn variant(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
        id: &VariantId,
    ) -> Result<Option<Variant>, RepositoryError>;

    async fn patch_variant(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
        id: &VariantId,
        patch: &VariantPatch,
    ) -> Result<(), RepositoryError>;

    async fn delete_variant(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
        id: &VariantId,
    ) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
