//! `PostgreSQL` catalog store.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shopfleet_core::{
    CanonicalItem, CanonicalPatch, Product, ProductId, ProductPatch, ShopifyProductId,
    StorefrontId, Variant, VariantId, VariantPatch,
};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;

use super::{CatalogStore, RepositoryError};

/// Catalog store backed by JSONB documents in `PostgreSQL`.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn shopify_key(id: ShopifyProductId) -> Result<i64, RepositoryError> {
    i64::try_from(id.as_u64())
        .map_err(|_| RepositoryError::DataCorruption(format!("Shopify ID {id} out of range")))
}

fn decode<T: DeserializeOwned>(row: &PgRow, what: &str) -> Result<T, RepositoryError> {
    let data: serde_json::Value = row.try_get("data")?;
    serde_json::from_value(data)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {what} document: {e}")))
}

const fn affected(rows: u64) -> Result<(), RepositoryError> {
    if rows == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn storefronts(&self) -> Result<Vec<StorefrontId>, RepositoryError> {
        let rows = sqlx::query("SELECT id FROM catalog.storefront ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Ok(StorefrontId::new(row.try_get::<String, _>("id")?)))
            .collect()
    }

    #[instrument(skip(self), fields(shopify_id = %id))]
    async fn canonical_item(
        &self,
        id: ShopifyProductId,
    ) -> Result<Option<CanonicalItem>, RepositoryError> {
        let row = sqlx::query("SELECT data FROM catalog.canonical_item WHERE shopify_id = $1")
            .bind(shopify_key(id)?)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| decode(&r, "canonical item")).transpose()
    }

    #[instrument(skip(self, patch), fields(shopify_id = %id))]
    async fn patch_canonical(
        &self,
        id: ShopifyProductId,
        patch: &CanonicalPatch,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE catalog.canonical_item
            SET data = data || $2, updated_at = NOW()
            WHERE shopify_id = $1
            ",
        )
        .bind(shopify_key(id)?)
        .bind(Json(patch))
        .execute(&self.pool)
        .await?;

        affected(result.rows_affected())
    }

    #[instrument(skip(self), fields(storefront = %storefront, product_id = %id))]
    async fn product(
        &self,
        storefront: &StorefrontId,
        id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT data FROM catalog.product WHERE storefront_id = $1 AND id = $2",
        )
        .bind(storefront.as_str())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode(&r, "product")).transpose()
    }

    #[instrument(skip(self), fields(storefront = %storefront, shopify_id = %id))]
    async fn product_by_shopify_id(
        &self,
        storefront: &StorefrontId,
        id: ShopifyProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT data FROM catalog.product
            WHERE storefront_id = $1 AND shopify_id = $2
            ORDER BY id
            LIMIT 1
            ",
        )
        .bind(storefront.as_str())
        .bind(shopify_key(id)?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode(&r, "product")).transpose()
    }

    #[instrument(skip(self, patch), fields(storefront = %storefront, product_id = %id))]
    async fn patch_product(
        &self,
        storefront: &StorefrontId,
        id: &ProductId,
        patch: &ProductPatch,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE catalog.product
            SET data = data || $3, updated_at = NOW()
            WHERE storefront_id = $1 AND id = $2
            ",
        )
        .bind(storefront.as_str())
        .bind(id.as_str())
        .bind(Json(patch))
        .execute(&self.pool)
        .await?;

        affected(result.rows_affected())
    }

    #[instrument(skip(self), fields(storefront = %storefront, product_id = %id))]
    async fn delete_product(
        &self,
        storefront: &StorefrontId,
        id: &ProductId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM catalog.product WHERE storefront_id = $1 AND id = $2")
            .bind(storefront.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        affected(result.rows_affected())
    }

    #[instrument(skip(self), fields(storefront = %storefront, product_id = %product))]
    async fn variants(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
    ) -> Result<Vec<Variant>, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT data FROM catalog.variant
            WHERE storefront_id = $1 AND product_id = $2
            ORDER BY id
            ",
        )
        .bind(storefront.as_str())
        .bind(product.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| decode(r, "variant")).collect()
    }

    #[instrument(skip(self), fields(storefront = %storefront, variant_id = %id))]
    async fn variant(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
        id: &VariantId,
    ) -> Result<Option<Variant>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT data FROM catalog.variant
            WHERE storefront_id = $1 AND product_id = $2 AND id = $3
            ",
        )
        .bind(storefront.as_str())
        .bind(product.as_str())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode(&r, "variant")).transpose()
    }

    #[instrument(skip(self, patch), fields(storefront = %storefront, variant_id = %id))]
    async fn patch_variant(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
        id: &VariantId,
        patch: &VariantPatch,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE catalog.variant
            SET data = data || $4, updated_at = NOW()
            WHERE storefront_id = $1 AND product_id = $2 AND id = $3
            ",
        )
        .bind(storefront.as_str())
        .bind(product.as_str())
        .bind(id.as_str())
        .bind(Json(patch))
        .execute(&self.pool)
        .await?;

        affected(result.rows_affected())
    }

    #[instrument(skip(self), fields(storefront = %storefront, variant_id = %id))]
    async fn delete_variant(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
        id: &VariantId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM catalog.variant
            WHERE storefront_id = $1 AND product_id = $2 AND id = $3
            ",
        )
        .bind(storefront.as_str())
        .bind(product.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        affected(result.rows_affected())
    }
}
