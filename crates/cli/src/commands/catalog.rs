//! Manual catalog operations against Shopify.
//!
//! # Usage
//!
//! ```bash
//! # Re-run propagation for a product as if its webhook had arrived
//! sf-cli resync 8123456789
//!
//! # Publish a product to the online store channel
//! sf-cli publish gid://shopify/Product/8123456789
//!
//! # Repair stored stock for every variant of a storefront product
//! sf-cli reconcile main prod-42
//! ```
//!
//! Reports are printed to stdout as JSON.

use std::sync::Arc;

use serde::Serialize;
use shopfleet_core::{ProductId, ShopifyProductId, StorefrontId};
use shopfleet_sync::config::defaults_from_env;
use shopfleet_sync::db::CatalogStore;
use shopfleet_sync::services::{PropagationEngine, ReconcileJob, Reconciler};
use shopfleet_sync::shopify::CommercePlatform;

use super::{CommandError, connect_shopify, connect_store};

#[allow(clippy::print_stdout)]
fn print_report<T: Serialize>(report: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Fetch a product from Shopify and propagate it.
///
/// # Errors
///
/// Returns `CommandError` if configuration is missing, the product does not
/// exist in Shopify, or propagation fails.
pub async fn resync(product: &str) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();
    let id: ShopifyProductId = product.parse()?;

    let platform = connect_shopify()?;
    let store = connect_store().await?;
    let defaults = Arc::new(defaults_from_env()?);

    let payload = platform
        .product(id)
        .await?
        .ok_or_else(|| CommandError::NotFound(format!("Shopify product {id}")))?;
    let raw = serde_json::to_value(&payload)?;

    let engine = PropagationEngine::new(platform, store, defaults);
    let report = engine.propagate(&payload, raw).await?;
    tracing::info!(product_id = %id, failures = report.failures(), "Resync complete");

    print_report(&report)
}

/// Publish a product to the online store channel.
///
/// # Errors
///
/// Returns `CommandError` if the ID is invalid or Shopify rejects the publish.
pub async fn publish(product: &str) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();
    let id: ShopifyProductId = product.parse()?;

    let platform = connect_shopify()?;
    platform.publish_product(id).await?;

    tracing::info!(product_id = %id, "Product published");
    Ok(())
}

/// Reconcile every stored variant of a product.
///
/// # Errors
///
/// Returns `CommandError` if configuration is missing, the product has no
/// stored variants, or the store cannot be read.
pub async fn reconcile(storefront: &str, product: &str) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();
    let storefront = StorefrontId::new(storefront);
    let product_id = ProductId::new(product);

    let platform = connect_shopify()?;
    let store = connect_store().await?;

    let variant_ids: Vec<_> = store
        .variants(&storefront, &product_id)
        .await?
        .into_iter()
        .map(|v| v.id)
        .collect();
    if variant_ids.is_empty() {
        return Err(CommandError::NotFound(format!(
            "variants of {product_id} in {storefront}"
        )));
    }

    let report = Reconciler::new(platform, store)
        .reconcile(&ReconcileJob {
            storefront,
            product_id,
            variant_ids,
        })
        .await;

    print_report(&report)
}
