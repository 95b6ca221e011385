//! Manual resync: fetch a product from the platform and propagate it, the
//! way `sf-cli resync` does.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::json;
use shopfleet_core::{ProductId, ShopifyProductId, StorefrontId};
use shopfleet_integration_tests::{
    FakePlatform, VariantSpec, canonical, defaults, price, product, variant,
};
use shopfleet_sync::db::{CatalogStore, MemoryCatalogStore};
use shopfleet_sync::services::PropagationEngine;
use shopfleet_sync::shopify::{CommercePlatform, ProductPayload};

const SPEC: VariantSpec<'static> = VariantSpec {
    id: "mug-std",
    sku: "MUG-STD",
    size: "Standard",
    color: "White",
    shopify_id: 6001,
    stock: 12,
    price: "14.00",
};

#[tokio::test]
async fn test_resync_propagates_platform_product() {
    let store = Arc::new(MemoryCatalogStore::new());
    let platform = Arc::new(FakePlatform::new());

    store.insert_product(product("main", "mug", 600, "Mug")).await;
    store
        .insert_variant(&StorefrontId::new("main"), variant("mug", SPEC))
        .await;
    store.insert_canonical(canonical(600, &[SPEC])).await;

    let payload: ProductPayload = serde_json::from_value(json!({
        "id": 600,
        "title": "Mug",
        "status": "active",
        "options": [{ "name": "Size" }, { "name": "Color" }],
        "variants": [{
            "id": 6001,
            "sku": "MUG-STD",
            "price": "16.00",
            "option1": "Standard",
            "option2": "White",
            "inventory_quantity": 9
        }]
    }))
    .unwrap();
    platform.set_product(payload);
    platform.set_markets(ShopifyProductId::new(600), &["US"], true);

    let fetched = platform
        .product(ShopifyProductId::new(600))
        .await
        .unwrap()
        .unwrap();
    let raw = serde_json::to_value(&fetched).unwrap();
    let engine = PropagationEngine::new(platform.clone(), store.clone(), Arc::new(defaults()));

    let report = engine.propagate(&fetched, raw).await.unwrap();

    assert_eq!(report.failures(), 0);
    let stored = store
        .variants(&StorefrontId::new("main"), &ProductId::new("mug"))
        .await
        .unwrap();
    assert_eq!(stored[0].price, price("16.00"));
    assert_eq!(stored[0].stock.get(), 9);
}

#[tokio::test]
async fn test_resync_of_missing_product_finds_nothing() {
    let platform = FakePlatform::new();

    let fetched = platform.product(ShopifyProductId::new(404)).await.unwrap();

    assert!(fetched.is_none());
    assert_eq!(platform.calls(), 1);
}
