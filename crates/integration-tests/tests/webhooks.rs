//! Integration tests for the product webhook endpoint.
//!
//! Deliveries go through the full router: signature check, propagation to
//! the canonical mirror, and updates to every storefront listing the product.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeSet;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use shopfleet_core::{
    CanonicalItem, InventoryPolicy, ProductId, ShopifyProductId, ShopifyVariantId, Stock,
    StorefrontId, VariantId,
};
use shopfleet_integration_tests::{
    TestApp, VariantSpec, canonical, price, product, variant,
};
use shopfleet_sync::db::CatalogStore;

const PRODUCT: u64 = 1001;

const MEDIUM: VariantSpec<'static> = VariantSpec {
    id: "tee-m-blk",
    sku: "X-M-BLK",
    size: "M",
    color: "Black",
    shopify_id: 2001,
    stock: 4,
    price: "20.00",
};

const LARGE: VariantSpec<'static> = VariantSpec {
    id: "tee-l-blk",
    sku: "X-L-BLK",
    size: "L",
    color: "Black",
    shopify_id: 2002,
    stock: 6,
    price: "20.00",
};

/// Two storefronts listing the same product, plus its canonical mirror.
async fn seeded_app() -> TestApp {
    let app = TestApp::new();

    for storefront in ["main", "outlet"] {
        app.store
            .insert_product(product(storefront, "tee", PRODUCT, "Black Tee"))
            .await;
        for spec in [MEDIUM, LARGE] {
            app.store
                .insert_variant(&StorefrontId::new(storefront), variant("tee", spec))
                .await;
        }
    }
    app.store.insert_canonical(canonical(PRODUCT, &[MEDIUM, LARGE])).await;

    app.platform
        .set_markets(ShopifyProductId::new(PRODUCT), &["US"], true);
    app.platform.set_shipping_rate("US", price("5.00"));
    app
}

fn update_payload(medium_price: &str) -> Value {
    json!({
        "id": PRODUCT,
        "title": "Black Tee",
        "handle": "black-tee",
        "status": "active",
        "tags": "tees, black",
        "options": [
            { "name": "Size", "position": 1 },
            { "name": "Color", "position": 2 }
        ],
        "variants": [
            {
                "id": 2001,
                "sku": "X-M-BLK",
                "price": medium_price,
                "option1": "M",
                "option2": "Black",
                "inventory_quantity": 4,
                "inventory_policy": "deny"
            },
            {
                "id": 2002,
                "sku": "X-L-BLK",
                "price": "20.00",
                "option1": "L",
                "option2": "Black",
                "inventory_quantity": 6,
                "inventory_policy": "deny"
            }
        ],
        "images": []
    })
}

async fn stored_variant(app: &TestApp, storefront: &str, id: &str) -> shopfleet_core::Variant {
    app.store
        .variant(
            &StorefrontId::new(storefront),
            &ProductId::new("tee"),
            &VariantId::new(id),
        )
        .await
        .unwrap()
        .unwrap()
}

async fn stored_mirror(app: &TestApp) -> CanonicalItem {
    app.store
        .canonical_item(ShopifyProductId::new(PRODUCT))
        .await
        .unwrap()
        .unwrap()
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_bad_signature_rejected_before_any_work() {
    let app = seeded_app().await;

    let (status, body) = app
        .webhook_with_signature(
            "products/update",
            update_payload("22.00").to_string(),
            "bm90LXRoZS1yaWdodC1zaWduYXR1cmU=",
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);
    assert_eq!(app.store.writes(), 0);
    assert_eq!(app.platform.calls(), 0);
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let app = seeded_app().await;

    let (status, _) = app
        .webhook_with_signature("products/update", update_payload("22.00").to_string(), "")
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.writes(), 0);
}

#[tokio::test]
async fn test_get_acknowledges_endpoint() {
    let app = TestApp::new();
    let request = Request::get("/webhooks/shopify/products")
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

// =============================================================================
// Propagation
// =============================================================================

#[tokio::test]
async fn test_price_change_reaches_every_storefront() {
    let app = seeded_app().await;
    let untouched_main = stored_variant(&app, "main", "tee-l-blk").await;
    let untouched_outlet = stored_variant(&app, "outlet", "tee-l-blk").await;

    let (status, body) = app.webhook("products/update", &update_payload("22.00")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["productId"], PRODUCT);

    for storefront in ["main", "outlet"] {
        let medium = stored_variant(&app, storefront, "tee-m-blk").await;
        assert_eq!(medium.price, price("22.00"), "storefront {storefront}");
        assert_eq!(medium.stock.get(), 4);
    }
    assert_eq!(stored_variant(&app, "main", "tee-l-blk").await, untouched_main);
    assert_eq!(stored_variant(&app, "outlet", "tee-l-blk").await, untouched_outlet);

    let mirror = stored_mirror(&app).await;
    let mirrored = mirror.variant(ShopifyVariantId::new(2001)).unwrap();
    assert_eq!(mirrored.price, price("22.00"));
    assert_eq!(mirror.tags, vec!["tees".to_string(), "black".to_string()]);
}

#[tokio::test]
async fn test_duplicate_delivery_changes_nothing() {
    let app = seeded_app().await;
    let payload = update_payload("22.00");
    let main = StorefrontId::new("main");
    let tee = ProductId::new("tee");

    app.webhook("products/update", &payload).await;
    let product_after_first = app.store.product(&main, &tee).await.unwrap();
    let variants_after_first = app.store.variants(&main, &tee).await.unwrap();

    let (status, _) = app.webhook("products/update", &payload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.product(&main, &tee).await.unwrap(), product_after_first);
    assert_eq!(app.store.variants(&main, &tee).await.unwrap(), variants_after_first);
}

#[tokio::test]
async fn test_stock_change_updates_stored_stock() {
    let app = seeded_app().await;
    let mut payload = update_payload("20.00");
    payload["variants"][1]["inventory_quantity"] = json!(0);

    app.webhook("products/update", &payload).await;

    assert_eq!(stored_variant(&app, "main", "tee-l-blk").await.stock.get(), 0);
    assert_eq!(stored_variant(&app, "main", "tee-m-blk").await.stock.get(), 4);
}

#[tokio::test]
async fn test_missing_inventory_fields_keep_stored_values() {
    let app = seeded_app().await;
    let mut payload = update_payload("22.00");
    let medium = payload["variants"][0].as_object_mut().unwrap();
    medium.remove("inventory_quantity");
    medium.remove("inventory_policy");
    payload.as_object_mut().unwrap().remove("handle");

    let (status, _) = app.webhook("products/update", &payload).await;

    assert_eq!(status, StatusCode::OK);
    for storefront in ["main", "outlet"] {
        let medium = stored_variant(&app, storefront, "tee-m-blk").await;
        assert_eq!(medium.price, price("22.00"), "storefront {storefront}");
        assert_eq!(medium.stock.get(), 4, "storefront {storefront}");
        assert_eq!(medium.inventory_policy, InventoryPolicy::Deny);
    }

    let mirror = stored_mirror(&app).await;
    let mirrored = mirror.variant(ShopifyVariantId::new(2001)).unwrap();
    assert_eq!(mirrored.stock, Some(Stock::new(4)));
    assert_eq!(mirrored.inventory_policy, Some(InventoryPolicy::Deny));
    assert_eq!(mirror.handle, "fixture");
}

#[tokio::test]
async fn test_explicit_storefront_list_limits_propagation() {
    let app = seeded_app().await;
    let mut mirror = canonical(PRODUCT, &[MEDIUM, LARGE]);
    mirror.storefronts = Some(BTreeSet::from([StorefrontId::new("main")]));
    app.store.insert_canonical(mirror).await;
    let outlet_before = stored_variant(&app, "outlet", "tee-m-blk").await;

    let (status, _) = app.webhook("products/update", &update_payload("22.00")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored_variant(&app, "main", "tee-m-blk").await.price, price("22.00"));
    assert_eq!(stored_variant(&app, "outlet", "tee-m-blk").await, outlet_before);
}

#[tokio::test]
async fn test_failing_storefront_does_not_block_others() {
    let app = seeded_app().await;
    app.store.set_read_only(&StorefrontId::new("outlet"), true).await;

    let (status, body) = app.webhook("products/update", &update_payload("22.00")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(stored_variant(&app, "main", "tee-m-blk").await.price, price("22.00"));
    assert_eq!(stored_variant(&app, "outlet", "tee-m-blk").await.price, price("20.00"));
    let mirrored = stored_mirror(&app).await;
    assert_eq!(
        mirrored.variant(ShopifyVariantId::new(2001)).unwrap().price,
        price("22.00")
    );
}

#[tokio::test]
async fn test_unimported_product_is_skipped() {
    let app = seeded_app().await;
    let mut payload = update_payload("22.00");
    payload["id"] = json!(9999);

    let (status, body) = app.webhook("products/create", &payload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(app.store.writes(), 0);
    assert_eq!(stored_variant(&app, "main", "tee-m-blk").await.price, price("20.00"));
}

#[tokio::test]
async fn test_unpublished_product_gets_published() {
    let app = seeded_app().await;
    app.platform
        .set_markets(ShopifyProductId::new(PRODUCT), &["US"], false);
    let mut mirror = canonical(PRODUCT, &[MEDIUM, LARGE]);
    mirror.published = false;
    app.store.insert_canonical(mirror).await;

    let (status, _) = app.webhook("products/update", &update_payload("20.00")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.platform.published(), vec![ShopifyProductId::new(PRODUCT)]);
    assert!(stored_mirror(&app).await.published);
}

#[tokio::test]
async fn test_publish_failure_is_not_fatal() {
    let app = seeded_app().await;
    app.platform
        .set_markets(ShopifyProductId::new(PRODUCT), &["US"], false);
    app.platform.set_publish_down(true);
    let mut mirror = canonical(PRODUCT, &[MEDIUM, LARGE]);
    mirror.published = false;
    app.store.insert_canonical(mirror).await;

    let (status, body) = app.webhook("products/update", &update_payload("22.00")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(app.platform.published().is_empty());
    assert!(!stored_mirror(&app).await.published);
    for storefront in ["main", "outlet"] {
        let medium = stored_variant(&app, storefront, "tee-m-blk").await;
        assert_eq!(medium.price, price("22.00"), "storefront {storefront}");
    }
}

#[tokio::test]
async fn test_market_outage_keeps_stored_markets() {
    let app = seeded_app().await;
    app.platform.set_markets_down(true);
    let before = app
        .store
        .product(&StorefrontId::new("main"), &ProductId::new("tee"))
        .await
        .unwrap()
        .unwrap();

    let (status, _) = app.webhook("products/update", &update_payload("22.00")).await;

    assert_eq!(status, StatusCode::OK);
    let after = app
        .store
        .product(&StorefrontId::new("main"), &ProductId::new("tee"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.markets, before.markets);
    assert_eq!(stored_variant(&app, "main", "tee-m-blk").await.price, price("22.00"));
}

#[tokio::test]
async fn test_store_outage_returns_server_error() {
    let app = seeded_app().await;
    app.store.set_unavailable(true);

    let (status, body) = app.webhook("products/update", &update_payload("22.00")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_malformed_payload_is_bad_request() {
    let app = seeded_app().await;

    let (status, _) = app
        .webhook("products/update", &json!({ "title": "no id" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.writes(), 0);
}

// =============================================================================
// Deletion and other topics
// =============================================================================

#[tokio::test]
async fn test_delete_deactivates_every_listing() {
    let app = seeded_app().await;

    let (status, _) = app
        .webhook("products/delete", &json!({ "id": PRODUCT }))
        .await;

    assert_eq!(status, StatusCode::OK);
    for storefront in ["main", "outlet"] {
        let listed = app
            .store
            .product(&StorefrontId::new(storefront), &ProductId::new("tee"))
            .await
            .unwrap()
            .unwrap();
        assert!(!listed.active, "storefront {storefront}");
    }
    assert_eq!(stored_variant(&app, "main", "tee-m-blk").await.stock.get(), 4);
}

#[tokio::test]
async fn test_unhandled_topic_is_acknowledged() {
    let app = seeded_app().await;

    let (status, body) = app.webhook("orders/create", &json!({ "id": 1 })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ignored"], "orders/create");
    assert_eq!(app.store.writes(), 0);
}
