//! Integration test harness for Shopfleet.
//!
//! Tests drive the full HTTP application in-process with
//! `tower::ServiceExt::oneshot`, backed by [`MemoryCatalogStore`] and a
//! scriptable [`FakePlatform`] standing in for the Shopify Admin API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfleet-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `webhooks` - Signature checks, propagation, idempotence, deletion
//! - `checkout` - Cart validation verdicts and degraded dependencies
//! - `reconciler` - Stock repair triggered from checkout

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use shopfleet_core::{
    CanonicalItem, CanonicalVariant, CurrencyCode, DeliveryEstimate, InventoryPolicy,
    MarketAvailability, MarketCode, MarketListing, MarketMap, Money, PipelineDefaults, Product,
    ProductId, ProductStatus, ShippingAddress, ShippingEstimate, ShippingRate, ShopifyProductId,
    ShopifyVariantId, Stock, StorefrontId, Variant, VariantId,
};
use shopfleet_sync::db::MemoryCatalogStore;
use shopfleet_sync::services::webhook::{HMAC_HEADER, TOPIC_HEADER, sign_webhook_body};
use shopfleet_sync::shopify::{
    CommercePlatform, GraphQLError, ProductMarkets, ProductPayload, ShippingLine, ShopifyError,
    VariantInventory,
};
use shopfleet_sync::state::AppState;
use tower::ServiceExt;

/// Secret the test app verifies webhook signatures with.
pub const WEBHOOK_SECRET: &str = "whsec_k3Jd9fQ2mXv7LpR4tZ8nB1cY6wH5sA0e";

/// Per-check timeout used by the test app.
pub const CHECK_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Default)]
struct FakeState {
    products: HashMap<ShopifyProductId, ProductPayload>,
    markets: HashMap<ShopifyProductId, ProductMarkets>,
    markets_down: bool,
    rates: HashMap<MarketCode, ShippingRate>,
    quotes: HashMap<MarketCode, Vec<ShippingRate>>,
    shipping_delay: Option<Duration>,
    inventory: HashMap<ShopifyVariantId, VariantInventory>,
    inventory_down: bool,
    publish_down: bool,
    published: Vec<ShopifyProductId>,
}

/// Scriptable in-memory [`CommercePlatform`].
///
/// Every call is counted, so tests can assert that a request never reached
/// Shopify.
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
    calls: AtomicUsize,
}

fn unreachable_error(what: &str) -> ShopifyError {
    ShopifyError::GraphQL(vec![GraphQLError {
        message: format!("{what} unreachable"),
        locations: vec![],
        path: vec![],
    }])
}

impl FakePlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Total platform calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Products published through [`CommercePlatform::publish_product`].
    #[must_use]
    pub fn published(&self) -> Vec<ShopifyProductId> {
        self.lock().published.clone()
    }

    pub fn set_product(&self, payload: ProductPayload) {
        self.lock().products.insert(payload.id, payload);
    }

    /// List a product in markets, published to each.
    pub fn set_markets(&self, id: ShopifyProductId, markets: &[&str], published_online: bool) {
        let listings = markets
            .iter()
            .map(|code| MarketListing {
                market: MarketCode::new(code),
                published: true,
                currency: CurrencyCode::usd(),
            })
            .collect();
        self.lock().markets.insert(
            id,
            ProductMarkets {
                listings,
                published_online,
            },
        );
    }

    pub fn set_markets_down(&self, down: bool) {
        self.lock().markets_down = down;
    }

    pub fn set_shipping_rate(&self, market: &str, amount: Decimal) {
        self.lock()
            .rates
            .insert(MarketCode::new(market), rate("Standard", amount));
    }

    /// Rates quoted for carts shipping to a country.
    pub fn set_quotes(&self, market: &str, rates: Vec<ShippingRate>) {
        self.lock().quotes.insert(MarketCode::new(market), rates);
    }

    /// Delay every shipping quote.
    pub fn set_shipping_delay(&self, delay: Duration) {
        self.lock().shipping_delay = Some(delay);
    }

    pub fn set_inventory(&self, id: ShopifyVariantId, available: u32) {
        self.lock().inventory.insert(
            id,
            VariantInventory {
                available: Stock::new(available),
                policy: InventoryPolicy::Deny,
            },
        );
    }

    /// Forget a variant, as if it was deleted in Shopify.
    pub fn remove_inventory(&self, id: ShopifyVariantId) {
        self.lock().inventory.remove(&id);
    }

    pub fn set_inventory_down(&self, down: bool) {
        self.lock().inventory_down = down;
    }

    pub fn set_publish_down(&self, down: bool) {
        self.lock().publish_down = down;
    }
}

#[async_trait]
impl CommercePlatform for FakePlatform {
    async fn product(&self, id: ShopifyProductId) -> Result<Option<ProductPayload>, ShopifyError> {
        self.record_call();
        Ok(self.lock().products.get(&id).cloned())
    }

    async fn product_markets(&self, id: ShopifyProductId) -> Result<ProductMarkets, ShopifyError> {
        self.record_call();
        let state = self.lock();
        if state.markets_down {
            return Err(unreachable_error("markets"));
        }
        Ok(state.markets.get(&id).cloned().unwrap_or_default())
    }

    async fn shipping_rate(&self, market: &MarketCode) -> Result<Option<ShippingRate>, ShopifyError> {
        self.record_call();
        Ok(self.lock().rates.get(market).cloned())
    }

    async fn quote_shipping(
        &self,
        _lines: &[ShippingLine],
        address: &ShippingAddress,
    ) -> Result<Vec<ShippingRate>, ShopifyError> {
        self.record_call();
        let (delay, rates) = {
            let state = self.lock();
            let rates = address
                .market()
                .and_then(|market| state.quotes.get(&market).cloned())
                .unwrap_or_default();
            (state.shipping_delay, rates)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(rates)
    }

    async fn variant_inventory(
        &self,
        ids: &[ShopifyVariantId],
        _market: Option<&MarketCode>,
    ) -> Result<HashMap<ShopifyVariantId, VariantInventory>, ShopifyError> {
        self.record_call();
        let state = self.lock();
        if state.inventory_down {
            return Err(unreachable_error("inventory"));
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.inventory.get(id).map(|inv| (*id, *inv)))
            .collect())
    }

    async fn publish_product(&self, id: ShopifyProductId) -> Result<(), ShopifyError> {
        self.record_call();
        let mut state = self.lock();
        if state.publish_down {
            return Err(unreachable_error("publications"));
        }
        state.published.push(id);
        Ok(())
    }
}

/// A shipping rate in USD.
#[must_use]
pub fn rate(title: &str, amount: Decimal) -> ShippingRate {
    ShippingRate {
        title: title.to_string(),
        price: Money::new(amount, CurrencyCode::usd()),
        delivery_estimate: Some(DeliveryEstimate::new(3, 5)),
    }
}

/// Parse a price like `"20.00"`.
#[must_use]
pub fn price(value: &str) -> Decimal {
    value.parse().unwrap_or_default()
}

#[must_use]
pub fn defaults() -> PipelineDefaults {
    PipelineDefaults {
        default_market: MarketCode::new("US"),
        default_storefront: StorefrontId::new("main"),
        default_shipping: ShippingEstimate {
            rate: price("9.95"),
            currency: CurrencyCode::usd(),
            delivery_estimate: DeliveryEstimate::new(3, 7),
        },
        shipping_estimates: std::collections::BTreeMap::new(),
    }
}

/// A market entry available in `market`.
#[must_use]
pub fn available_in(markets: &[&str]) -> MarketMap {
    markets
        .iter()
        .map(|code| {
            (
                MarketCode::new(code),
                MarketAvailability {
                    available: true,
                    currency: CurrencyCode::usd(),
                    shipping_rate: Some(price("5.00")),
                    delivery_estimate: Some(DeliveryEstimate::new(3, 5)),
                    is_estimate: false,
                },
            )
        })
        .collect()
}

/// An active, published storefront product.
#[must_use]
pub fn product(storefront: &str, id: &str, shopify_id: u64, name: &str) -> Product {
    Product {
        id: ProductId::new(id),
        storefront: StorefrontId::new(storefront),
        shopify_id: ShopifyProductId::new(shopify_id),
        slug: id.to_string(),
        name: name.to_string(),
        base_price: price("20.00"),
        images: vec![],
        categories: vec![],
        markets: available_in(&["US"]),
        legacy_markets: vec![],
        published: true,
        active: true,
        updated_at: Utc::now(),
    }
}

/// Attributes for a storefront variant fixture.
#[derive(Debug, Clone, Copy)]
pub struct VariantSpec<'a> {
    pub id: &'a str,
    pub sku: &'a str,
    pub size: &'a str,
    pub color: &'a str,
    pub shopify_id: u64,
    pub stock: u32,
    pub price: &'a str,
}

#[must_use]
pub fn variant(product_id: &str, spec: VariantSpec<'_>) -> Variant {
    Variant {
        id: VariantId::new(spec.id),
        product_id: ProductId::new(product_id),
        size: Some(spec.size.to_string()),
        color: Some(spec.color.to_string()),
        sku: Some(spec.sku.to_string()),
        stock: Stock::new(spec.stock),
        price: price(spec.price),
        shopify_variant_id: Some(ShopifyVariantId::new(spec.shopify_id)),
        inventory_item_id: None,
        inventory_policy: InventoryPolicy::Deny,
        images: vec![],
        attributes: std::collections::BTreeMap::new(),
        updated_at: Utc::now(),
    }
}

/// The canonical mirror of a product with the given variants.
#[must_use]
pub fn canonical(shopify_id: u64, variants: &[VariantSpec<'_>]) -> CanonicalItem {
    CanonicalItem {
        shopify_id: ShopifyProductId::new(shopify_id),
        title: "Fixture".to_string(),
        handle: "fixture".to_string(),
        status: ProductStatus::Active,
        tags: vec![],
        variants: variants
            .iter()
            .map(|spec| CanonicalVariant {
                shopify_variant_id: ShopifyVariantId::new(spec.shopify_id),
                sku: Some(spec.sku.to_string()),
                size: Some(spec.size.to_string()),
                color: Some(spec.color.to_string()),
                price: price(spec.price),
                stock: Some(Stock::new(spec.stock)),
                inventory_item_id: None,
                inventory_policy: Some(InventoryPolicy::Deny),
                images: vec![],
            })
            .collect(),
        images: vec![],
        markets: available_in(&["US"]),
        storefronts: None,
        published: true,
        raw: Value::Null,
        updated_at: Utc::now(),
    }
}

/// The full application wired to in-memory dependencies.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryCatalogStore>,
    pub platform: Arc<FakePlatform>,
}

impl TestApp {
    /// Build the app. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryCatalogStore::new());
        let platform = Arc::new(FakePlatform::new());
        let state = AppState::from_parts(
            store.clone(),
            platform.clone(),
            SecretString::from(WEBHOOK_SECRET),
            defaults(),
            CHECK_TIMEOUT,
        );
        Self {
            router: shopfleet_sync::app(state.clone()),
            state,
            store,
            platform,
        }
    }

    /// Send a request and return the status with the JSON body.
    ///
    /// Non-JSON bodies come back as `Value::Null`.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let Ok(response) = self.router.clone().oneshot(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Deliver a correctly signed product webhook.
    pub async fn webhook(&self, topic: &str, body: &Value) -> (StatusCode, Value) {
        let body = body.to_string();
        let signature = sign_webhook_body(&SecretString::from(WEBHOOK_SECRET), body.as_bytes());
        self.webhook_with_signature(topic, body, &signature).await
    }

    /// Deliver a product webhook with an explicit signature header.
    pub async fn webhook_with_signature(
        &self,
        topic: &str,
        body: String,
        signature: &str,
    ) -> (StatusCode, Value) {
        let request = Request::post("/webhooks/shopify/products")
            .header("content-type", "application/json")
            .header(TOPIC_HEADER, topic)
            .header(HMAC_HEADER, signature)
            .body(Body::from(body))
            .unwrap_or_default();
        self.send(request).await
    }

    /// POST a checkout validation request.
    pub async fn validate(&self, body: &Value) -> (StatusCode, Value) {
        let request = Request::post("/api/checkout/validate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_default();
        self.send(request).await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
