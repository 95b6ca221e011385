//! Catalog records: the canonical Shopify mirror and per-storefront replicas.
//!
//! Records are only ever written through patches. A patch serializes to a
//! sparse JSON object carrying just the fields to set, so the document store
//! can merge it into the stored record without clobbering fields owned by
//! someone else (admin edits, view counters).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::id::{
    InventoryItemId, ProductId, ShopifyProductId, ShopifyVariantId, StorefrontId, VariantId,
};
use super::market::{MarketCode, MarketMap};
use super::status::{InventoryPolicy, ProductStatus};

/// A non-negative stock quantity.
///
/// Shopify reports negative quantities for oversold variants; those clamp to
/// zero here so the replica never stores negative stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Stock(u32);

impl Stock {
    /// Zero stock.
    pub const ZERO: Self = Self(0);

    /// Create from a non-negative count.
    #[must_use]
    pub const fn new(quantity: u32) -> Self {
        Self(quantity)
    }

    /// Create from a platform quantity, clamping negatives to zero.
    #[must_use]
    pub fn from_platform(quantity: i64) -> Self {
        Self(u32::try_from(quantity.max(0)).unwrap_or(u32::MAX))
    }

    /// Get the quantity.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether this stock covers a requested quantity.
    #[must_use]
    pub const fn covers(self, requested: u32) -> bool {
        self.0 >= requested
    }
}

impl<'de> Deserialize<'de> for Stock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Self::from_platform)
    }
}

const fn default_true() -> bool {
    true
}

/// A product as listed in one storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub storefront: StorefrontId,
    pub shopify_id: ShopifyProductId,
    pub slug: String,
    pub name: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub markets: MarketMap,
    /// Market list from before per-market maps existed.
    #[serde(default)]
    pub legacy_markets: Vec<MarketCode>,
    #[serde(default)]
    pub published: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the product is sellable in a market, per its stored data.
    ///
    /// The per-market map wins when it has an entry; otherwise the legacy
    /// market list is consulted.
    #[must_use]
    pub fn sells_in(&self, market: &MarketCode) -> bool {
        self.markets.get(market).map_or_else(
            || self.legacy_markets.contains(market),
            |entry| entry.available,
        )
    }

    /// Merge a patch into this record.
    pub fn apply(&mut self, patch: &ProductPatch) {
        if let Some(base_price) = patch.base_price {
            self.base_price = base_price;
        }
        if let Some(images) = &patch.images {
            self.images.clone_from(images);
        }
        if let Some(markets) = &patch.markets {
            self.markets.clone_from(markets);
        }
        if let Some(published) = patch.published {
            self.published = published;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
    }
}

/// A purchasable variant of a storefront product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub size: Option<String>,
    pub color: Option<String>,
    pub sku: Option<String>,
    pub stock: Stock,
    pub price: Decimal,
    pub shopify_variant_id: Option<ShopifyVariantId>,
    pub inventory_item_id: Option<InventoryItemId>,
    #[serde(default)]
    pub inventory_policy: InventoryPolicy,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    /// Merge a patch into this record.
    pub fn apply(&mut self, patch: &VariantPatch) {
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(images) = &patch.images {
            self.images.clone_from(images);
        }
        if let Some(id) = patch.shopify_variant_id {
            self.shopify_variant_id = Some(id);
        }
        if let Some(id) = patch.inventory_item_id {
            self.inventory_item_id = Some(id);
        }
        if let Some(policy) = patch.inventory_policy {
            self.inventory_policy = policy;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
    }
}

/// Authoritative facts about one Shopify variant, as mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalVariant {
    pub shopify_variant_id: ShopifyVariantId,
    pub sku: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Decimal,
    /// `None` when Shopify has never reported a quantity for this variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<Stock>,
    pub inventory_item_id: Option<InventoryItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_policy: Option<InventoryPolicy>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Storefront-agnostic mirror of one Shopify product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    pub shopify_id: ShopifyProductId,
    pub title: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub variants: Vec<CanonicalVariant>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub markets: MarketMap,
    /// Explicit storefront assignment. `None` means every storefront.
    #[serde(default)]
    pub storefronts: Option<BTreeSet<StorefrontId>>,
    #[serde(default)]
    pub published: bool,
    /// The last authoritative payload, unknown fields included.
    #[serde(default)]
    pub raw: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalItem {
    /// Look up a mirrored variant by Shopify id.
    #[must_use]
    pub fn variant(&self, id: ShopifyVariantId) -> Option<&CanonicalVariant> {
        self.variants.iter().find(|v| v.shopify_variant_id == id)
    }

    /// Merge a patch into this record.
    pub fn apply(&mut self, patch: &CanonicalPatch) {
        self.title.clone_from(&patch.title);
        if let Some(handle) = &patch.handle {
            self.handle.clone_from(handle);
        }
        self.status = patch.status;
        self.tags.clone_from(&patch.tags);
        self.variants.clone_from(&patch.variants);
        self.images.clone_from(&patch.images);
        self.raw.clone_from(&patch.raw);
        self.updated_at = patch.updated_at;
        if let Some(markets) = &patch.markets {
            self.markets.clone_from(markets);
        }
        if let Some(published) = patch.published {
            self.published = published;
        }
    }
}

/// Fields to set on a storefront [`Product`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markets: Option<MarketMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields to set on a storefront [`Variant`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<Stock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopify_variant_id: Option<ShopifyVariantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_item_id: Option<InventoryItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_policy: Option<InventoryPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields to set on a [`CanonicalItem`].
///
/// The mirror fields are always rewritten from the latest payload; markets
/// and the publication flag are only set when freshly computed. A payload
/// without a handle keeps the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPatch {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    pub status: ProductStatus,
    pub tags: Vec<String>,
    pub variants: Vec<CanonicalVariant>,
    pub images: Vec<String>,
    pub raw: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markets: Option<MarketMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::market::MarketAvailability;
    use crate::types::money::CurrencyCode;

    fn product() -> Product {
        Product {
            id: ProductId::new("p1"),
            storefront: StorefrontId::new("main"),
            shopify_id: ShopifyProductId::new(1),
            slug: "tee".to_string(),
            name: "Tee".to_string(),
            base_price: Decimal::new(2000, 2),
            images: vec![],
            categories: vec!["shirts".to_string()],
            markets: MarketMap::new(),
            legacy_markets: vec![MarketCode::new("US")],
            published: false,
            active: true,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_stock_clamps_negative() {
        assert_eq!(Stock::from_platform(-3), Stock::ZERO);
        assert_eq!(Stock::from_platform(7).get(), 7);
        let parsed: Stock = serde_json::from_str("-12").unwrap();
        assert_eq!(parsed, Stock::ZERO);
    }

    #[test]
    fn test_sells_in_prefers_market_map() {
        let mut p = product();
        assert!(p.sells_in(&MarketCode::new("US")));
        assert!(!p.sells_in(&MarketCode::new("CA")));

        p.markets.insert(
            MarketCode::new("US"),
            MarketAvailability {
                available: false,
                currency: CurrencyCode::usd(),
                shipping_rate: None,
                delivery_estimate: None,
                is_estimate: false,
            },
        );
        assert!(!p.sells_in(&MarketCode::new("US")));
    }

    #[test]
    fn test_patch_serializes_sparse() {
        let patch = ProductPatch {
            published: Some(true),
            ..ProductPatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "published": true }));
    }

    #[test]
    fn test_apply_leaves_unpatched_fields() {
        let mut p = product();
        p.apply(&ProductPatch {
            base_price: Some(Decimal::new(2200, 2)),
            ..ProductPatch::default()
        });
        assert_eq!(p.base_price, Decimal::new(2200, 2));
        assert_eq!(p.categories, vec!["shirts".to_string()]);
        assert!(!p.published);
    }
}
