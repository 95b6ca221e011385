//! The commerce platform seam.

use std::collections::HashMap;

use async_trait::async_trait;
use shopfleet_core::{
    InventoryPolicy, MarketCode, MarketListing, ShippingAddress, ShippingRate, ShopifyProductId,
    ShopifyVariantId, Stock,
};

use super::{ProductPayload, ShopifyError};

/// Market publication metadata for one product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductMarkets {
    /// One entry per market the product is listed in.
    pub listings: Vec<MarketListing>,
    /// Whether the product is published to the online store channel.
    pub published_online: bool,
}

impl ProductMarkets {
    /// Find the listing for a market.
    #[must_use]
    pub fn listing(&self, market: &MarketCode) -> Option<&MarketListing> {
        self.listings.iter().find(|l| &l.market == market)
    }
}

/// Live inventory of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantInventory {
    /// Available quantity, summed over the queried locations.
    pub available: Stock,
    /// Untracked variants report `Continue`.
    pub policy: InventoryPolicy,
}

impl VariantInventory {
    /// Whether this inventory satisfies a requested quantity.
    #[must_use]
    pub const fn covers(&self, requested: u32) -> bool {
        self.policy.allows_backorder() || self.available.covers(requested)
    }
}

/// One line of a shipping quote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingLine {
    pub variant_id: ShopifyVariantId,
    pub quantity: u32,
}

/// Operations the pipeline needs from the commerce platform.
///
/// Every method distinguishes "the platform answered" (`Ok`) from "the
/// platform could not be asked" (`Err`); callers fall back only on `Err`.
#[async_trait]
pub trait CommercePlatform: Send + Sync {
    /// Fetch a product. `Ok(None)` when it no longer exists.
    async fn product(&self, id: ShopifyProductId) -> Result<Option<ProductPayload>, ShopifyError>;

    /// Market listings and online-store publication of a product.
    async fn product_markets(&self, id: ShopifyProductId) -> Result<ProductMarkets, ShopifyError>;

    /// Shipping rate configured for a market. `Ok(None)` when none is configured.
    async fn shipping_rate(&self, market: &MarketCode) -> Result<Option<ShippingRate>, ShopifyError>;

    /// Quote shipping for a cart. An empty list means the cart can't ship there.
    async fn quote_shipping(
        &self,
        lines: &[ShippingLine],
        address: &ShippingAddress,
    ) -> Result<Vec<ShippingRate>, ShopifyError>;

    /// Live inventory for variants.
    ///
    /// With a market, only locations that ship to it are counted. Variants
    /// that no longer exist are absent from the result.
    async fn variant_inventory(
        &self,
        ids: &[ShopifyVariantId],
        market: Option<&MarketCode>,
    ) -> Result<HashMap<ShopifyVariantId, VariantInventory>, ShopifyError>;

    /// Publish a product to the online store channel.
    async fn publish_product(&self, id: ShopifyProductId) -> Result<(), ShopifyError>;
}
