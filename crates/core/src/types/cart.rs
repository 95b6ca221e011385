//! Cart line items and shipping destinations submitted at checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, ShopifyVariantId, StorefrontId, VariantId};
use super::market::MarketCode;

/// One line of a cart, as captured when the shopper added it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    /// Missing when the catalog import never mapped this variant to Shopify.
    #[serde(default)]
    pub shopify_variant_id: Option<ShopifyVariantId>,
    pub quantity: u32,
    /// Unit price at add-to-cart time.
    pub price: Decimal,
    /// Storefront the line was added from.
    #[serde(default)]
    pub storefront: Option<StorefrontId>,
    /// Display name captured with the line, if the client sent one.
    #[serde(default)]
    pub product_name: Option<String>,
}

/// Destination address for shipping checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub province_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
}

impl ShippingAddress {
    /// The destination market, if the address names a country.
    #[must_use]
    pub fn market(&self) -> Option<MarketCode> {
        self.country_code
            .as_deref()
            .map(MarketCode::new)
            .filter(|code| !code.is_empty())
    }
}
