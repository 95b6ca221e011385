//! Market (country) availability types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::StorefrontId;
use super::money::{CurrencyCode, Money};

/// A market the storefronts sell into, keyed by ISO country code.
///
/// Normalized to trimmed upper case so `" us"` and `"US"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MarketCode(String);

impl MarketCode {
    /// Create a market code, normalizing case and whitespace.
    #[must_use]
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code is blank after normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for MarketCode {
    fn from(code: String) -> Self {
        Self::new(&code)
    }
}

impl From<&str> for MarketCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<MarketCode> for String {
    fn from(code: MarketCode) -> Self {
        code.0
    }
}

impl fmt::Display for MarketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery window in business days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEstimate {
    pub min_days: u32,
    pub max_days: u32,
}

impl DeliveryEstimate {
    /// Create a window, swapping the bounds if given in reverse.
    #[must_use]
    pub const fn new(min_days: u32, max_days: u32) -> Self {
        if min_days <= max_days {
            Self { min_days, max_days }
        } else {
            Self {
                min_days: max_days,
                max_days: min_days,
            }
        }
    }
}

impl FromStr for DeliveryEstimate {
    type Err = String;

    /// Parse `"3-7"` or a single `"5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| format!("invalid delivery days '{s}': {e}"))
        };
        match s.split_once('-') {
            Some((min, max)) => Ok(Self::new(parse(min)?, parse(max)?)),
            None => {
                let days = parse(s)?;
                Ok(Self::new(days, days))
            }
        }
    }
}

/// Computed availability of one product in one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAvailability {
    /// Whether the product may be sold into this market.
    pub available: bool,
    /// Currency shoppers in this market pay in.
    pub currency: CurrencyCode,
    /// Shipping rate for this market, if known.
    pub shipping_rate: Option<Decimal>,
    /// Delivery window, if known.
    pub delivery_estimate: Option<DeliveryEstimate>,
    /// True when any field came from configuration or a fail-open default
    /// rather than from Shopify.
    pub is_estimate: bool,
}

/// Per-market availability keyed by market code.
pub type MarketMap = BTreeMap<MarketCode, MarketAvailability>;

/// What Shopify reports about a product's publication in one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketListing {
    pub market: MarketCode,
    /// Whether the product is published to this market's catalog.
    pub published: bool,
    /// The market's selling currency.
    pub currency: CurrencyCode,
}

/// An authoritative shipping rate from Shopify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingRate {
    /// Rate title (e.g., "Standard").
    pub title: String,
    pub price: Money,
    pub delivery_estimate: Option<DeliveryEstimate>,
}

/// A configured shipping estimate, used when Shopify has no rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingEstimate {
    pub rate: Decimal,
    pub currency: CurrencyCode,
    pub delivery_estimate: DeliveryEstimate,
}

/// Fallback values injected into the pipeline.
///
/// Loaded once from configuration so no call site hard-codes a default
/// market, storefront, or shipping estimate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefaults {
    /// Market used when a checkout has no destination country.
    pub default_market: MarketCode,
    /// Storefront assumed for cart lines that don't name one.
    pub default_storefront: StorefrontId,
    /// Estimate used for markets without a specific entry.
    pub default_shipping: ShippingEstimate,
    /// Per-market estimates.
    pub shipping_estimates: BTreeMap<MarketCode, ShippingEstimate>,
}

impl PipelineDefaults {
    /// The configured estimate for a market, or the default estimate.
    #[must_use]
    pub fn estimate_for(&self, market: &MarketCode) -> &ShippingEstimate {
        self.shipping_estimates
            .get(market)
            .unwrap_or(&self.default_shipping)
    }
}
