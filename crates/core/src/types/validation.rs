//! Checkout validation results.
//!
//! A [`ValidationResult`] exists for the duration of one checkout attempt and
//! is never persisted. A failed check is a normal negative answer, not an
//! error: every reason is itemized for the shopper.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::id::{ProductId, ShopifyVariantId, VariantId};
use super::market::{MarketCode, ShippingRate};

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    /// The check could not be completed (timeout, platform error). Blocks
    /// checkout like a failure.
    Unavailable,
    /// The check was not run because validation stopped earlier.
    Skipped,
}

impl CheckStatus {
    #[must_use]
    pub const fn passed(self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Which check rejected an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Market,
    Inventory,
}

/// A cart item that cannot be purchased, with a shopper-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableItem {
    pub product_name: String,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub reason: String,
    #[serde(rename = "type")]
    pub kind: FailureKind,
}

/// Market eligibility of every product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketCheck {
    pub status: CheckStatus,
    pub market: MarketCode,
    pub unavailable: Vec<UnavailableItem>,
    pub reason: Option<String>,
}

/// Where an inventory figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSource {
    /// Live from Shopify, restricted to locations serving the market.
    Authoritative,
    /// The storefront's stored copy, used when Shopify could not answer.
    Stored,
}

/// Inventory verdict for one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLine {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub shopify_variant_id: ShopifyVariantId,
    pub requested: u32,
    pub available: u32,
    pub backorder: bool,
    pub sufficient: bool,
    pub source: StockSource,
}

/// Stock sufficiency of every line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryCheck {
    pub status: CheckStatus,
    pub lines: Vec<InventoryLine>,
    pub unavailable: Vec<UnavailableItem>,
    pub reason: Option<String>,
}

/// Whether the cart can be shipped to the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingCheck {
    pub status: CheckStatus,
    pub rate: Option<ShippingRate>,
    pub reason: Option<String>,
}

/// Aggregated checkout verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub market: MarketCheck,
    pub inventory: InventoryCheck,
    pub shipping: ShippingCheck,
    pub errors: Vec<String>,
    pub unavailable_items: Vec<UnavailableItem>,
}

impl ValidationResult {
    /// Combine the three checks into one verdict.
    ///
    /// Item reasons are deduplicated by product name, market reasons first,
    /// then check-level reasons in market, inventory, shipping order.
    #[must_use]
    pub fn aggregate(market: MarketCheck, inventory: InventoryCheck, shipping: ShippingCheck) -> Self {
        let valid =
            market.status.passed() && inventory.status.passed() && shipping.status.passed();

        let unavailable_items: Vec<UnavailableItem> = market
            .unavailable
            .iter()
            .chain(&inventory.unavailable)
            .cloned()
            .collect();

        let mut seen_products = HashSet::new();
        let mut seen_messages = HashSet::new();
        let mut errors = Vec::new();

        for item in &unavailable_items {
            if seen_products.insert(item.product_name.as_str())
                && seen_messages.insert(item.reason.clone())
            {
                errors.push(item.reason.clone());
            }
        }

        let check_reasons = [&market.reason, &inventory.reason, &shipping.reason];
        for reason in check_reasons.into_iter().flatten() {
            if seen_messages.insert(reason.clone()) {
                errors.push(reason.clone());
            }
        }

        Self {
            valid,
            market,
            inventory,
            shipping,
            errors,
            unavailable_items,
        }
    }

    /// Verdict for a cart with lines that were never mapped to Shopify.
    ///
    /// No check runs; the catalog import is incomplete and retrying won't help.
    #[must_use]
    pub fn data_integrity(market: MarketCode, products: &[ProductId]) -> Self {
        let names = products
            .iter()
            .map(ProductId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let reason = format!(
            "Some items cannot be purchased right now because they are missing catalog data: {names}"
        );

        Self {
            valid: false,
            market: MarketCheck {
                status: CheckStatus::Skipped,
                market,
                unavailable: vec![],
                reason: None,
            },
            inventory: InventoryCheck {
                status: CheckStatus::Skipped,
                lines: vec![],
                unavailable: vec![],
                reason: None,
            },
            shipping: ShippingCheck {
                status: CheckStatus::Skipped,
                rate: None,
                reason: None,
            },
            errors: vec![reason],
            unavailable_items: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, reason: &str, kind: FailureKind) -> UnavailableItem {
        UnavailableItem {
            product_name: name.to_string(),
            product_id: ProductId::new(name.to_lowercase()),
            variant_id: None,
            reason: reason.to_string(),
            kind,
        }
    }

    fn passed_market() -> MarketCheck {
        MarketCheck {
            status: CheckStatus::Passed,
            market: MarketCode::new("US"),
            unavailable: vec![],
            reason: None,
        }
    }

    fn passed_inventory() -> InventoryCheck {
        InventoryCheck {
            status: CheckStatus::Passed,
            lines: vec![],
            unavailable: vec![],
            reason: None,
        }
    }

    fn passed_shipping() -> ShippingCheck {
        ShippingCheck {
            status: CheckStatus::Passed,
            rate: None,
            reason: None,
        }
    }

    #[test]
    fn test_all_passed_is_valid() {
        let result = ValidationResult::aggregate(passed_market(), passed_inventory(), passed_shipping());
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.unavailable_items.is_empty());
    }

    #[test]
    fn test_errors_deduplicated_by_product_name() {
        let mut market = passed_market();
        market.status = CheckStatus::Failed;
        market.unavailable = vec![item("Tee", "Tee is not available in CA", FailureKind::Market)];

        let mut inventory = passed_inventory();
        inventory.status = CheckStatus::Failed;
        inventory.unavailable = vec![
            item("Tee", "Only 0 of Tee left", FailureKind::Inventory),
            item("Hat", "Only 1 of Hat left", FailureKind::Inventory),
        ];

        let mut shipping = passed_shipping();
        shipping.status = CheckStatus::Unavailable;
        shipping.reason = Some("Shipping is unavailable".to_string());

        let result = ValidationResult::aggregate(market, inventory, shipping);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![
                "Tee is not available in CA".to_string(),
                "Only 1 of Hat left".to_string(),
                "Shipping is unavailable".to_string(),
            ]
        );
        assert_eq!(result.unavailable_items.len(), 3);
        assert_eq!(result.unavailable_items[1].kind, FailureKind::Inventory);
    }

    #[test]
    fn test_data_integrity_names_products() {
        let result =
            ValidationResult::data_integrity(MarketCode::new("US"), &[ProductId::new("p-9")]);
        assert!(!result.valid);
        assert_eq!(result.shipping.status, CheckStatus::Skipped);
        assert!(result.errors[0].contains("p-9"));
    }

    #[test]
    fn test_unavailable_item_serializes_type_tag() {
        let json = serde_json::to_value(item("Tee", "gone", FailureKind::Market)).unwrap_or_default();
        assert_eq!(json["type"], "market");
        assert_eq!(json["productName"], "Tee");
    }
}
