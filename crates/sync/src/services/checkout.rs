//! Checkout validation.
//!
//! Three checks run concurrently against the cart:
//!
//! - **Market**: every product is sold into the destination market
//! - **Inventory**: live Shopify stock at locations serving the market covers
//!   each variant, falling back to stored stock when Shopify can't answer
//! - **Shipping**: Shopify can quote shipping to the address
//!
//! Each check has its own time budget. A check that times out or hits a
//! platform error reports `unavailable` instead of failing the request.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shopfleet_core::{
    CartLineItem, CheckStatus, FailureKind, InventoryCheck, InventoryLine, MarketCheck,
    MarketCode, PipelineDefaults, ProductId, ShippingAddress, ShippingCheck, ShopifyVariantId,
    StockSource, StorefrontId, UnavailableItem, ValidationResult, VariantId,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::reconciler::{ReconcileJob, ReconcilerHandle};
use crate::db::{CatalogStore, RepositoryError};
use crate::shopify::{CommercePlatform, ShippingLine, VariantInventory};

/// Body of `POST /api/checkout/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CartLineItem>,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
}

/// Carts that cannot be validated at all.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    /// Some lines were never mapped to Shopify variants.
    #[error("cart contains items with incomplete catalog data")]
    DataIntegrity(Box<ValidationResult>),
}

/// One Shopify variant in the cart with quantities summed across lines.
#[derive(Debug, Clone)]
struct CartVariant<'a> {
    line: &'a CartLineItem,
    shopify_variant_id: ShopifyVariantId,
    requested: u32,
}

fn display_name(line: &CartLineItem) -> String {
    line.product_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| line.product_id.to_string())
}

/// Group lines by Shopify variant, keeping first-seen order.
fn cart_variants(items: &[CartLineItem]) -> Vec<CartVariant<'_>> {
    let mut grouped: Vec<CartVariant<'_>> = Vec::new();
    for line in items {
        let Some(id) = line.shopify_variant_id else {
            continue;
        };
        match grouped.iter_mut().find(|v| v.shopify_variant_id == id) {
            Some(existing) => existing.requested = existing.requested.saturating_add(line.quantity),
            None => grouped.push(CartVariant {
                line,
                shopify_variant_id: id,
                requested: line.quantity,
            }),
        }
    }
    grouped
}

/// Product ids of lines without a Shopify variant, deduplicated.
fn unmapped_products(items: &[CartLineItem]) -> Vec<ProductId> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|line| line.shopify_variant_id.is_none())
        .map(|line| line.product_id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn stock_reason(name: &str, available: u32) -> String {
    if available == 0 {
        format!("{name} is out of stock")
    } else {
        format!("Only {available} of {name} left in stock")
    }
}

/// Run a check step under a time budget, logging why it didn't finish.
async fn bounded<T, E: Display>(
    limit: Duration,
    check: &'static str,
    step: impl Future<Output = Result<T, E>>,
) -> Option<T> {
    match tokio::time::timeout(limit, step).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(check, error = %e, "Checkout check failed");
            None
        }
        Err(_) => {
            warn!(check, timeout_ms = limit.as_millis(), "Checkout check timed out");
            None
        }
    }
}

/// Validates carts before handing off to Shopify checkout.
#[derive(Clone)]
pub struct CheckoutValidator {
    platform: Arc<dyn CommercePlatform>,
    store: Arc<dyn CatalogStore>,
    defaults: Arc<PipelineDefaults>,
    timeout: Duration,
    reconciler: ReconcilerHandle,
}

impl CheckoutValidator {
    #[must_use]
    pub fn new(
        platform: Arc<dyn CommercePlatform>,
        store: Arc<dyn CatalogStore>,
        defaults: Arc<PipelineDefaults>,
        timeout: Duration,
        reconciler: ReconcilerHandle,
    ) -> Self {
        Self {
            platform,
            store,
            defaults,
            timeout,
            reconciler,
        }
    }

    /// Validate a cart.
    ///
    /// A negative verdict is a normal `Ok` result.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` for an empty cart and
    /// `CheckoutError::DataIntegrity` when a line has no Shopify variant;
    /// neither makes any external call.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn validate(
        &self,
        request: &CheckoutRequest,
    ) -> Result<ValidationResult, CheckoutError> {
        if request.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let market = request
            .shipping_address
            .market()
            .unwrap_or_else(|| self.defaults.default_market.clone());

        let unmapped = unmapped_products(&request.items);
        if !unmapped.is_empty() {
            warn!(products = ?unmapped, "Cart has items without Shopify variants");
            return Err(CheckoutError::DataIntegrity(Box::new(
                ValidationResult::data_integrity(market, &unmapped),
            )));
        }

        let (market_check, inventory_check, shipping_check) = tokio::join!(
            self.check_market(&request.items, &market),
            self.check_inventory(&request.items, &market),
            self.check_shipping(&request.items, &request.shipping_address),
        );

        self.submit_repairs(&request.items, &inventory_check);

        let result = ValidationResult::aggregate(market_check, inventory_check, shipping_check);
        info!(
            market = %market,
            valid = result.valid,
            unavailable = result.unavailable_items.len(),
            "Cart validated"
        );
        Ok(result)
    }

    fn storefront<'a>(&'a self, line: &'a CartLineItem) -> &'a StorefrontId {
        line.storefront
            .as_ref()
            .unwrap_or(&self.defaults.default_storefront)
    }

    async fn check_market(&self, items: &[CartLineItem], market: &MarketCode) -> MarketCheck {
        match bounded(self.timeout, "market", self.evaluate_market(items, market)).await {
            Some(unavailable) => MarketCheck {
                status: if unavailable.is_empty() {
                    CheckStatus::Passed
                } else {
                    CheckStatus::Failed
                },
                market: market.clone(),
                unavailable,
                reason: None,
            },
            None => MarketCheck {
                status: CheckStatus::Unavailable,
                market: market.clone(),
                unavailable: vec![],
                reason: Some("We couldn't confirm product availability for your region".to_string()),
            },
        }
    }

    async fn evaluate_market(
        &self,
        items: &[CartLineItem],
        market: &MarketCode,
    ) -> Result<Vec<UnavailableItem>, RepositoryError> {
        let mut seen = HashSet::new();
        let mut unavailable = Vec::new();

        for line in items {
            let storefront = self.storefront(line);
            if !seen.insert((storefront, &line.product_id)) {
                continue;
            }

            let name = display_name(line);
            let reason = match self.store.product(storefront, &line.product_id).await? {
                None => Some(format!("{name} is no longer available")),
                Some(product) if !product.active => Some(format!("{name} is no longer available")),
                Some(product) if !product.sells_in(market) => {
                    Some(format!("{name} is not available in {market}"))
                }
                Some(_) => None,
            };

            if let Some(reason) = reason {
                unavailable.push(UnavailableItem {
                    product_name: name,
                    product_id: line.product_id.clone(),
                    variant_id: Some(line.variant_id.clone()),
                    reason,
                    kind: FailureKind::Market,
                });
            }
        }

        Ok(unavailable)
    }

    async fn check_inventory(&self, items: &[CartLineItem], market: &MarketCode) -> InventoryCheck {
        let variants = cart_variants(items);
        let ids: Vec<ShopifyVariantId> = variants.iter().map(|v| v.shopify_variant_id).collect();

        let lines = match bounded(
            self.timeout,
            "inventory",
            self.platform.variant_inventory(&ids, Some(market)),
        )
        .await
        {
            Some(live) => Some(Self::authoritative_lines(&variants, &live)),
            None => bounded(self.timeout, "inventory_fallback", self.stored_lines(&variants)).await,
        };

        let Some(lines) = lines else {
            return InventoryCheck {
                status: CheckStatus::Unavailable,
                lines: vec![],
                unavailable: vec![],
                reason: Some("We couldn't confirm stock levels right now".to_string()),
            };
        };

        let unavailable: Vec<UnavailableItem> = lines
            .iter()
            .filter(|(line, _)| !line.sufficient)
            .map(|(line, (name, reason))| UnavailableItem {
                product_name: name.clone(),
                product_id: line.product_id.clone(),
                variant_id: Some(line.variant_id.clone()),
                reason: reason.clone(),
                kind: FailureKind::Inventory,
            })
            .collect();

        InventoryCheck {
            status: if unavailable.is_empty() {
                CheckStatus::Passed
            } else {
                CheckStatus::Failed
            },
            lines: lines.into_iter().map(|(line, _)| line).collect(),
            unavailable,
            reason: None,
        }
    }

    /// Lines from live inventory, each with its display name and shortage reason.
    fn authoritative_lines(
        variants: &[CartVariant<'_>],
        live: &HashMap<ShopifyVariantId, VariantInventory>,
    ) -> Vec<(InventoryLine, (String, String))> {
        variants
            .iter()
            .map(|v| {
                let name = display_name(v.line);
                let (available, backorder, sufficient, reason) =
                    match live.get(&v.shopify_variant_id) {
                        Some(inventory) => (
                            inventory.available.get(),
                            inventory.policy.allows_backorder(),
                            inventory.covers(v.requested),
                            stock_reason(&name, inventory.available.get()),
                        ),
                        None => (0, false, false, format!("{name} is no longer available")),
                    };
                (
                    InventoryLine {
                        product_id: v.line.product_id.clone(),
                        variant_id: v.line.variant_id.clone(),
                        shopify_variant_id: v.shopify_variant_id,
                        requested: v.requested,
                        available,
                        backorder,
                        sufficient,
                        source: StockSource::Authoritative,
                    },
                    (name, reason),
                )
            })
            .collect()
    }

    /// Lines from the storefront's stored stock.
    async fn stored_lines(
        &self,
        variants: &[CartVariant<'_>],
    ) -> Result<Vec<(InventoryLine, (String, String))>, RepositoryError> {
        let mut lines = Vec::with_capacity(variants.len());
        for v in variants {
            let name = display_name(v.line);
            let stored = self
                .store
                .variant(self.storefront(v.line), &v.line.product_id, &v.line.variant_id)
                .await?;

            let (available, backorder, sufficient, reason) = match stored {
                Some(variant) => {
                    let backorder = variant.inventory_policy.allows_backorder();
                    (
                        variant.stock.get(),
                        backorder,
                        backorder || variant.stock.covers(v.requested),
                        stock_reason(&name, variant.stock.get()),
                    )
                }
                None => (0, false, false, format!("{name} is no longer available")),
            };

            lines.push((
                InventoryLine {
                    product_id: v.line.product_id.clone(),
                    variant_id: v.line.variant_id.clone(),
                    shopify_variant_id: v.shopify_variant_id,
                    requested: v.requested,
                    available,
                    backorder,
                    sufficient,
                    source: StockSource::Stored,
                },
                (name, reason),
            ));
        }
        Ok(lines)
    }

    async fn check_shipping(
        &self,
        items: &[CartLineItem],
        address: &ShippingAddress,
    ) -> ShippingCheck {
        let Some(market) = address.market() else {
            return ShippingCheck {
                status: CheckStatus::Failed,
                rate: None,
                reason: Some("A shipping country is required".to_string()),
            };
        };

        let lines: Vec<ShippingLine> = cart_variants(items)
            .iter()
            .map(|v| ShippingLine {
                variant_id: v.shopify_variant_id,
                quantity: v.requested,
            })
            .collect();

        match bounded(
            self.timeout,
            "shipping",
            self.platform.quote_shipping(&lines, address),
        )
        .await
        {
            None => ShippingCheck {
                status: CheckStatus::Unavailable,
                rate: None,
                reason: Some("Shipping rates are unavailable right now".to_string()),
            },
            Some(rates) => match rates.into_iter().min_by_key(|r| r.price.amount) {
                Some(rate) => ShippingCheck {
                    status: CheckStatus::Passed,
                    rate: Some(rate),
                    reason: None,
                },
                None => ShippingCheck {
                    status: CheckStatus::Failed,
                    rate: None,
                    reason: Some(format!("We can't ship this order to {market}")),
                },
            },
        }
    }

    /// Hand variants that failed the inventory check to the reconciler.
    fn submit_repairs(&self, items: &[CartLineItem], inventory: &InventoryCheck) {
        let mut jobs: BTreeMap<(StorefrontId, ProductId), Vec<VariantId>> = BTreeMap::new();
        for item in &inventory.unavailable {
            let Some(variant_id) = &item.variant_id else {
                continue;
            };
            let Some(line) = items
                .iter()
                .find(|l| l.product_id == item.product_id && &l.variant_id == variant_id)
            else {
                continue;
            };
            let variants = jobs
                .entry((self.storefront(line).clone(), item.product_id.clone()))
                .or_default();
            if !variants.contains(variant_id) {
                variants.push(variant_id.clone());
            }
        }

        for ((storefront, product_id), variant_ids) in jobs {
            self.reconciler.submit(ReconcileJob {
                storefront,
                product_id,
                variant_ids,
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(product: &str, variant: &str, shopify: Option<u64>, quantity: u32) -> CartLineItem {
        CartLineItem {
            product_id: ProductId::new(product),
            variant_id: VariantId::new(variant),
            shopify_variant_id: shopify.map(ShopifyVariantId::new),
            quantity,
            price: Decimal::new(2000, 2),
            storefront: None,
            product_name: None,
        }
    }

    #[test]
    fn test_cart_variants_sum_quantities() {
        let items = vec![line("p1", "v1", Some(1), 2), line("p1", "v1", Some(1), 3), line("p2", "v2", Some(2), 1)];
        let grouped = cart_variants(&items);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].requested, 5);
        assert_eq!(grouped[1].shopify_variant_id, ShopifyVariantId::new(2));
    }

    #[test]
    fn test_unmapped_products_deduplicated() {
        let items = vec![line("p1", "v1", None, 1), line("p1", "v2", None, 1), line("p2", "v3", Some(3), 1)];
        assert_eq!(unmapped_products(&items), vec![ProductId::new("p1")]);
    }

    #[test]
    fn test_display_name_falls_back_to_product_id() {
        let mut item = line("p1", "v1", Some(1), 1);
        assert_eq!(display_name(&item), "p1");
        item.product_name = Some("Classic Tee".to_string());
        assert_eq!(display_name(&item), "Classic Tee");
    }

    #[test]
    fn test_stock_reason() {
        assert_eq!(stock_reason("Tee", 0), "Tee is out of stock");
        assert_eq!(stock_reason("Tee", 2), "Only 2 of Tee left in stock");
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, String>(1)
        };
        assert_eq!(bounded(Duration::from_millis(10), "test", slow).await, None);

        let failing = async { Err::<u32, _>("boom") };
        assert_eq!(bounded(Duration::from_secs(1), "test", failing).await, None);

        let ok = async { Ok::<_, String>(7) };
        assert_eq!(bounded(Duration::from_secs(1), "test", ok).await, Some(7));
    }
}
