//! Pure merge functions: (current record, authoritative facts) → patch.
//!
//! Each function returns only the fields whose value changes, or `None` when
//! the record already agrees with the facts. Re-running a merge against its
//! own output therefore yields `None`, which makes duplicate webhook
//! deliveries and retries harmless without any deduplication table.

use chrono::{DateTime, Utc};

use crate::types::{CanonicalItem, CanonicalVariant, Product, ProductPatch, Stock, Variant, VariantPatch};

/// `Some(new)` when it differs from `current`.
fn changed<T: PartialEq + Clone>(current: &T, new: &T) -> Option<T> {
    (current != new).then(|| new.clone())
}

/// Patch a storefront product from its canonical item.
///
/// Base price follows the first authoritative variant. Empty image lists and
/// empty market maps in the canonical item are treated as "unknown" and
/// leave the stored values alone.
#[must_use]
pub fn product_patch(
    existing: &Product,
    canonical: &CanonicalItem,
    now: DateTime<Utc>,
) -> Option<ProductPatch> {
    let mut patch = ProductPatch {
        base_price: canonical
            .variants
            .first()
            .and_then(|v| changed(&existing.base_price, &v.price)),
        published: changed(&existing.published, &canonical.published),
        ..ProductPatch::default()
    };

    if !canonical.images.is_empty() {
        patch.images = changed(&existing.images, &canonical.images);
    }
    if !canonical.markets.is_empty() {
        patch.markets = changed(&existing.markets, &canonical.markets);
    }

    if patch == ProductPatch::default() {
        return None;
    }
    patch.updated_at = Some(now);
    Some(patch)
}

/// Patch a storefront variant from the authoritative variant it matched.
///
/// Stock and inventory policy the mirror does not know leave the stored
/// values alone.
#[must_use]
pub fn variant_patch(
    existing: &Variant,
    facts: &CanonicalVariant,
    now: DateTime<Utc>,
) -> Option<VariantPatch> {
    let mut patch = VariantPatch {
        stock: facts.stock.and_then(|stock| changed(&existing.stock, &stock)),
        price: changed(&existing.price, &facts.price),
        shopify_variant_id: changed(&existing.shopify_variant_id, &Some(facts.shopify_variant_id))
            .flatten(),
        inventory_item_id: facts
            .inventory_item_id
            .and_then(|id| changed(&existing.inventory_item_id, &Some(id)).flatten()),
        inventory_policy: facts
            .inventory_policy
            .and_then(|policy| changed(&existing.inventory_policy, &policy)),
        ..VariantPatch::default()
    };

    if !facts.images.is_empty() {
        patch.images = changed(&existing.images, &facts.images);
    }

    if patch == VariantPatch::default() {
        return None;
    }
    patch.updated_at = Some(now);
    Some(patch)
}

/// Patch a storefront variant's stock to an authoritative quantity.
#[must_use]
pub fn stock_patch(existing: &Variant, stock: Stock, now: DateTime<Utc>) -> Option<VariantPatch> {
    changed(&existing.stock, &stock).map(|stock| VariantPatch {
        stock: Some(stock),
        updated_at: Some(now),
        ..VariantPatch::default()
    })
}

/// Patch a storefront product to inactive.
#[must_use]
pub fn deactivate_patch(existing: &Product, now: DateTime<Utc>) -> Option<ProductPatch> {
    existing.active.then(|| ProductPatch {
        active: Some(false),
        updated_at: Some(now),
        ..ProductPatch::default()
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::*;
    use crate::types::{
        InventoryItemId, InventoryPolicy, MarketMap, ProductId, ProductStatus, ShopifyProductId,
        ShopifyVariantId, StorefrontId, VariantId,
    };

    fn stored_product() -> Product {
        Product {
            id: ProductId::new("p1"),
            storefront: StorefrontId::new("main"),
            shopify_id: ShopifyProductId::new(10),
            slug: "tee".to_string(),
            name: "Tee".to_string(),
            base_price: Decimal::new(2000, 2),
            images: vec!["a.jpg".to_string()],
            categories: vec![],
            markets: MarketMap::new(),
            legacy_markets: vec![],
            published: false,
            active: true,
            updated_at: Utc::now(),
        }
    }

    fn stored_variant() -> Variant {
        Variant {
            id: VariantId::new("v1"),
            product_id: ProductId::new("p1"),
            size: Some("M".to_string()),
            color: Some("Black".to_string()),
            sku: Some("X-M-BLK".to_string()),
            stock: Stock::new(3),
            price: Decimal::new(2000, 2),
            shopify_variant_id: Some(ShopifyVariantId::new(100)),
            inventory_item_id: Some(InventoryItemId::new(200)),
            inventory_policy: InventoryPolicy::Deny,
            images: vec![],
            attributes: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    fn facts(price: i64, stock: u32) -> CanonicalVariant {
        CanonicalVariant {
            shopify_variant_id: ShopifyVariantId::new(100),
            sku: Some("X-M-BLK".to_string()),
            size: Some("M".to_string()),
            color: Some("Black".to_string()),
            price: Decimal::new(price, 2),
            stock: Some(Stock::new(stock)),
            inventory_item_id: Some(InventoryItemId::new(200)),
            inventory_policy: Some(InventoryPolicy::Deny),
            images: vec![],
        }
    }

    fn canonical(variants: Vec<CanonicalVariant>) -> CanonicalItem {
        CanonicalItem {
            shopify_id: ShopifyProductId::new(10),
            title: "Tee".to_string(),
            handle: "tee".to_string(),
            status: ProductStatus::Active,
            tags: vec![],
            variants,
            images: vec![],
            markets: MarketMap::new(),
            storefronts: None,
            published: true,
            raw: serde_json::Value::Null,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_variant_patch_only_changed_fields() {
        let patch = variant_patch(&stored_variant(), &facts(2200, 3), Utc::now()).unwrap_or_default();
        assert_eq!(patch.price, Some(Decimal::new(2200, 2)));
        assert_eq!(patch.stock, None);
        assert_eq!(patch.inventory_item_id, None);
        assert!(patch.updated_at.is_some());
    }

    #[test]
    fn test_variant_patch_is_idempotent() {
        let mut variant = stored_variant();
        let first = variant_patch(&variant, &facts(2200, 7), Utc::now());
        assert!(first.is_some());
        if let Some(patch) = &first {
            variant.apply(patch);
        }
        assert_eq!(variant_patch(&variant, &facts(2200, 7), Utc::now()), None);
    }

    #[test]
    fn test_variant_patch_keeps_unknown_stock_and_policy() {
        let mut variant = stored_variant();
        variant.inventory_policy = InventoryPolicy::Continue;
        let unknown = CanonicalVariant {
            stock: None,
            inventory_policy: None,
            ..facts(2200, 0)
        };

        let patch = variant_patch(&variant, &unknown, Utc::now()).unwrap_or_default();
        assert_eq!(patch.price, Some(Decimal::new(2200, 2)));
        assert_eq!(patch.stock, None);
        assert_eq!(patch.inventory_policy, None);

        let same_price = CanonicalVariant {
            price: variant.price,
            ..unknown
        };
        assert_eq!(variant_patch(&variant, &same_price, Utc::now()), None);
    }

    #[test]
    fn test_product_patch_uses_first_variant_price() {
        let item = canonical(vec![facts(2200, 1), facts(9900, 1)]);
        let patch = product_patch(&stored_product(), &item, Utc::now()).unwrap_or_default();
        assert_eq!(patch.base_price, Some(Decimal::new(2200, 2)));
        assert_eq!(patch.published, Some(true));
        // Empty canonical images keep the stored ones
        assert_eq!(patch.images, None);
    }

    #[test]
    fn test_product_patch_none_when_in_agreement() {
        let mut product = stored_product();
        product.published = true;
        let item = canonical(vec![facts(2000, 1)]);
        assert_eq!(product_patch(&product, &item, Utc::now()), None);
    }

    #[test]
    fn test_stock_patch() {
        let variant = stored_variant();
        assert_eq!(stock_patch(&variant, Stock::new(3), Utc::now()), None);
        let patch = stock_patch(&variant, Stock::new(5), Utc::now()).unwrap_or_default();
        assert_eq!(patch.stock, Some(Stock::new(5)));
        assert_eq!(patch.price, None);
    }

    #[test]
    fn test_deactivate_patch() {
        let mut product = stored_product();
        let patch = deactivate_patch(&product, Utc::now());
        assert_eq!(patch.as_ref().and_then(|p| p.active), Some(false));
        product.active = false;
        assert_eq!(deactivate_patch(&product, Utc::now()), None);
    }
}
