//! Matching authoritative variants to stored storefront variants.
//!
//! The catalog is keyed primarily by size, so a size match is accepted even
//! without a color match, while a color match alone never is. When two stored
//! variants share a size and neither carries a SKU, a size-only match can pick
//! the wrong color; a size+color match is preferred to narrow that case.

use crate::types::{CanonicalVariant, Variant};

/// The attributes a variant is matched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantKey<'a> {
    pub sku: Option<&'a str>,
    pub size: Option<&'a str>,
    pub color: Option<&'a str>,
}

impl<'a> From<&'a Variant> for VariantKey<'a> {
    fn from(variant: &'a Variant) -> Self {
        Self {
            sku: variant.sku.as_deref(),
            size: variant.size.as_deref(),
            color: variant.color.as_deref(),
        }
    }
}

impl<'a> From<&'a CanonicalVariant> for VariantKey<'a> {
    fn from(variant: &'a CanonicalVariant) -> Self {
        Self {
            sku: variant.sku.as_deref(),
            size: variant.size.as_deref(),
            color: variant.color.as_deref(),
        }
    }
}

/// Normalize an attribute for comparison. Blank values count as absent.
fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn same_attribute(a: Option<&str>, b: Option<&str>) -> bool {
    match (normalized(a), normalized(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn same_sku(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(str::trim), b.map(str::trim)) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

/// Find the stored variant an authoritative variant corresponds to.
///
/// First match wins, in order: exact SKU, size and color, size alone.
#[must_use]
pub fn match_variant<'v>(incoming: VariantKey<'_>, existing: &'v [Variant]) -> Option<&'v Variant> {
    let keys = || existing.iter().map(|v| (v, VariantKey::from(v)));

    keys()
        .find(|(_, key)| same_sku(incoming.sku, key.sku))
        .or_else(|| {
            keys().find(|(_, key)| {
                same_attribute(incoming.size, key.size) && same_attribute(incoming.color, key.color)
            })
        })
        .or_else(|| keys().find(|(_, key)| same_attribute(incoming.size, key.size)))
        .map(|(variant, _)| variant)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::types::{InventoryPolicy, ProductId, Stock, VariantId};

    fn variant(id: &str, sku: Option<&str>, size: Option<&str>, color: Option<&str>) -> Variant {
        Variant {
            id: VariantId::new(id),
            product_id: ProductId::new("p1"),
            size: size.map(String::from),
            color: color.map(String::from),
            sku: sku.map(String::from),
            stock: Stock::new(1),
            price: Decimal::new(2000, 2),
            shopify_variant_id: None,
            inventory_item_id: None,
            inventory_policy: InventoryPolicy::Deny,
            images: vec![],
            attributes: std::collections::BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    fn key<'a>(sku: Option<&'a str>, size: Option<&'a str>, color: Option<&'a str>) -> VariantKey<'a> {
        VariantKey { sku, size, color }
    }

    fn matched_id(incoming: VariantKey<'_>, existing: &[Variant]) -> Option<String> {
        match_variant(incoming, existing).map(|v| v.id.to_string())
    }

    #[test]
    fn test_match_table() {
        let existing = vec![
            variant("a", Some("TEE-S-RED"), Some("S"), Some("Red")),
            variant("b", None, Some("M"), Some("Blue")),
            variant("c", None, Some("M"), Some("Black")),
            variant("d", Some(""), Some("L"), None),
        ];

        let cases: Vec<(VariantKey<'_>, Option<&str>)> = vec![
            // SKU wins even when attributes disagree
            (key(Some("TEE-S-RED"), Some("XL"), Some("Green")), Some("a")),
            // Size and color, case and whitespace insensitive
            (key(None, Some(" m "), Some("BLACK")), Some("c")),
            // Size alone is enough (first by order)
            (key(None, Some("M"), Some("Purple")), Some("b")),
            // Color alone is not enough
            (key(None, Some("XS"), Some("Red")), None),
            // Blank SKUs never match each other
            (key(Some(""), None, None), None),
            // Unknown SKU falls through to size
            (key(Some("NOPE"), Some("L"), None), Some("d")),
            // Nothing to go on
            (key(None, None, None), None),
        ];

        for (incoming, expected) in cases {
            assert_eq!(
                matched_id(incoming, &existing).as_deref(),
                expected,
                "incoming {incoming:?}"
            );
        }
    }

    #[test]
    fn test_empty_existing_set() {
        assert!(match_variant(key(Some("X"), Some("S"), None), &[]).is_none());
    }
}
