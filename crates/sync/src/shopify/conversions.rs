//! Conversion from Shopify payloads to canonical records.

use chrono::{DateTime, Utc};
use shopfleet_core::{CanonicalItem, CanonicalPatch, CanonicalVariant, MarketMap, Stock};

use super::types::{OptionPayload, ProductPayload, VariantPayload};

/// Option names that carry the size attribute.
const SIZE_OPTION_NAMES: &[&str] = &["size"];
/// Option names that carry the color attribute.
const COLOR_OPTION_NAMES: &[&str] = &["color", "colour", "type"];

/// Where size and color live among a product's options (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionLayout {
    pub size: Option<usize>,
    pub color: Option<usize>,
}

impl OptionLayout {
    /// Work out option positions from option names.
    ///
    /// Unnamed layouts fall back to option1 = size, option2 = color.
    #[must_use]
    pub fn from_options(options: &[OptionPayload]) -> Self {
        let position_of = |names: &[&str]| {
            options.iter().enumerate().find_map(|(index, option)| {
                let name = option.name.trim().to_lowercase();
                names
                    .contains(&name.as_str())
                    .then(|| option.position.unwrap_or(index + 1))
            })
        };

        let size = position_of(SIZE_OPTION_NAMES);
        let color = position_of(COLOR_OPTION_NAMES);

        match (size, color) {
            (None, None) => Self {
                size: Some(1),
                color: Some(2),
            },
            (size, color) => Self { size, color },
        }
    }
}

fn attribute(variant: &VariantPayload, position: Option<usize>) -> Option<String> {
    position
        .and_then(|p| variant.option(p))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Image URLs attached to a specific variant.
fn variant_images(payload: &ProductPayload, variant: &VariantPayload) -> Vec<String> {
    let id = variant.id.as_u64();
    payload
        .images
        .iter()
        .filter(|image| image.variant_ids.contains(&id) || (image.id.is_some() && image.id == variant.image_id))
        .map(|image| image.src.clone())
        .collect()
}

/// Convert every payload variant into canonical form.
///
/// Stock and inventory policy missing from the payload are carried over from
/// the `previous` mirror entry for the same Shopify variant.
#[must_use]
pub fn canonical_variants(
    payload: &ProductPayload,
    previous: Option<&CanonicalItem>,
) -> Vec<CanonicalVariant> {
    let layout = OptionLayout::from_options(&payload.options);

    payload
        .variants
        .iter()
        .map(|variant| {
            let known = previous.and_then(|item| item.variant(variant.id));
            CanonicalVariant {
                shopify_variant_id: variant.id,
                sku: variant
                    .sku
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from),
                size: attribute(variant, layout.size),
                color: attribute(variant, layout.color),
                price: variant.price,
                stock: variant
                    .inventory_quantity
                    .map(Stock::from_platform)
                    .or_else(|| known.and_then(|v| v.stock)),
                inventory_item_id: variant
                    .inventory_item_id
                    .or_else(|| known.and_then(|v| v.inventory_item_id)),
                inventory_policy: variant
                    .inventory_policy
                    .or_else(|| known.and_then(|v| v.inventory_policy)),
                images: variant_images(payload, variant),
            }
        })
        .collect()
}

/// Build the canonical patch for a payload.
///
/// `markets` and `published` are `None` when they were not freshly computed
/// and the stored values should stay. `previous` is the mirror as stored
/// before this payload arrived.
#[must_use]
pub fn canonical_patch(
    payload: &ProductPayload,
    previous: Option<&CanonicalItem>,
    raw: serde_json::Value,
    markets: Option<MarketMap>,
    published: Option<bool>,
    now: DateTime<Utc>,
) -> CanonicalPatch {
    CanonicalPatch {
        title: payload.title.clone(),
        handle: payload
            .handle
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from),
        status: payload.status(),
        tags: payload.tags.clone(),
        variants: canonical_variants(payload, previous),
        images: payload.images.iter().map(|i| i.src.clone()).collect(),
        raw,
        markets,
        published,
        updated_at: now,
    }
}
