//! Typed product payloads.
//!
//! Shopify product webhooks use the REST resource shape. Only the fields the
//! pipeline reads are typed here; the full body is kept as raw JSON on the
//! canonical item.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use shopfleet_core::{InventoryItemId, InventoryPolicy, ProductStatus, ShopifyProductId, ShopifyVariantId};

/// A product as delivered by `products/create` and `products/update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPayload {
    pub id: ShopifyProductId,
    pub title: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    /// Comma-separated in webhooks, a list in GraphQL.
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    pub variants: Vec<VariantPayload>,
    #[serde(default)]
    pub options: Vec<OptionPayload>,
    #[serde(default)]
    pub images: Vec<ImagePayload>,
}

impl ProductPayload {
    /// Status, treating a missing value as active.
    #[must_use]
    pub fn status(&self) -> ProductStatus {
        self.status.unwrap_or_default()
    }
}

/// A variant inside a product payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPayload {
    pub id: ShopifyVariantId,
    #[serde(default)]
    pub sku: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default)]
    pub option3: Option<String>,
    /// Total available across all locations. Negative when oversold.
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
    #[serde(default)]
    pub inventory_item_id: Option<InventoryItemId>,
    #[serde(default)]
    pub inventory_policy: Option<InventoryPolicy>,
    #[serde(default)]
    pub image_id: Option<u64>,
}

impl VariantPayload {
    /// Option value at a 1-based position.
    #[must_use]
    pub fn option(&self, position: usize) -> Option<&str> {
        match position {
            1 => self.option1.as_deref(),
            2 => self.option2.as_deref(),
            3 => self.option3.as_deref(),
            _ => None,
        }
    }
}

/// A product option definition (e.g. "Size" with values S, M, L).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionPayload {
    pub name: String,
    /// 1-based position; falls back to list order when missing.
    #[serde(default)]
    pub position: Option<usize>,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    #[serde(default)]
    pub id: Option<u64>,
    pub src: String,
    #[serde(default)]
    pub variant_ids: Vec<u64>,
}

fn deserialize_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
        Null,
    }

    let tags = match Raw::deserialize(deserializer)? {
        Raw::List(list) => list,
        Raw::Text(text) => text.split(',').map(String::from).collect(),
        Raw::Null => Vec::new(),
    };

    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}
