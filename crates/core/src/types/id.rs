//! Newtype IDs for type-safe entity references.
//!
//! Two families of IDs exist:
//!
//! - Document store keys ([`StorefrontId`], [`ProductId`], [`VariantId`]) are
//!   opaque strings chosen by the catalog importer.
//! - Shopify IDs ([`ShopifyProductId`], [`ShopifyVariantId`],
//!   [`InventoryItemId`]) are numeric. Webhooks deliver the bare number while
//!   the Admin GraphQL API speaks `gid://shopify/<Type>/<n>`, so these types
//!   accept either form and can render both.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error parsing a Shopify ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid Shopify {kind} id: {value}")]
pub struct InvalidShopifyId {
    /// The Shopify resource type (e.g., `Product`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`
/// - `Display` and `From<&str>` / `From<String>` implementations
///
/// # Example
///
/// ```rust
/// # use shopfleet_core::define_id;
/// define_id!(WarehouseId);
/// define_id!(BinId);
///
/// let warehouse = WarehouseId::new("east");
/// let bin = BinId::new("east");
///
/// // These are different types, so this won't compile:
/// // let _: WarehouseId = bin;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

/// Macro to define a Shopify numeric ID that understands GraphQL global IDs.
///
/// Serializes as the bare number. Deserializes from a number, a numeric
/// string, or a `gid://shopify/<kind>/<n>` string.
macro_rules! define_shopify_id {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Shopify resource type used in global IDs.
            pub const KIND: &'static str = $kind;

            /// Create a new ID from the numeric value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the underlying numeric value.
            #[must_use]
            pub const fn as_u64(&self) -> u64 {
                self.0
            }

            /// Render as a GraphQL global ID.
            #[must_use]
            pub fn to_gid(&self) -> String {
                format!("gid://shopify/{}/{}", Self::KIND, self.0)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = InvalidShopifyId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                let numeric = trimmed
                    .strip_prefix(concat!("gid://shopify/", $kind, "/"))
                    .unwrap_or(trimmed);
                // Global IDs may carry query parameters (e.g. `?inventory_item=1`)
                let numeric = numeric.split('?').next().unwrap_or(numeric);
                numeric.parse::<u64>().map(Self).map_err(|_| InvalidShopifyId {
                    kind: $kind,
                    value: s.to_owned(),
                })
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u64(self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Number(u64),
                    Text(String),
                }

                match Raw::deserialize(deserializer)? {
                    Raw::Number(n) => Ok(Self(n)),
                    Raw::Text(s) => s.parse().map_err(::serde::de::Error::custom),
                }
            }
        }
    };
}

// Document store keys
define_id!(StorefrontId);
define_id!(ProductId);
define_id!(VariantId);

// Shopify identifiers
define_shopify_id!(ShopifyProductId, "Product");
define_shopify_id!(ShopifyVariantId, "ProductVariant");
define_shopify_id!(InventoryItemId, "InventoryItem");
define_shopify_id!(LocationId, "Location");
