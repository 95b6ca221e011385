//! Status enums shared between the catalog and the Shopify mirror.

use serde::{Deserialize, Serialize};

/// Product lifecycle status.
///
/// Maps to Shopify's product status values. Webhooks send lower case
/// (`"active"`) while GraphQL sends `ACTIVE`; both are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    #[serde(alias = "ACTIVE")]
    Active,
    #[serde(alias = "DRAFT")]
    Draft,
    #[serde(alias = "ARCHIVED")]
    Archived,
}

impl ProductStatus {
    /// Whether the product may be sold and published.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// What Shopify does when a variant is out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InventoryPolicy {
    /// Stop selling at zero.
    #[default]
    #[serde(alias = "DENY")]
    Deny,
    /// Keep selling (backorder).
    #[serde(alias = "CONTINUE")]
    Continue,
}

impl InventoryPolicy {
    /// Whether the variant may be sold regardless of stock.
    #[must_use]
    pub const fn allows_backorder(self) -> bool {
        matches!(self, Self::Continue)
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Draft => write!(f, "draft"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "draft" => Ok(Self::Draft),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("invalid product status: {s}")),
        }
    }
}
