//! Variant inventory lookups.

use std::collections::HashMap;

use serde::Deserialize;
use shopfleet_core::{InventoryPolicy, LocationId, MarketCode, ShopifyVariantId, Stock};
use tracing::instrument;

use super::{AdminClient, Connection, queries};
use crate::shopify::{ShopifyError, VariantInventory};

/// Shopify caps `nodes(ids:)` lookups; stay well under it.
const BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct NodesData {
    nodes: Vec<Option<VariantNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantNode {
    id: ShopifyVariantId,
    #[serde(default)]
    inventory_policy: InventoryPolicy,
    inventory_item: InventoryItemNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryItemNode {
    #[serde(default = "tracked_default")]
    tracked: bool,
    #[serde(default)]
    inventory_levels: Connection<InventoryLevelNode>,
}

const fn tracked_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct InventoryLevelNode {
    location: LocationRef,
    #[serde(default)]
    quantities: Vec<Quantity>,
}

#[derive(Debug, Deserialize)]
struct LocationRef {
    id: LocationId,
}

#[derive(Debug, Deserialize)]
struct Quantity {
    name: String,
    quantity: i64,
}

/// Sum available quantities, optionally over a subset of locations.
fn inventory_from(node: &VariantNode, locations: Option<&[LocationId]>) -> VariantInventory {
    let total: i64 = node
        .inventory_item
        .inventory_levels
        .nodes
        .iter()
        .filter(|level| locations.is_none_or(|ids| ids.contains(&level.location.id)))
        .flat_map(|level| &level.quantities)
        .filter(|q| q.name == "available")
        .map(|q| q.quantity)
        .sum();

    let policy = if node.inventory_item.tracked {
        node.inventory_policy
    } else {
        InventoryPolicy::Continue
    };

    VariantInventory {
        available: Stock::from_platform(total),
        policy,
    }
}

impl AdminClient {
    /// Get live inventory for variants.
    ///
    /// With a market, only locations that ship to that market are counted.
    ///
    /// # Errors
    ///
    /// Returns an error if any batch request fails.
    #[instrument(skip(self, ids), fields(variants = ids.len(), market = ?market))]
    pub async fn get_variant_inventory(
        &self,
        ids: &[ShopifyVariantId],
        market: Option<&MarketCode>,
    ) -> Result<HashMap<ShopifyVariantId, VariantInventory>, ShopifyError> {
        let delivery = match market {
            Some(market) => Some(self.market_delivery(market).await?),
            None => None,
        };
        let locations = delivery.as_ref().map(|d| d.locations.as_slice());

        let mut inventory = HashMap::with_capacity(ids.len());
        for batch in ids.chunks(BATCH_SIZE) {
            let gids: Vec<String> = batch.iter().map(ShopifyVariantId::to_gid).collect();
            let data: NodesData = self
                .execute(queries::VARIANT_INVENTORY, serde_json::json!({ "ids": gids }))
                .await?;

            for node in data.nodes.into_iter().flatten() {
                inventory.insert(node.id, inventory_from(&node, locations));
            }
        }

        Ok(inventory)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn nodes() -> NodesData {
        serde_json::from_value(serde_json::json!({
            "nodes": [
                {
                    "id": "gid://shopify/ProductVariant/10",
                    "inventoryPolicy": "DENY",
                    "inventoryItem": {
                        "tracked": true,
                        "inventoryLevels": { "nodes": [
                            { "location": { "id": "gid://shopify/Location/1" }, "quantities": [ { "name": "available", "quantity": 4 } ] },
                            { "location": { "id": "gid://shopify/Location/2" }, "quantities": [ { "name": "available", "quantity": -1 } ] },
                            { "location": { "id": "gid://shopify/Location/3" }, "quantities": [ { "name": "available", "quantity": 7 } ] }
                        ] }
                    }
                },
                null,
                {
                    "id": "gid://shopify/ProductVariant/11",
                    "inventoryPolicy": "DENY",
                    "inventoryItem": { "tracked": false, "inventoryLevels": { "nodes": [] } }
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_inventory_sums_all_locations() {
        let data = nodes();
        let node = data.nodes[0].as_ref().unwrap();
        let inventory = inventory_from(node, None);
        assert_eq!(inventory.available, Stock::new(10));
        assert_eq!(inventory.policy, InventoryPolicy::Deny);
    }

    #[test]
    fn test_inventory_restricted_to_market_locations() {
        let data = nodes();
        let node = data.nodes[0].as_ref().unwrap();
        let locations = [LocationId::new(1), LocationId::new(2)];
        let inventory = inventory_from(node, Some(&locations));
        assert_eq!(inventory.available, Stock::new(3));
        assert!(!inventory.covers(4));
    }

    #[test]
    fn test_untracked_inventory_always_covers() {
        let data = nodes();
        assert!(data.nodes[1].is_none());
        let node = data.nodes[2].as_ref().unwrap();
        let inventory = inventory_from(node, Some(&[]));
        assert_eq!(inventory.available, Stock::ZERO);
        assert!(inventory.covers(100));
    }
}
