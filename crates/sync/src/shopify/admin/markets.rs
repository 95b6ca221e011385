//! Market publication lookups.

use serde::Deserialize;
use shopfleet_core::{CurrencyCode, MarketCode, MarketListing, ShopifyProductId};
use tracing::instrument;

use super::{AdminClient, Connection, queries};
use crate::shopify::{ProductMarkets, ShopifyError};

/// Name of the online store sales channel.
const ONLINE_STORE: &str = "Online Store";

#[derive(Debug, Deserialize)]
struct PublicationsData {
    publications: Connection<PublicationNode>,
}

#[derive(Debug, Deserialize)]
struct PublicationNode {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProductMarketsData {
    product: Option<ProductPublications>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductPublications {
    #[serde(default)]
    published_on_publication: bool,
    #[serde(default)]
    resource_publications_v2: Connection<ResourcePublication>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourcePublication {
    is_published: bool,
    publication: Publication,
}

#[derive(Debug, Deserialize)]
struct Publication {
    #[serde(default)]
    catalog: Option<Catalog>,
}

/// Only market catalogs carry `markets`; other catalog types deserialize empty.
#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    markets: Option<Connection<Market>>,
}

#[derive(Debug, Deserialize)]
struct Market {
    #[serde(default)]
    regions: Connection<Region>,
}

#[derive(Debug, Deserialize)]
struct Region {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    currency: Option<CurrencySetting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrencySetting {
    currency_code: String,
}

/// Flatten catalog publications into one listing per country.
///
/// A country reachable through several catalogs is published if any of
/// them publishes the product.
fn product_markets_from(product: ProductPublications) -> ProductMarkets {
    let mut listings: Vec<MarketListing> = Vec::new();

    for resource in product.resource_publications_v2.nodes {
        let markets = resource
            .publication
            .catalog
            .and_then(|c| c.markets)
            .unwrap_or_default();

        for region in markets.nodes.into_iter().flat_map(|m| m.regions.nodes) {
            let Some(code) = region.code.as_deref().map(MarketCode::new) else {
                continue;
            };
            let currency = region
                .currency
                .map_or_else(CurrencyCode::default, |c| CurrencyCode::new(&c.currency_code));

            match listings.iter_mut().find(|l| l.market == code) {
                Some(existing) => existing.published |= resource.is_published,
                None => listings.push(MarketListing {
                    market: code,
                    published: resource.is_published,
                    currency,
                }),
            }
        }
    }

    ProductMarkets {
        listings,
        published_online: product.published_on_publication,
    }
}

impl AdminClient {
    /// Get the online store publication ID, resolving it once.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::NotFound` if the store has no online store channel.
    pub(super) async fn online_store_publication(&self) -> Result<String, ShopifyError> {
        if let Some(id) = self.inner.online_store.read().await.clone() {
            return Ok(id);
        }

        let data: PublicationsData = self
            .execute(queries::PUBLICATIONS, serde_json::json!({}))
            .await?;

        let id = data
            .publications
            .nodes
            .into_iter()
            .find(|p| p.name == ONLINE_STORE)
            .map(|p| p.id)
            .ok_or_else(|| ShopifyError::NotFound("Online Store publication".to_string()))?;

        *self.inner.online_store.write().await = Some(id.clone());
        Ok(id)
    }

    /// Get market listings and online-store publication for a product.
    ///
    /// A product Shopify doesn't know yields no listings.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product_markets(
        &self,
        id: ShopifyProductId,
    ) -> Result<ProductMarkets, ShopifyError> {
        let online_store = self.online_store_publication().await?;

        let data: ProductMarketsData = self
            .execute(
                queries::PRODUCT_MARKETS,
                serde_json::json!({ "id": id.to_gid(), "onlineStore": online_store }),
            )
            .await?;

        Ok(data
            .product
            .map(product_markets_from)
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_markets_from_catalogs() {
        let data: ProductMarketsData = serde_json::from_value(serde_json::json!({
            "product": {
                "publishedOnPublication": true,
                "resourcePublicationsV2": { "nodes": [
                    {
                        "isPublished": false,
                        "publication": { "catalog": { "markets": { "nodes": [
                            { "regions": { "nodes": [
                                { "code": "CA", "currency": { "currencyCode": "CAD" } },
                                { "code": "US", "currency": { "currencyCode": "USD" } }
                            ] } }
                        ] } } }
                    },
                    {
                        "isPublished": true,
                        "publication": { "catalog": { "markets": { "nodes": [
                            { "regions": { "nodes": [ { "code": "US", "currency": { "currencyCode": "USD" } }, {} ] } }
                        ] } } }
                    },
                    { "isPublished": true, "publication": { "catalog": {} } },
                    { "isPublished": true, "publication": { "catalog": null } }
                ] }
            }
        }))
        .unwrap();

        let markets = product_markets_from(data.product.unwrap());
        assert!(markets.published_online);
        assert_eq!(markets.listings.len(), 2);

        let ca = markets.listing(&MarketCode::new("CA")).unwrap();
        assert!(!ca.published);
        assert_eq!(ca.currency, CurrencyCode::new("CAD"));

        let us = markets.listing(&MarketCode::new("US")).unwrap();
        assert!(us.published);
    }
}
