//! Propagation of Shopify product changes to the catalog.
//!
//! A product webhook updates the canonical mirror first, then fans out to
//! every storefront carrying the product. Each write is a merge patch computed
//! by `shopfleet_core::merge`, so replaying a delivery changes nothing.
//!
//! Only the canonical write is fatal. Shopify lookups fall back to the stored
//! values and a storefront that fails to update is reported without stopping
//! the others.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use shopfleet_core::matcher::{VariantKey, match_variant};
use shopfleet_core::merge;
use shopfleet_core::resolver::{Lookup, MarketInput, merge_markets, resolve_market};
use shopfleet_core::{
    CanonicalItem, MarketCode, MarketListing, MarketMap, PipelineDefaults, ShopifyProductId,
    StorefrontId,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::db::{CatalogStore, RepositoryError};
use crate::shopify::{CommercePlatform, ProductMarkets, ProductPayload, conversions};

/// Failures that abort a propagation.
#[derive(Debug, Error)]
pub enum PropagationError {
    #[error("failed to load canonical item: {0}")]
    Load(#[source] RepositoryError),

    #[error("failed to write canonical item: {0}")]
    CanonicalWrite(#[source] RepositoryError),

    #[error("failed to list storefronts: {0}")]
    Storefronts(#[source] RepositoryError),
}

/// What happened to the online-store publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published,
    AlreadyPublished,
    /// Drafts and archived products are never published.
    NotActive,
    Failed(String),
}

/// Per-storefront result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StorefrontStatus {
    Synced {
        product_updated: bool,
        variants_updated: usize,
        unmatched: usize,
    },
    Deactivated {
        changed: bool,
    },
    /// The storefront never imported this product.
    NotListed,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorefrontOutcome {
    pub storefront: StorefrontId,
    #[serde(flatten)]
    pub status: StorefrontStatus,
}

/// Summary of one propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationReport {
    pub product_id: ShopifyProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishOutcome>,
    pub storefronts: Vec<StorefrontOutcome>,
}

impl PropagationReport {
    fn skipped(product_id: ShopifyProductId, reason: &str) -> Self {
        Self {
            product_id,
            skipped: Some(reason.to_string()),
            publish: None,
            storefronts: vec![],
        }
    }

    /// Number of storefronts that failed to update.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.storefronts
            .iter()
            .filter(|s| matches!(s.status, StorefrontStatus::Failed { .. }))
            .count()
    }
}

/// Pick the markets to resolve and what Shopify said about each.
///
/// With fresh metadata every listed market plus every stored market is
/// resolved; stored markets Shopify no longer lists become `Absent`. Without
/// metadata only stored markets are re-resolved.
fn market_targets<'a>(
    existing: &'a MarketMap,
    metadata: Option<&'a ProductMarkets>,
) -> Vec<(&'a MarketCode, Lookup<&'a MarketListing>)> {
    match metadata {
        Some(meta) => {
            let codes: BTreeSet<&MarketCode> = meta
                .listings
                .iter()
                .map(|l| &l.market)
                .chain(existing.keys())
                .collect();
            codes
                .into_iter()
                .map(|code| (code, Lookup::from_option(meta.listing(code))))
                .collect()
        }
        None => existing.keys().map(|code| (code, Lookup::Failed)).collect(),
    }
}

/// Writes Shopify product changes through to the catalog.
#[derive(Clone)]
pub struct PropagationEngine {
    platform: Arc<dyn CommercePlatform>,
    store: Arc<dyn CatalogStore>,
    defaults: Arc<PipelineDefaults>,
}

impl PropagationEngine {
    #[must_use]
    pub fn new(
        platform: Arc<dyn CommercePlatform>,
        store: Arc<dyn CatalogStore>,
        defaults: Arc<PipelineDefaults>,
    ) -> Self {
        Self {
            platform,
            store,
            defaults,
        }
    }

    /// Propagate a product payload to the canonical mirror and storefronts.
    ///
    /// `raw` is the payload exactly as delivered and is kept in the mirror.
    ///
    /// # Errors
    ///
    /// Returns `PropagationError` if the canonical item cannot be read or
    /// written, or the storefront list cannot be loaded.
    #[instrument(skip(self, payload, raw), fields(product_id = %payload.id))]
    pub async fn propagate(
        &self,
        payload: &ProductPayload,
        raw: serde_json::Value,
    ) -> Result<PropagationReport, PropagationError> {
        let now = Utc::now();

        let Some(mut canonical) = self
            .store
            .canonical_item(payload.id)
            .await
            .map_err(PropagationError::Load)?
        else {
            debug!("Product not imported, skipping");
            return Ok(PropagationReport::skipped(payload.id, "not imported"));
        };

        let metadata = match self.platform.product_markets(payload.id).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(error = %e, "Market metadata unavailable, keeping stored markets");
                None
            }
        };

        let markets = self.resolve_markets(&canonical.markets, metadata.as_ref()).await;
        let (publish, published) = self
            .publish(payload, metadata.as_ref(), canonical.published)
            .await;

        let patch = conversions::canonical_patch(
            payload,
            Some(&canonical),
            raw,
            (!markets.is_empty()).then_some(markets),
            published,
            now,
        );
        self.store
            .patch_canonical(payload.id, &patch)
            .await
            .map_err(PropagationError::CanonicalWrite)?;
        canonical.apply(&patch);

        let targets = self.targets(&canonical).await?;
        let mut storefronts = Vec::with_capacity(targets.len());
        for storefront in targets {
            let status = match self.sync_storefront(&storefront, &canonical, now).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(storefront = %storefront, error = %e, "Storefront update failed");
                    StorefrontStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            storefronts.push(StorefrontOutcome { storefront, status });
        }

        let report = PropagationReport {
            product_id: payload.id,
            skipped: None,
            publish: Some(publish),
            storefronts,
        };
        info!(
            storefronts = report.storefronts.len(),
            failures = report.failures(),
            "Product propagated"
        );
        Ok(report)
    }

    /// Mark every storefront copy of a deleted product inactive.
    ///
    /// # Errors
    ///
    /// Returns `PropagationError` if the canonical item or storefront list
    /// cannot be loaded.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn deactivate(
        &self,
        id: ShopifyProductId,
    ) -> Result<PropagationReport, PropagationError> {
        let now = Utc::now();
        let canonical = self
            .store
            .canonical_item(id)
            .await
            .map_err(PropagationError::Load)?;

        let targets = match canonical.as_ref().and_then(|c| c.storefronts.as_ref()) {
            Some(explicit) => explicit.iter().cloned().collect(),
            None => self
                .store
                .storefronts()
                .await
                .map_err(PropagationError::Storefronts)?,
        };

        let mut storefronts = Vec::with_capacity(targets.len());
        for storefront in targets {
            let status = match self.deactivate_storefront(&storefront, id, now).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(storefront = %storefront, error = %e, "Storefront deactivation failed");
                    StorefrontStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            storefronts.push(StorefrontOutcome { storefront, status });
        }

        info!(storefronts = storefronts.len(), "Product deactivated");
        Ok(PropagationReport {
            product_id: id,
            skipped: None,
            publish: None,
            storefronts,
        })
    }

    async fn resolve_markets(
        &self,
        existing: &MarketMap,
        metadata: Option<&ProductMarkets>,
    ) -> MarketMap {
        let targets = market_targets(existing, metadata);
        let rates = join_all(
            targets
                .iter()
                .map(|(code, _)| self.platform.shipping_rate(code)),
        )
        .await;

        let resolved = targets
            .iter()
            .zip(&rates)
            .map(|(&(code, listing), rate)| {
                if let Err(e) = rate {
                    warn!(market = %code, error = %e, "Shipping rate lookup failed");
                }
                let entry = resolve_market(MarketInput {
                    market: code,
                    existing: existing.get(code),
                    listing,
                    rate: Lookup::from_result(rate.as_ref().map(Option::as_ref)),
                    defaults: &self.defaults,
                });
                (code.clone(), entry)
            })
            .collect();

        merge_markets(existing, resolved)
    }

    /// Publish active products that are not yet on the online store.
    ///
    /// Returns the outcome and the publication flag to store, if known.
    async fn publish(
        &self,
        payload: &ProductPayload,
        metadata: Option<&ProductMarkets>,
        stored: bool,
    ) -> (PublishOutcome, Option<bool>) {
        let online = metadata.map(|m| m.published_online);

        if !payload.status().is_active() {
            return (PublishOutcome::NotActive, online);
        }
        if online.unwrap_or(stored) {
            return (PublishOutcome::AlreadyPublished, Some(true));
        }

        match self.platform.publish_product(payload.id).await {
            Ok(()) => {
                info!("Published to online store");
                (PublishOutcome::Published, Some(true))
            }
            Err(e) => {
                warn!(error = %e, "Online store publication failed");
                (PublishOutcome::Failed(e.to_string()), online)
            }
        }
    }

    async fn targets(
        &self,
        canonical: &CanonicalItem,
    ) -> Result<Vec<StorefrontId>, PropagationError> {
        match &canonical.storefronts {
            Some(explicit) => Ok(explicit.iter().cloned().collect()),
            None => self
                .store
                .storefronts()
                .await
                .map_err(PropagationError::Storefronts),
        }
    }

    #[instrument(skip(self, canonical, now), fields(storefront = %storefront))]
    async fn sync_storefront(
        &self,
        storefront: &StorefrontId,
        canonical: &CanonicalItem,
        now: DateTime<Utc>,
    ) -> Result<StorefrontStatus, RepositoryError> {
        let Some(product) = self
            .store
            .product_by_shopify_id(storefront, canonical.shopify_id)
            .await?
        else {
            return Ok(StorefrontStatus::NotListed);
        };

        let product_updated = match merge::product_patch(&product, canonical, now) {
            Some(patch) => {
                self.store
                    .patch_product(storefront, &product.id, &patch)
                    .await?;
                true
            }
            None => false,
        };

        let existing = self.store.variants(storefront, &product.id).await?;
        let mut variants_updated = 0;
        let mut unmatched = 0;
        for facts in &canonical.variants {
            let Some(variant) = match_variant(VariantKey::from(facts), &existing) else {
                debug!(shopify_variant_id = %facts.shopify_variant_id, "No matching variant");
                unmatched += 1;
                continue;
            };
            if let Some(patch) = merge::variant_patch(variant, facts, now) {
                self.store
                    .patch_variant(storefront, &product.id, &variant.id, &patch)
                    .await?;
                variants_updated += 1;
            }
        }

        Ok(StorefrontStatus::Synced {
            product_updated,
            variants_updated,
            unmatched,
        })
    }

    async fn deactivate_storefront(
        &self,
        storefront: &StorefrontId,
        id: ShopifyProductId,
        now: DateTime<Utc>,
    ) -> Result<StorefrontStatus, RepositoryError> {
        let Some(product) = self.store.product_by_shopify_id(storefront, id).await? else {
            return Ok(StorefrontStatus::NotListed);
        };

        let changed = match merge::deactivate_patch(&product, now) {
            Some(patch) => {
                self.store
                    .patch_product(storefront, &product.id, &patch)
                    .await?;
                true
            }
            None => false,
        };
        Ok(StorefrontStatus::Deactivated { changed })
    }
}
