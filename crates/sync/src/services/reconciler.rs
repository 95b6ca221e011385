//! Self-healing reconciler.
//!
//! When checkout finds a variant short on stock, the stored copy may have
//! drifted from Shopify. The reconciler re-reads authoritative stock and
//! rewrites the stored value. It runs as a detached worker fed through an
//! unbounded channel, so submitting a job never blocks a request. At most one
//! job per stored product waits in the queue; later submissions for the same
//! product fold their variants into it.
//!
//! Every finished job is broadcast as a [`ReconcileReport`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use shopfleet_core::merge;
use shopfleet_core::{ProductId, ShopifyVariantId, Stock, StorefrontId, Variant, VariantId};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::db::{CatalogStore, RepositoryError};
use crate::shopify::CommercePlatform;

/// Reports kept for slow subscribers.
const REPORT_CAPACITY: usize = 64;

/// Variants of one stored product to repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileJob {
    pub storefront: StorefrontId,
    pub product_id: ProductId,
    pub variant_ids: Vec<VariantId>,
}

type JobKey = (StorefrontId, ProductId);

/// Jobs waiting for the worker, one per stored product.
#[derive(Default)]
struct PendingJobs {
    jobs: Mutex<HashMap<JobKey, Vec<VariantId>>>,
}

impl PendingJobs {
    fn lock(&self) -> MutexGuard<'_, HashMap<JobKey, Vec<VariantId>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a job. Returns the key to enqueue, or `None` when a job for the
    /// same product is already waiting and absorbed this one.
    fn add(&self, job: ReconcileJob) -> Option<JobKey> {
        let key = (job.storefront, job.product_id);
        let mut jobs = self.lock();
        if let Some(waiting) = jobs.get_mut(&key) {
            for id in job.variant_ids {
                if !waiting.contains(&id) {
                    waiting.push(id);
                }
            }
            return None;
        }
        jobs.insert(key.clone(), job.variant_ids);
        Some(key)
    }

    /// Take the waiting job for a key.
    fn take(&self, key: &JobKey) -> Option<ReconcileJob> {
        self.lock()
            .remove(key)
            .map(|variant_ids| ReconcileJob {
                storefront: key.0.clone(),
                product_id: key.1.clone(),
                variant_ids,
            })
    }
}

/// Where a repaired stock figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairSource {
    /// Live inventory from Shopify.
    Platform,
    /// The canonical mirror's last webhook figure.
    CanonicalMirror,
}

/// Result of repairing one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// Stored stock already matched.
    Unchanged { stock: Stock, source: RepairSource },
    Repaired {
        from: Stock,
        to: Stock,
        source: RepairSource,
    },
    /// Shopify no longer has the variant; the stored copy was removed.
    VariantDeleted,
    /// The last variant was removed, and the product with it.
    ProductDeleted,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRepair {
    pub variant_id: VariantId,
    #[serde(flatten)]
    pub outcome: RepairOutcome,
}

/// Summary of one reconcile job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub storefront: StorefrontId,
    pub product_id: ProductId,
    pub repairs: Vec<VariantRepair>,
    pub finished_at: DateTime<Utc>,
}

impl ReconcileReport {
    /// Find the repair for a variant.
    #[must_use]
    pub fn repair(&self, variant_id: &VariantId) -> Option<&RepairOutcome> {
        self.repairs
            .iter()
            .find(|r| &r.variant_id == variant_id)
            .map(|r| &r.outcome)
    }

    fn log(&self) {
        for repair in &self.repairs {
            match &repair.outcome {
                RepairOutcome::Failed { error } => warn!(
                    storefront = %self.storefront,
                    product_id = %self.product_id,
                    variant_id = %repair.variant_id,
                    error = %error,
                    "Variant repair failed"
                ),
                RepairOutcome::Unchanged { .. } => debug!(
                    variant_id = %repair.variant_id,
                    "Variant stock already consistent"
                ),
                outcome => info!(
                    storefront = %self.storefront,
                    product_id = %self.product_id,
                    variant_id = %repair.variant_id,
                    outcome = ?outcome,
                    "Variant repaired"
                ),
            }
        }
    }
}

/// Handle for submitting jobs to a running reconciler.
#[derive(Clone)]
pub struct ReconcilerHandle {
    jobs: mpsc::UnboundedSender<JobKey>,
    pending: Arc<PendingJobs>,
    reports: broadcast::Sender<Arc<ReconcileReport>>,
}

impl ReconcilerHandle {
    /// Queue a job. Never blocks.
    pub fn submit(&self, job: ReconcileJob) {
        debug!(
            storefront = %job.storefront,
            product_id = %job.product_id,
            variants = job.variant_ids.len(),
            "Reconcile job submitted"
        );
        let Some(key) = self.pending.add(job) else {
            debug!("Merged into queued job");
            return;
        };
        if let Err(mpsc::error::SendError(key)) = self.jobs.send(key) {
            self.pending.take(&key);
            warn!("Reconciler is not running, dropping job");
        }
    }

    /// Receive reports for jobs finished after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ReconcileReport>> {
        self.reports.subscribe()
    }
}

/// Repairs stored variant stock against Shopify.
#[derive(Clone)]
pub struct Reconciler {
    platform: Arc<dyn CommercePlatform>,
    store: Arc<dyn CatalogStore>,
}

impl Reconciler {
    #[must_use]
    pub fn new(platform: Arc<dyn CommercePlatform>, store: Arc<dyn CatalogStore>) -> Self {
        Self { platform, store }
    }

    /// Start the worker task. It stops once every handle is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> ReconcilerHandle {
        let (jobs, mut queue) = mpsc::unbounded_channel::<JobKey>();
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        let sink = reports.clone();
        let pending = Arc::new(PendingJobs::default());
        let waiting = Arc::clone(&pending);

        tokio::spawn(async move {
            while let Some(key) = queue.recv().await {
                let Some(job) = waiting.take(&key) else {
                    continue;
                };
                let report = self.reconcile(&job).await;
                report.log();
                // No subscribers is fine
                let _ = sink.send(Arc::new(report));
            }
            info!("Reconciler stopped");
        });

        info!("Reconciler started");
        ReconcilerHandle {
            jobs,
            pending,
            reports,
        }
    }

    /// Repair every variant in a job. Variants are repaired concurrently and
    /// one failure does not affect the others.
    #[instrument(skip(self, job), fields(storefront = %job.storefront, product_id = %job.product_id))]
    pub async fn reconcile(&self, job: &ReconcileJob) -> ReconcileReport {
        let now = Utc::now();
        let outcomes = join_all(
            job.variant_ids
                .iter()
                .map(|id| self.repair(&job.storefront, &job.product_id, id, now)),
        )
        .await;

        let repairs = job
            .variant_ids
            .iter()
            .cloned()
            .zip(outcomes)
            .map(|(variant_id, outcome)| VariantRepair {
                variant_id,
                outcome: outcome.unwrap_or_else(|e| RepairOutcome::Failed {
                    error: e.to_string(),
                }),
            })
            .collect();

        ReconcileReport {
            storefront: job.storefront.clone(),
            product_id: job.product_id.clone(),
            repairs,
            finished_at: Utc::now(),
        }
    }

    async fn repair(
        &self,
        storefront: &StorefrontId,
        product_id: &ProductId,
        variant_id: &VariantId,
        now: DateTime<Utc>,
    ) -> Result<RepairOutcome, RepositoryError> {
        let Some(variant) = self.store.variant(storefront, product_id, variant_id).await? else {
            return Ok(RepairOutcome::Failed {
                error: "variant not in store".to_string(),
            });
        };
        let Some(shopify_id) = variant.shopify_variant_id else {
            return Ok(RepairOutcome::Failed {
                error: "variant has no Shopify mapping".to_string(),
            });
        };

        let (stock, source) = match self.platform.variant_inventory(&[shopify_id], None).await {
            Ok(live) => match live.get(&shopify_id) {
                Some(inventory) => (inventory.available, RepairSource::Platform),
                None => return self.remove(storefront, product_id, variant_id).await,
            },
            Err(e) => {
                warn!(variant_id = %variant_id, error = %e, "Live inventory unavailable, using canonical mirror");
                match self.mirrored_stock(storefront, product_id, shopify_id).await? {
                    Some(stock) => (stock, RepairSource::CanonicalMirror),
                    None => {
                        return Ok(RepairOutcome::Failed {
                            error: format!("no stock source available: {e}"),
                        });
                    }
                }
            }
        };

        self.write_stock(storefront, product_id, &variant, stock, source, now)
            .await
    }

    async fn write_stock(
        &self,
        storefront: &StorefrontId,
        product_id: &ProductId,
        variant: &Variant,
        stock: Stock,
        source: RepairSource,
        now: DateTime<Utc>,
    ) -> Result<RepairOutcome, RepositoryError> {
        let Some(patch) = merge::stock_patch(variant, stock, now) else {
            return Ok(RepairOutcome::Unchanged { stock, source });
        };
        self.store
            .patch_variant(storefront, product_id, &variant.id, &patch)
            .await?;
        Ok(RepairOutcome::Repaired {
            from: variant.stock,
            to: stock,
            source,
        })
    }

    /// Stock for a variant according to the canonical mirror.
    async fn mirrored_stock(
        &self,
        storefront: &StorefrontId,
        product_id: &ProductId,
        shopify_id: ShopifyVariantId,
    ) -> Result<Option<Stock>, RepositoryError> {
        let Some(product) = self.store.product(storefront, product_id).await? else {
            return Ok(None);
        };
        let canonical = self.store.canonical_item(product.shopify_id).await?;
        Ok(canonical.and_then(|item| item.variant(shopify_id).and_then(|v| v.stock)))
    }

    /// Delete a variant Shopify no longer has, and its product if now empty.
    async fn remove(
        &self,
        storefront: &StorefrontId,
        product_id: &ProductId,
        variant_id: &VariantId,
    ) -> Result<RepairOutcome, RepositoryError> {
        match self
            .store
            .delete_variant(storefront, product_id, variant_id)
            .await
        {
            Ok(()) | Err(RepositoryError::NotFound) => {}
            Err(e) => return Err(e),
        }

        if !self.store.variants(storefront, product_id).await?.is_empty() {
            return Ok(RepairOutcome::VariantDeleted);
        }

        // A concurrent repair may have removed the product already
        match self.store.delete_product(storefront, product_id).await {
            Ok(()) | Err(RepositoryError::NotFound) => Ok(RepairOutcome::ProductDeleted),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lookup_and_serialization() {
        let report = ReconcileReport {
            storefront: StorefrontId::new("main"),
            product_id: ProductId::new("p1"),
            repairs: vec![
                VariantRepair {
                    variant_id: VariantId::new("v1"),
                    outcome: RepairOutcome::Repaired {
                        from: Stock::ZERO,
                        to: Stock::new(5),
                        source: RepairSource::CanonicalMirror,
                    },
                },
                VariantRepair {
                    variant_id: VariantId::new("v2"),
                    outcome: RepairOutcome::VariantDeleted,
                },
            ],
            finished_at: Utc::now(),
        };

        assert_eq!(
            report.repair(&VariantId::new("v2")),
            Some(&RepairOutcome::VariantDeleted)
        );
        assert!(report.repair(&VariantId::new("v9")).is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["repairs"][0]["outcome"], "repaired");
        assert_eq!(json["repairs"][0]["to"], 5);
        assert_eq!(json["repairs"][0]["source"], "canonical_mirror");
        assert_eq!(json["repairs"][1]["variantId"], "v2");
    }

    fn job(product: &str, variants: &[&str]) -> ReconcileJob {
        ReconcileJob {
            storefront: StorefrontId::new("main"),
            product_id: ProductId::new(product),
            variant_ids: variants.iter().map(|v| VariantId::new(*v)).collect(),
        }
    }

    #[test]
    fn test_pending_jobs_fold_per_product() {
        let pending = PendingJobs::default();

        let key = pending.add(job("p1", &["v1"])).unwrap();
        assert!(pending.add(job("p1", &["v1", "v2"])).is_none());
        let other = pending.add(job("p2", &["v9"])).unwrap();

        let merged = pending.take(&key).unwrap();
        assert_eq!(merged, job("p1", &["v1", "v2"]));
        assert!(pending.take(&key).is_none());

        // Once taken, the next submission queues again
        assert!(pending.add(job("p1", &["v3"])).is_some());
        assert_eq!(pending.take(&other).unwrap(), job("p2", &["v9"]));
    }
}
