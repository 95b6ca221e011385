//! In-memory catalog store for tests and local runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use shopfleet_core::{
    CanonicalItem, CanonicalPatch, Product, ProductId, ProductPatch, ShopifyProductId,
    StorefrontId, Variant, VariantId, VariantPatch,
};
use tokio::sync::RwLock;

use super::{CatalogStore, RepositoryError};

type ProductKey = (StorefrontId, ProductId);
type VariantKey = (StorefrontId, ProductId, VariantId);

#[derive(Default)]
struct MemoryState {
    storefronts: BTreeSet<StorefrontId>,
    canonical: HashMap<ShopifyProductId, CanonicalItem>,
    products: BTreeMap<ProductKey, Product>,
    variants: BTreeMap<VariantKey, Variant>,
    /// Storefronts whose writes are rejected.
    read_only: BTreeSet<StorefrontId>,
}

impl MemoryState {
    fn check_writable(&self, storefront: &StorefrontId) -> Result<(), RepositoryError> {
        if self.read_only.contains(storefront) {
            return Err(RepositoryError::Unavailable(format!(
                "storefront {storefront} rejects writes"
            )));
        }
        Ok(())
    }
}

/// Catalog store held in memory.
///
/// Patches are applied with the same field-merge semantics as the JSONB
/// store. Outages can be simulated with [`MemoryCatalogStore::set_unavailable`]
/// or, for a single storefront's writes, [`MemoryCatalogStore::set_read_only`].
#[derive(Default)]
pub struct MemoryCatalogStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make writes to one storefront fail (or succeed again).
    pub async fn set_read_only(&self, storefront: &StorefrontId, read_only: bool) {
        let mut state = self.state.write().await;
        if read_only {
            state.read_only.insert(storefront.clone());
        } else {
            state.read_only.remove(storefront);
        }
    }

    /// Number of successful patch and delete operations so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn insert_storefront(&self, id: StorefrontId) {
        self.state.write().await.storefronts.insert(id);
    }

    pub async fn insert_canonical(&self, item: CanonicalItem) {
        self.state.write().await.canonical.insert(item.shopify_id, item);
    }

    pub async fn insert_product(&self, product: Product) {
        let mut state = self.state.write().await;
        state.storefronts.insert(product.storefront.clone());
        state
            .products
            .insert((product.storefront.clone(), product.id.clone()), product);
    }

    pub async fn insert_variant(&self, storefront: &StorefrontId, variant: Variant) {
        self.state.write().await.variants.insert(
            (storefront.clone(), variant.product_id.clone(), variant.id.clone()),
            variant,
        );
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check()
    }

    async fn storefronts(&self) -> Result<Vec<StorefrontId>, RepositoryError> {
        self.check()?;
        Ok(self.state.read().await.storefronts.iter().cloned().collect())
    }

    async fn canonical_item(
        &self,
        id: ShopifyProductId,
    ) -> Result<Option<CanonicalItem>, RepositoryError> {
        self.check()?;
        Ok(self.state.read().await.canonical.get(&id).cloned())
    }

    async fn patch_canonical(
        &self,
        id: ShopifyProductId,
        patch: &CanonicalPatch,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        let mut state = self.state.write().await;
        let item = state.canonical.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        item.apply(patch);
        self.wrote();
        Ok(())
    }

    async fn product(
        &self,
        storefront: &StorefrontId,
        id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        self.check()?;
        Ok(self
            .state
            .read()
            .await
            .products
            .get(&(storefront.clone(), id.clone()))
            .cloned())
    }

    async fn product_by_shopify_id(
        &self,
        storefront: &StorefrontId,
        id: ShopifyProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        self.check()?;
        Ok(self
            .state
            .read()
            .await
            .products
            .values()
            .find(|p| &p.storefront == storefront && p.shopify_id == id)
            .cloned())
    }

    async fn patch_product(
        &self,
        storefront: &StorefrontId,
        id: &ProductId,
        patch: &ProductPatch,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        let mut state = self.state.write().await;
        state.check_writable(storefront)?;
        let product = state
            .products
            .get_mut(&(storefront.clone(), id.clone()))
            .ok_or(RepositoryError::NotFound)?;
        product.apply(patch);
        self.wrote();
        Ok(())
    }

    async fn delete_product(
        &self,
        storefront: &StorefrontId,
        id: &ProductId,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        let mut state = self.state.write().await;
        state.check_writable(storefront)?;
        state
            .products
            .remove(&(storefront.clone(), id.clone()))
            .ok_or(RepositoryError::NotFound)?;
        state
            .variants
            .retain(|(sf, product, _), _| !(sf == storefront && product == id));
        self.wrote();
        Ok(())
    }

    async fn variants(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
    ) -> Result<Vec<Variant>, RepositoryError> {
        self.check()?;
        Ok(self
            .state
            .read()
            .await
            .variants
            .iter()
            .filter(|((sf, p, _), _)| sf == storefront && p == product)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn variant(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
        id: &VariantId,
    ) -> Result<Option<Variant>, RepositoryError> {
        self.check()?;
        Ok(self
            .state
            .read()
            .await
            .variants
            .get(&(storefront.clone(), product.clone(), id.clone()))
            .cloned())
    }

    async fn patch_variant(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
        id: &VariantId,
        patch: &VariantPatch,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        let mut state = self.state.write().await;
        state.check_writable(storefront)?;
        let variant = state
            .variants
            .get_mut(&(storefront.clone(), product.clone(), id.clone()))
            .ok_or(RepositoryError::NotFound)?;
        variant.apply(patch);
        self.wrote();
        Ok(())
    }

    async fn delete_variant(
        &self,
        storefront: &StorefrontId,
        product: &ProductId,
        id: &VariantId,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        let mut state = self.state.write().await;
        state.check_writable(storefront)?;
        state
            .variants
            .remove(&(storefront.clone(), product.clone(), id.clone()))
            .ok_or(RepositoryError::NotFound)?;
        self.wrote();
        Ok(())
    }
}
