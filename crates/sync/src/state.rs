//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use shopfleet_core::PipelineDefaults;

use crate::config::SyncConfig;
use crate::db::CatalogStore;
use crate::services::{CheckoutValidator, PropagationEngine, Reconciler, ReconcilerHandle};
use crate::shopify::CommercePlatform;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Constructing it starts the reconciler
/// worker, so it must be built inside a Tokio runtime.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn CatalogStore>,
    webhook_secret: SecretString,
    propagation: PropagationEngine,
    checkout: CheckoutValidator,
    reconciler: ReconcilerHandle,
}

impl AppState {
    /// Create state from the service configuration.
    #[must_use]
    pub fn new(
        config: &SyncConfig,
        store: Arc<dyn CatalogStore>,
        platform: Arc<dyn CommercePlatform>,
    ) -> Self {
        Self::from_parts(
            store,
            platform,
            config.shopify.webhook_secret.clone(),
            config.defaults.clone(),
            config.checkout_timeout,
        )
    }

    /// Create state from individual parts.
    #[must_use]
    pub fn from_parts(
        store: Arc<dyn CatalogStore>,
        platform: Arc<dyn CommercePlatform>,
        webhook_secret: SecretString,
        defaults: PipelineDefaults,
        checkout_timeout: Duration,
    ) -> Self {
        let defaults = Arc::new(defaults);
        let reconciler = Reconciler::new(Arc::clone(&platform), Arc::clone(&store)).spawn();
        let propagation =
            PropagationEngine::new(Arc::clone(&platform), Arc::clone(&store), Arc::clone(&defaults));
        let checkout = CheckoutValidator::new(
            platform,
            Arc::clone(&store),
            defaults,
            checkout_timeout,
            reconciler.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                store,
                webhook_secret,
                propagation,
                checkout,
                reconciler,
            }),
        }
    }

    /// Get the catalog store.
    #[must_use]
    pub fn store(&self) -> &dyn CatalogStore {
        self.inner.store.as_ref()
    }

    /// Get the webhook signing secret.
    #[must_use]
    pub fn webhook_secret(&self) -> &SecretString {
        &self.inner.webhook_secret
    }

    #[must_use]
    pub fn propagation(&self) -> &PropagationEngine {
        &self.inner.propagation
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutValidator {
        &self.inner.checkout
    }

    /// Get the reconciler handle (for submitting jobs or subscribing to reports).
    #[must_use]
    pub fn reconciler(&self) -> &ReconcilerHandle {
        &self.inner.reconciler
    }
}
