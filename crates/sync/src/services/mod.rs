//! Pipeline services.
//!
//! # Services
//!
//! - `webhook` - Signature verification and topic routing for Shopify webhooks
//! - `propagation` - Canonical mirror and storefront replica updates
//! - `checkout` - Cart validation (market, inventory, shipping)
//! - `reconciler` - Background repair of drifted replica stock

pub mod checkout;
pub mod propagation;
pub mod reconciler;
pub mod webhook;

pub use checkout::{CheckoutError, CheckoutRequest, CheckoutValidator};
pub use propagation::{PropagationEngine, PropagationError, PropagationReport};
pub use reconciler::{ReconcileJob, ReconcileReport, Reconciler, ReconcilerHandle};
pub use webhook::{WebhookError, WebhookTopic, verify_webhook_signature};
