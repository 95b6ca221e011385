//! HTTP route handlers for the sync service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness check
//! GET  /health/ready               - Readiness check (store ping)
//!
//! # Webhooks
//! GET  /webhooks/shopify/products  - Liveness acknowledgment
//! POST /webhooks/shopify/products  - Product create/update/delete deliveries
//!
//! # Checkout
//! POST /api/checkout/validate      - Validate a cart before checkout
//! ```

pub mod checkout;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(webhooks::router())
        .merge(checkout::router())
}
