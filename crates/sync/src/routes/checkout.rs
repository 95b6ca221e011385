//! Checkout validation endpoint.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use shopfleet_core::ValidationResult;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::CheckoutRequest;
use crate::state::AppState;

/// Create checkout routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/checkout/validate", post(validate))
}

/// POST /api/checkout/validate
///
/// Responds 200 with the verdict whether or not the cart is valid, 422 when
/// items lack catalog mappings, and 400 for an empty or malformed cart.
#[instrument(skip(state, request))]
async fn validate(
    State(state): State<AppState>,
    request: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<ValidationResult>> {
    let Json(request) = request.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let result = state.checkout().validate(&request).await?;
    Ok(Json(result))
}
