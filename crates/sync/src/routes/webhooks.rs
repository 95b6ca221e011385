//! Shopify product webhook endpoint.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use shopfleet_core::ShopifyProductId;
use tracing::{Span, info, instrument};

use crate::error::{AppError, Result};
use crate::services::webhook::{
    HMAC_HEADER, TOPIC_HEADER, WEBHOOK_ID_HEADER, WebhookTopic, verify_webhook_signature,
};
use crate::shopify::ProductPayload;
use crate::state::AppState;

/// Body of a `products/delete` delivery.
#[derive(Debug, Deserialize)]
struct DeletedProduct {
    id: ShopifyProductId,
}

/// Create webhook routes.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/webhooks/shopify/products",
        get(acknowledge).post(product_webhook),
    )
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// GET /webhooks/shopify/products - confirms the endpoint is reachable.
async fn acknowledge() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// POST /webhooks/shopify/products
///
/// The signature is checked against the raw body before anything is parsed.
#[instrument(
    skip(state, headers, body),
    fields(topic = tracing::field::Empty, webhook_id = tracing::field::Empty)
)]
async fn product_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    verify_webhook_signature(state.webhook_secret(), &body, header(&headers, HMAC_HEADER))?;

    let topic = WebhookTopic::from_header(header(&headers, TOPIC_HEADER));
    let span = Span::current();
    span.record("topic", tracing::field::display(&topic));
    if let Some(id) = header(&headers, WEBHOOK_ID_HEADER) {
        span.record("webhook_id", id);
    }

    match topic {
        WebhookTopic::ProductCreate | WebhookTopic::ProductUpdate => {
            let raw: Value = serde_json::from_slice(&body)
                .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?;
            let payload: ProductPayload = serde_json::from_value(raw.clone())
                .map_err(|e| AppError::BadRequest(format!("Invalid product payload: {e}")))?;

            let report = state.propagation().propagate(&payload, raw).await?;
            Ok(Json(json!({ "ok": true, "productId": report.product_id })))
        }
        WebhookTopic::ProductDelete => {
            let deleted: DeletedProduct = serde_json::from_slice(&body)
                .map_err(|e| AppError::BadRequest(format!("Invalid delete payload: {e}")))?;

            let report = state.propagation().deactivate(deleted.id).await?;
            Ok(Json(json!({ "ok": true, "productId": report.product_id })))
        }
        WebhookTopic::Other(topic) => {
            info!(topic = %topic, "Ignoring webhook topic");
            Ok(Json(json!({ "ok": true, "ignored": topic })))
        }
    }
}
