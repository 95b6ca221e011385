//! Shopify Admin API GraphQL client.
//!
//! Authenticates with a static Admin API access token. Delivery profile
//! lookups (locations and rates per market) are cached for the configured
//! TTL since they change rarely and are needed on every checkout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use shopfleet_core::{
    MarketCode, ShippingAddress, ShippingRate, ShopifyProductId, ShopifyVariantId,
};
use tokio::sync::RwLock;

use crate::config::ShopifyAdminConfig;

use super::{
    CommercePlatform, GraphQLError, GraphQLErrorLocation, ProductMarkets, ProductPayload,
    ShippingLine, ShopifyError, VariantInventory,
};

mod inventory;
mod markets;
mod products;
pub mod queries;
mod shipping;

use shipping::MarketDelivery;

/// Throttled requests are retried this many times before giving up.
const MAX_THROTTLE_RETRIES: u32 = 2;

/// Longest `Retry-After` wait honored before a retry.
const MAX_THROTTLE_WAIT: Duration = Duration::from_secs(4);

/// Wait before retry number `attempt` (0-based), or `None` once retries are
/// exhausted.
fn throttle_wait(attempt: u32, retry_after_secs: u64) -> Option<Duration> {
    (attempt < MAX_THROTTLE_RETRIES)
        .then(|| Duration::from_secs(retry_after_secs.max(1)).min(MAX_THROTTLE_WAIT))
}

/// Whole seconds from a `Retry-After` header, defaulting to one.
fn retry_after_secs(header: Option<&reqwest::header::HeaderValue>) -> u64 {
    header
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().split('.').next()?.parse::<u64>().ok())
        .unwrap_or(1)
}

/// Shopify Admin API GraphQL client.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    client: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
    /// Per-market locations and flat rate, derived from delivery profiles
    delivery: Cache<MarketCode, Arc<MarketDelivery>>,
    /// Online store publication ID, resolved on first use
    online_store: RwLock<Option<String>>,
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
    #[serde(default)]
    locations: Vec<GraphQLErrorLocationResponse>,
    #[serde(default)]
    path: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorLocationResponse {
    line: i64,
    column: i64,
}

/// A GraphQL connection reduced to its nodes.
#[derive(Debug, Deserialize)]
pub(super) struct Connection<T> {
    pub nodes: Vec<T>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

/// A mutation user error.
#[derive(Debug, Deserialize)]
pub(super) struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

/// Join mutation user errors into one message, or `None` when there are none.
pub(super) fn user_error_message(errors: &[UserError]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| {
                let field = e.field.as_ref().map_or_else(String::new, |f| f.join("."));
                format!("{field}: {}", e.message)
            })
            .collect::<Vec<_>>()
            .join("; "),
    )
}

impl AdminClient {
    /// Create a new Admin API client.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ShopifyAdminConfig) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let delivery = Cache::builder()
            .max_capacity(500)
            .time_to_live(config.cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(AdminClientInner {
                client,
                endpoint: format!(
                    "https://{}/admin/api/{}/graphql.json",
                    config.store, config.api_version
                ),
                access_token: config.access_token.clone(),
                delivery,
                online_store: RwLock::new(None),
            }),
        })
    }

    /// Execute a GraphQL document with variables.
    ///
    /// Throttled requests are retried after the `Retry-After` delay, up to
    /// [`MAX_THROTTLE_RETRIES`] times.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ShopifyError> {
        let body = serde_json::json!({ "query": query, "variables": variables });

        let mut attempt = 0;
        loop {
            match self.execute_once(&body).await {
                Err(ShopifyError::RateLimited(secs)) => {
                    let Some(wait) = throttle_wait(attempt, secs) else {
                        return Err(ShopifyError::RateLimited(secs));
                    };
                    tracing::warn!(
                        attempt = attempt + 1,
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "Shopify throttled request, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn execute_once<T: DeserializeOwned>(
        &self,
        body: &serde_json::Value,
    ) -> Result<T, ShopifyError> {
        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("X-Shopify-Access-Token", self.inner.access_token.expose_secret())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ShopifyError::RateLimited(retry_after_secs(
                response.headers().get("Retry-After"),
            )));
        }

        // Check for unauthorized
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Shopify Admin API returned non-success status"
            );
            return Err(ShopifyError::graphql(format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            )));
        }

        let graphql_response: GraphQLResponse<T> = serde_json::from_str(&response_text)
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse Shopify GraphQL response"
                );
            })?;

        // Check for GraphQL errors
        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            tracing::debug!(errors = ?errors, "GraphQL errors in response");
            return Err(ShopifyError::GraphQL(
                errors
                    .into_iter()
                    .map(|e| GraphQLError {
                        message: e.message,
                        locations: e
                            .locations
                            .into_iter()
                            .map(|l| GraphQLErrorLocation {
                                line: l.line,
                                column: l.column,
                            })
                            .collect(),
                        path: e.path,
                    })
                    .collect(),
            ));
        }

        graphql_response
            .data
            .ok_or_else(|| ShopifyError::graphql("No data in response"))
    }
}

#[async_trait]
impl CommercePlatform for AdminClient {
    async fn product(&self, id: ShopifyProductId) -> Result<Option<ProductPayload>, ShopifyError> {
        self.get_product(id).await
    }

    async fn product_markets(&self, id: ShopifyProductId) -> Result<ProductMarkets, ShopifyError> {
        self.get_product_markets(id).await
    }

    async fn shipping_rate(&self, market: &MarketCode) -> Result<Option<ShippingRate>, ShopifyError> {
        Ok(self.market_delivery(market).await?.rate.clone())
    }

    async fn quote_shipping(
        &self,
        lines: &[ShippingLine],
        address: &ShippingAddress,
    ) -> Result<Vec<ShippingRate>, ShopifyError> {
        self.calculate_shipping(lines, address).await
    }

    async fn variant_inventory(
        &self,
        ids: &[ShopifyVariantId],
        market: Option<&MarketCode>,
    ) -> Result<HashMap<ShopifyVariantId, VariantInventory>, ShopifyError> {
        self.get_variant_inventory(ids, market).await
    }

    async fn publish_product(&self, id: ShopifyProductId) -> Result<(), ShopifyError> {
        self.publish_to_online_store(id).await
    }
}
