//! Delivery profiles and shipping quotes.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use shopfleet_core::{
    CurrencyCode, LocationId, MarketCode, Money, ShippingAddress, ShippingRate,
};
use tracing::instrument;

use super::{AdminClient, Connection, UserError, queries, user_error_message};
use crate::shopify::{ShippingLine, ShopifyError};

/// What the delivery profiles say about one market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketDelivery {
    /// Locations whose zones ship to the market.
    pub locations: Vec<LocationId>,
    /// Cheapest active flat rate in the default profile.
    pub rate: Option<ShippingRate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryProfilesData {
    delivery_profiles: Connection<DeliveryProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryProfile {
    #[serde(default)]
    default: bool,
    #[serde(default)]
    profile_location_groups: Vec<ProfileLocationGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileLocationGroup {
    location_group: LocationGroup,
    #[serde(default)]
    location_group_zones: Connection<LocationGroupZone>,
}

#[derive(Debug, Deserialize)]
struct LocationGroup {
    #[serde(default)]
    locations: Connection<LocationNode>,
}

#[derive(Debug, Deserialize)]
struct LocationNode {
    id: LocationId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationGroupZone {
    zone: Zone,
    #[serde(default)]
    method_definitions: Connection<MethodDefinition>,
}

#[derive(Debug, Deserialize)]
struct Zone {
    #[serde(default)]
    countries: Vec<Country>,
}

#[derive(Debug, Deserialize)]
struct Country {
    code: CountryCode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountryCode {
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    rest_of_world: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MethodDefinition {
    name: String,
    active: bool,
    rate_provider: RateProvider,
}

/// Only flat-rate definitions carry a price; carrier-calculated rates don't.
#[derive(Debug, Deserialize)]
struct RateProvider {
    #[serde(default)]
    price: Option<MoneyV2>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoneyV2 {
    amount: Decimal,
    currency_code: String,
}

impl From<MoneyV2> for Money {
    fn from(money: MoneyV2) -> Self {
        Self::new(money.amount, CurrencyCode::new(&money.currency_code))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftOrderCalculateData {
    draft_order_calculate: Option<DraftOrderCalculatePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftOrderCalculatePayload {
    calculated_draft_order: Option<CalculatedDraftOrder>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalculatedDraftOrder {
    #[serde(default)]
    available_shipping_rates: Vec<AvailableShippingRate>,
}

#[derive(Debug, Deserialize)]
struct AvailableShippingRate {
    title: String,
    price: MoneyV2,
}

fn zone_ships_to(zone: &Zone, market: &MarketCode) -> bool {
    zone.countries.iter().any(|c| {
        c.code
            .country_code
            .as_deref()
            .is_some_and(|code| MarketCode::new(code) == *market)
    })
}

fn zone_is_rest_of_world(zone: &Zone) -> bool {
    zone.countries.iter().any(|c| c.code.rest_of_world)
}

/// Derive a market's locations and flat rate from delivery profiles.
///
/// A zone naming the country wins over a rest-of-world zone.
fn market_delivery_from(profiles: &[DeliveryProfile], market: &MarketCode) -> MarketDelivery {
    let groups = || profiles.iter().flat_map(|p| p.profile_location_groups.iter().map(move |g| (p, g)));

    let explicit = groups().any(|(_, g)| {
        g.location_group_zones
            .nodes
            .iter()
            .any(|z| zone_ships_to(&z.zone, market))
    });
    let matches = |zone: &Zone| {
        if explicit {
            zone_ships_to(zone, market)
        } else {
            zone_is_rest_of_world(zone)
        }
    };

    let mut locations: Vec<LocationId> = Vec::new();
    let mut rate: Option<ShippingRate> = None;

    for (profile, group) in groups() {
        let zones: Vec<&LocationGroupZone> = group
            .location_group_zones
            .nodes
            .iter()
            .filter(|z| matches(&z.zone))
            .collect();
        if zones.is_empty() {
            continue;
        }

        for location in &group.location_group.locations.nodes {
            if !locations.contains(&location.id) {
                locations.push(location.id);
            }
        }

        if !profile.default {
            continue;
        }
        let methods = zones
            .iter()
            .flat_map(|z| z.method_definitions.nodes.iter())
            .filter(|m| m.active);
        for method in methods {
            let Some(price) = &method.rate_provider.price else {
                continue;
            };
            if rate.as_ref().is_none_or(|r| price.amount < r.price.amount) {
                rate = Some(ShippingRate {
                    title: method.name.clone(),
                    price: Money::new(price.amount, CurrencyCode::new(&price.currency_code)),
                    delivery_estimate: None,
                });
            }
        }
    }

    MarketDelivery { locations, rate }
}

impl AdminClient {
    /// Locations and flat rate for a market, cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery profiles cannot be fetched.
    #[instrument(skip(self), fields(market = %market))]
    pub(super) async fn market_delivery(
        &self,
        market: &MarketCode,
    ) -> Result<Arc<MarketDelivery>, ShopifyError> {
        if let Some(hit) = self.inner.delivery.get(market).await {
            return Ok(hit);
        }

        let data: DeliveryProfilesData = self
            .execute(queries::DELIVERY_PROFILES, serde_json::json!({}))
            .await?;

        let delivery = Arc::new(market_delivery_from(&data.delivery_profiles.nodes, market));
        self.inner
            .delivery
            .insert(market.clone(), Arc::clone(&delivery))
            .await;

        tracing::debug!(
            locations = delivery.locations.len(),
            has_rate = delivery.rate.is_some(),
            "Resolved market delivery"
        );
        Ok(delivery)
    }

    /// Quote shipping for a cart via a draft order calculation.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or Shopify rejects the input.
    #[instrument(skip(self, lines, address), fields(lines = lines.len(), country = ?address.country_code))]
    pub async fn calculate_shipping(
        &self,
        lines: &[ShippingLine],
        address: &ShippingAddress,
    ) -> Result<Vec<ShippingRate>, ShopifyError> {
        let line_items: Vec<serde_json::Value> = lines
            .iter()
            .map(|l| serde_json::json!({ "variantId": l.variant_id.to_gid(), "quantity": l.quantity }))
            .collect();

        let input = serde_json::json!({
            "lineItems": line_items,
            "shippingAddress": {
                "countryCode": address.country_code,
                "provinceCode": address.province_code,
                "city": address.city,
                "zip": address.zip,
                "address1": address.address1,
                "address2": address.address2,
            }
        });

        let data: DraftOrderCalculateData = self
            .execute(queries::DRAFT_ORDER_CALCULATE, serde_json::json!({ "input": input }))
            .await?;

        let payload = data
            .draft_order_calculate
            .ok_or_else(|| ShopifyError::graphql("draftOrderCalculate returned no payload"))?;

        if let Some(message) = user_error_message(&payload.user_errors) {
            return Err(ShopifyError::UserError(message));
        }

        Ok(payload
            .calculated_draft_order
            .map(|order| {
                order
                    .available_shipping_rates
                    .into_iter()
                    .map(|r| ShippingRate {
                        title: r.title,
                        price: r.price.into(),
                        delivery_estimate: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
