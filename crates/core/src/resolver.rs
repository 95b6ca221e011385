//! Market resolution: availability, currency, and shipping for one market.
//!
//! [`resolve_market`] is pure. Callers gather what Shopify said (or failed to
//! say) into [`Lookup`] values and get back the entry to store. Shopify
//! outages never erase data: a failed lookup retains the previous entry's
//! value, and with nothing to retain availability fails open.

use crate::types::{
    MarketAvailability, MarketCode, MarketListing, MarketMap, PipelineDefaults, ShippingRate,
};

/// The outcome of one external lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    /// Shopify answered with a value.
    Found(T),
    /// Shopify answered and has nothing.
    Absent,
    /// Shopify could not be reached or returned an error.
    Failed,
}

impl<T> Lookup<T> {
    /// Build from an `Option` returned by a successful call.
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Self::Found)
    }

    /// Build from a fallible call returning an `Option`.
    pub fn from_result<E>(result: Result<Option<T>, E>) -> Self {
        result.map_or(Self::Failed, Self::from_option)
    }

    /// Borrow the contained value.
    pub const fn as_ref(&self) -> Lookup<&T> {
        match self {
            Self::Found(v) => Lookup::Found(v),
            Self::Absent => Lookup::Absent,
            Self::Failed => Lookup::Failed,
        }
    }
}

/// Everything known about one market for one product.
#[derive(Debug, Clone, Copy)]
pub struct MarketInput<'a> {
    pub market: &'a MarketCode,
    /// The entry currently stored for this market, if any.
    pub existing: Option<&'a MarketAvailability>,
    /// Publication of the product in this market.
    pub listing: Lookup<&'a MarketListing>,
    /// Authoritative shipping rate to this market.
    pub rate: Lookup<&'a ShippingRate>,
    pub defaults: &'a PipelineDefaults,
}

/// Resolve a product's availability in one market.
#[must_use]
pub fn resolve_market(input: MarketInput<'_>) -> MarketAvailability {
    let estimate = input.defaults.estimate_for(input.market);
    let mut is_estimate = false;

    let available = match (input.listing, input.existing) {
        (Lookup::Found(listing), _) => listing.published,
        (Lookup::Absent, _) => false,
        (Lookup::Failed, Some(existing)) => {
            is_estimate |= existing.is_estimate;
            existing.available
        }
        (Lookup::Failed, None) => {
            // Blocking sales on a transient error is worse than a stale flag
            is_estimate = true;
            true
        }
    };

    let currency = match input.listing {
        Lookup::Found(listing) => listing.currency.clone(),
        _ => input
            .existing
            .map_or_else(|| estimate.currency.clone(), |e| e.currency.clone()),
    };

    let (shipping_rate, delivery_estimate) = match (input.rate, input.existing) {
        (Lookup::Found(rate), existing) => (
            Some(rate.price.amount),
            rate.delivery_estimate
                .or_else(|| existing.and_then(|e| e.delivery_estimate))
                .or(Some(estimate.delivery_estimate)),
        ),
        (Lookup::Failed, Some(existing)) if existing.shipping_rate.is_some() => {
            is_estimate |= existing.is_estimate;
            (existing.shipping_rate, existing.delivery_estimate)
        }
        _ => {
            is_estimate = true;
            (Some(estimate.rate), Some(estimate.delivery_estimate))
        }
    };

    MarketAvailability {
        available,
        currency,
        shipping_rate,
        delivery_estimate,
        is_estimate,
    }
}

/// Fold freshly resolved entries into an existing map.
///
/// Markets not present in `resolved` keep their previous entries.
#[must_use]
pub fn merge_markets(existing: &MarketMap, resolved: MarketMap) -> MarketMap {
    let mut merged = existing.clone();
    merged.extend(resolved);
    merged
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::*;
    use crate::types::{CurrencyCode, DeliveryEstimate, Money, ShippingEstimate, StorefrontId};

    fn defaults() -> PipelineDefaults {
        PipelineDefaults {
            default_market: MarketCode::new("US"),
            default_storefront: StorefrontId::new("main"),
            default_shipping: ShippingEstimate {
                rate: Decimal::new(995, 2),
                currency: CurrencyCode::usd(),
                delivery_estimate: DeliveryEstimate::new(3, 7),
            },
            shipping_estimates: BTreeMap::from([(
                MarketCode::new("CA"),
                ShippingEstimate {
                    rate: Decimal::new(1495, 2),
                    currency: CurrencyCode::new("CAD"),
                    delivery_estimate: DeliveryEstimate::new(5, 10),
                },
            )]),
        }
    }

    fn listing(market: &str, published: bool, currency: &str) -> MarketListing {
        MarketListing {
            market: MarketCode::new(market),
            published,
            currency: CurrencyCode::new(currency),
        }
    }

    fn rate(amount: i64) -> ShippingRate {
        ShippingRate {
            title: "Standard".to_string(),
            price: Money::new(Decimal::new(amount, 2), CurrencyCode::usd()),
            delivery_estimate: Some(DeliveryEstimate::new(2, 4)),
        }
    }

    fn existing(available: bool, shipping: Option<i64>) -> MarketAvailability {
        MarketAvailability {
            available,
            currency: CurrencyCode::new("EUR"),
            shipping_rate: shipping.map(|s| Decimal::new(s, 2)),
            delivery_estimate: Some(DeliveryEstimate::new(4, 8)),
            is_estimate: false,
        }
    }

    #[test]
    fn test_authoritative_rate_wins_over_estimate() {
        let market = MarketCode::new("US");
        let defaults = defaults();
        let l = listing("US", true, "USD");
        let r = rate(650);
        let result = resolve_market(MarketInput {
            market: &market,
            existing: None,
            listing: Lookup::Found(&l),
            rate: Lookup::Found(&r),
            defaults: &defaults,
        });

        assert!(result.available);
        assert!(!result.is_estimate);
        assert_eq!(result.shipping_rate, Some(Decimal::new(650, 2)));
        assert_eq!(result.delivery_estimate, Some(DeliveryEstimate::new(2, 4)));
        assert_eq!(result.currency, CurrencyCode::usd());
    }

    #[test]
    fn test_missing_rate_uses_market_estimate() {
        let market = MarketCode::new("CA");
        let defaults = defaults();
        let l = listing("CA", true, "CAD");
        let result = resolve_market(MarketInput {
            market: &market,
            existing: None,
            listing: Lookup::Found(&l),
            rate: Lookup::Absent,
            defaults: &defaults,
        });

        assert!(result.available);
        assert!(result.is_estimate);
        assert_eq!(result.shipping_rate, Some(Decimal::new(1495, 2)));
        assert_eq!(result.delivery_estimate, Some(DeliveryEstimate::new(5, 10)));
    }

    #[test]
    fn test_everything_failed_fails_open() {
        let market = MarketCode::new("FR");
        let defaults = defaults();
        let result = resolve_market(MarketInput {
            market: &market,
            existing: None,
            listing: Lookup::Failed,
            rate: Lookup::Failed,
            defaults: &defaults,
        });

        assert!(result.available);
        assert!(result.is_estimate);
        assert_eq!(result.shipping_rate, Some(Decimal::new(995, 2)));
        assert_eq!(result.currency, CurrencyCode::usd());
    }

    #[test]
    fn test_failed_lookups_retain_previous_values() {
        let market = MarketCode::new("DE");
        let defaults = defaults();
        let previous = existing(false, Some(1200));
        let result = resolve_market(MarketInput {
            market: &market,
            existing: Some(&previous),
            listing: Lookup::Failed,
            rate: Lookup::Failed,
            defaults: &defaults,
        });

        assert_eq!(result, previous);
    }

    #[test]
    fn test_absent_listing_is_unavailable() {
        let market = MarketCode::new("US");
        let defaults = defaults();
        let previous = existing(true, Some(500));
        let result = resolve_market(MarketInput {
            market: &market,
            existing: Some(&previous),
            listing: Lookup::Absent,
            rate: Lookup::Absent,
            defaults: &defaults,
        });

        assert!(!result.available);
        assert!(result.is_estimate);
    }

    #[test]
    fn test_merge_preserves_untouched_markets() {
        let mut current = MarketMap::new();
        current.insert(MarketCode::new("US"), existing(true, Some(500)));
        current.insert(MarketCode::new("GB"), existing(true, Some(900)));

        let mut resolved = MarketMap::new();
        resolved.insert(MarketCode::new("US"), existing(false, Some(700)));

        let merged = merge_markets(&current, resolved);
        assert_eq!(merged.len(), 2);
        assert!(!merged[&MarketCode::new("US")].available);
        assert!(merged[&MarketCode::new("GB")].available);
    }

    #[test]
    fn test_lookup_from_result() {
        let ok: Result<Option<u8>, ()> = Ok(Some(1));
        let none: Result<Option<u8>, ()> = Ok(None);
        let err: Result<Option<u8>, ()> = Err(());
        assert_eq!(Lookup::from_result(ok), Lookup::Found(1));
        assert_eq!(Lookup::from_result(none), Lookup::Absent);
        assert_eq!(Lookup::from_result(err), Lookup::Failed);
    }
}
