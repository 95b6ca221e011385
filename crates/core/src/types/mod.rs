//! Core types for Shopfleet.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod catalog;
pub mod id;
pub mod market;
pub mod money;
pub mod status;
pub mod validation;

pub use cart::{CartLineItem, ShippingAddress};
pub use catalog::{
    CanonicalItem, CanonicalPatch, CanonicalVariant, Product, ProductPatch, Stock, Variant,
    VariantPatch,
};
pub use id::*;
pub use market::{
    DeliveryEstimate, MarketAvailability, MarketCode, MarketListing, MarketMap, PipelineDefaults,
    ShippingEstimate, ShippingRate,
};
pub use money::{CurrencyCode, Money};
pub use status::*;
pub use validation::{
    CheckStatus, FailureKind, InventoryCheck, InventoryLine, MarketCheck, ShippingCheck,
    StockSource, UnavailableItem, ValidationResult,
};
