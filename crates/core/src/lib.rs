//! Shopfleet Core - Shared types and pure synchronization logic.
//!
//! This crate provides the types used by every Shopfleet component:
//! - `sync` - Webhook receiver, checkout validation, and reconciliation service
//! - `cli` - Command-line tools for migrations and manual resyncs
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything that decides *what* to write lives here;
//! the sync crate decides *when* and *where*.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, money, catalog records, patches, and checkout results
//! - [`resolver`] - Per-market availability and shipping resolution
//! - [`matcher`] - Matching Shopify variants to stored storefront variants
//! - [`merge`] - Diffing stored records against authoritative facts into patches

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod matcher;
pub mod merge;
pub mod resolver;
pub mod types;

pub use types::*;
