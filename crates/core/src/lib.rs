//! Atelier Core - Shared domain types.
//!
//! This crate provides the types shared by every Atelier component:
//! - `storefront` - Cart, checkout and auth services plus the JSON API
//! - `integration-tests` - End-to-end scenarios over the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and pure validation - no I/O, no HTTP
//! clients, no session handling. Anything that talks to the hosted backend
//! lives in the storefront crate.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices, emails, statuses, catalog/cart/order records
//!   and card-format validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
