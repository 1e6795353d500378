//! Core types for Atelier.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod catalog;
pub mod email;
pub mod id;
pub mod order;
pub mod payment;
pub mod price;
pub mod status;

pub use cart::{Cart, CartItem, NewCartItem};
pub use catalog::Product;
pub use email::{Email, EmailError};
pub use id::*;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, ShippingAddress, ShippingField};
pub use payment::{CardDetails, CardError};
pub use price::{CurrencyCode, Price};
pub use status::*;
