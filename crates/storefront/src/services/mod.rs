//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Email/password accounts held by the hosted backend
//! - `catalog` - Product gallery, detail lookup, and search
//! - `cart` - Cart manager over the guest slot or the account's cart rows
//! - `checkout` - Order placement
//! - `guest_store` - Guest cart slot

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod guest_store;

pub use auth::{AuthError, AuthService, Registration, SessionCheck};
pub use cart::{CartCommand, CartError, CartManager};
pub use catalog::Catalog;
pub use checkout::{
    CardForm, CheckoutError, CheckoutRequest, CheckoutService, OrderConfirmation,
    ValidatedCheckout,
};
pub use guest_store::{GuestStore, GuestStoreError, MemoryGuestStore, SessionGuestStore};
