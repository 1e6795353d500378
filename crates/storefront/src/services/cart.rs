//! Cart manager.
//!
//! Keeps the in-memory [`Cart`] consistent with whichever store backs the
//! current scope:
//!
//! - **Guest** (no identity): the guest slot. Mutations build the new item
//!   list, persist it, and only then adopt it, so the in-memory cart is the
//!   snapshot that was written.
//! - **Signed in**: the `cart_items` collection. Mutations go to the backend
//!   and the cart is then reloaded; local state is never patched.
//!
//! Adding never merges lines: the same product added twice is two entries.

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{instrument, warn};

use atelier_core::{Cart, CartItem, CartItemId, NewCartItem, Product, ProductId};

use super::catalog::Catalog;
use super::guest_store::{self, GuestStore, GuestStoreError};
use crate::backend::{Backend, BackendError, Identity};

/// Errors that can occur when changing the cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// Remote write failed.
    #[error("could not update cart: {0}")]
    Backend(#[from] BackendError),

    /// Guest slot write failed.
    #[error("could not save cart: {0}")]
    GuestStore(#[from] GuestStoreError),

    /// Add referenced a product that is not in the catalog.
    #[error("product not found: {0}")]
    UnknownProduct(ProductId),
}

/// A cart action requested by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CartCommand {
    /// Add one unit of a product.
    Add {
        product_id: ProductId,
        #[serde(default)]
        personalization: String,
    },
    /// Remove a line.
    Remove { item_id: CartItemId },
}

/// Cart operations for one request scope.
pub struct CartManager<'a> {
    backend: &'a dyn Backend,
    guest: &'a dyn GuestStore,
    identity: Option<&'a Identity>,
    cart: Cart,
}

impl<'a> CartManager<'a> {
    /// Create a manager with an empty cart. Call [`CartManager::load`]
    /// before reading.
    #[must_use]
    pub fn new(
        backend: &'a dyn Backend,
        guest: &'a dyn GuestStore,
        identity: Option<&'a Identity>,
    ) -> Self {
        Self {
            backend,
            guest,
            identity,
            cart: Cart::default(),
        }
    }

    /// Load the cart from its backing store.
    ///
    /// Never fails: an unreadable store is logged and yields an empty cart.
    #[instrument(skip(self), fields(signed_in = self.identity.is_some()))]
    pub async fn load(&mut self) -> &Cart {
        self.cart = match self.identity {
            None => Cart::new(guest_store::read_items(self.guest).await),
            Some(identity) => match self.backend.list_cart_items(identity).await {
                Ok(items) => Cart::new(items),
                Err(e) => {
                    warn!(error = %e, user_id = %identity.user_id, "Failed to load cart");
                    Cart::default()
                }
            },
        };
        &self.cart
    }

    /// Add one unit of `product` with an optional personalization note.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store write fails; the cart is left
    /// unchanged in that case.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&mut self, product: &Product, personalization: &str) -> Result<(), CartError> {
        match self.identity {
            None => {
                let mut items = self.cart.items().to_vec();
                items.push(CartItem::guest(product, personalization));
                self.persist_guest(items).await
            }
            Some(identity) => {
                let row = NewCartItem::for_product(identity.user_id, product, personalization);
                self.backend.insert_cart_item(identity, &row).await?;
                self.load().await;
                Ok(())
            }
        }
    }

    /// Remove the line with `id`. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store write fails.
    #[instrument(skip(self))]
    pub async fn remove(&mut self, id: CartItemId) -> Result<(), CartError> {
        match self.identity {
            None => {
                let mut cart = self.cart.clone();
                cart.remove(id);
                self.persist_guest(cart.into_items()).await
            }
            Some(identity) => {
                self.backend.delete_cart_item(identity, id).await?;
                self.load().await;
                Ok(())
            }
        }
    }

    /// Apply a UI command, resolving products through `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownProduct`] if an add names a product the
    /// catalog does not have, [`CartError::Backend`] if the catalog cannot
    /// be read, or any error from the underlying operation.
    pub async fn dispatch(
        &mut self,
        command: CartCommand,
        catalog: &Catalog<'_>,
    ) -> Result<(), CartError> {
        match command {
            CartCommand::Add {
                product_id,
                personalization,
            } => {
                let product = catalog
                    .lookup(product_id)
                    .await?
                    .ok_or(CartError::UnknownProduct(product_id))?;
                self.add(&product, &personalization).await
            }
            CartCommand::Remove { item_id } => self.remove(item_id).await,
        }
    }

    /// Current in-memory cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Consume the manager, returning the cart.
    #[must_use]
    pub fn into_cart(self) -> Cart {
        self.cart
    }

    /// Sum of `price × quantity` over all lines, unrounded.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.cart.total()
    }

    /// Number of lines.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.cart.item_count()
    }

    async fn persist_guest(&mut self, items: Vec<CartItem>) -> Result<(), CartError> {
        guest_store::write_items(self.guest, &items).await?;
        self.cart = Cart::new(items);
        Ok(())
    }
}
