//! Cart records.
//!
//! [`CartItem`] is the one view type both storage backends map into: the
//! guest slot serializes it directly, and rows read from `cart_items` are
//! joined with their product and converted into it. Display and checkout
//! code therefore never care where an item came from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::Product;
use super::id::{CartItemId, ProductId, UserId};
use super::price::Price;

/// A line in the cart.
///
/// Quantity is always 1 when created through the storefront: adding the same
/// product twice yields two entries, never an incremented quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    /// Owning account; `None` for guest carts.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub product_id: ProductId,
    pub product: Product,
    pub quantity: u32,
    /// Free-text note attached to the line (empty when absent).
    #[serde(default)]
    pub personalization: String,
}

impl CartItem {
    /// Quantity every storefront add uses.
    pub const DEFAULT_QUANTITY: u32 = 1;

    /// Build a guest cart line for `product`.
    #[must_use]
    pub fn guest(product: &Product, personalization: &str) -> Self {
        Self {
            id: CartItemId::generate(),
            user_id: None,
            product_id: product.id,
            product: product.clone(),
            quantity: Self::DEFAULT_QUANTITY,
            personalization: personalization.to_owned(),
        }
    }

    /// `price × quantity`, unrounded.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }

    /// Personalization text, if any was entered.
    #[must_use]
    pub fn personalization(&self) -> Option<&str> {
        Some(self.personalization.as_str()).filter(|p| !p.is_empty())
    }
}

/// Insert payload for the `cart_items` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub personalization: String,
}

impl NewCartItem {
    /// Row for adding `product` to `user_id`'s cart with the default quantity.
    #[must_use]
    pub fn for_product(user_id: UserId, product: &Product, personalization: &str) -> Self {
        Self {
            user_id,
            product_id: product.id,
            quantity: CartItem::DEFAULT_QUANTITY,
            personalization: personalization.to_owned(),
        }
    }
}

/// Ordered cart contents for one scope (guest or signed-in account).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create a cart from already-ordered items.
    #[must_use]
    pub const fn new(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Consume the cart, returning its items.
    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of lines (not the sum of quantities).
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of `price × quantity` over all lines, unrounded.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Total as a store-currency price, for display.
    #[must_use]
    pub fn total_price(&self) -> Price {
        Price::store(self.total())
    }

    /// Append a line.
    pub fn push(&mut self, item: CartItem) {
        self.items.push(item);
    }

    /// Remove every line with `id`. Unknown ids are a no-op.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, id: CartItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Self::new(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(cents: i64) -> Product {
        Product {
            id: ProductId::generate(),
            name: format!("Produit {cents}"),
            description: String::new(),
            price: Decimal::new(cents, 2),
            image_url: String::new(),
            created_at: None,
        }
    }

    #[test]
    fn test_total_sums_price_times_quantity() {
        let mut cart = Cart::default();
        cart.push(CartItem::guest(&product(1000), ""));
        let mut double = CartItem::guest(&product(1500), "");
        double.quantity = 2;
        cart.push(double);

        assert_eq!(cart.total(), Decimal::new(4000, 2));
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_total_keeps_sub_cent_precision() {
        let mut cart = Cart::default();
        let mut item = CartItem::guest(&product(0), "");
        item.product.price = Decimal::new(3333, 3);
        item.quantity = 3;
        cart.push(item);

        assert_eq!(cart.total(), Decimal::new(9999, 3));
        assert_eq!(cart.total_price().display(), "10.00 €");
    }

    #[test]
    fn test_same_product_twice_is_two_lines() {
        let p = product(1000);
        let mut cart = Cart::default();
        cart.push(CartItem::guest(&p, ""));
        cart.push(CartItem::guest(&p, ""));

        assert_eq!(cart.item_count(), 2);
        assert!(cart.items().iter().all(|i| i.quantity == 1));
        assert_ne!(cart.items()[0].id, cart.items()[1].id);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut cart = Cart::default();
        cart.push(CartItem::guest(&product(1000), "Joyeux anniversaire"));
        let snapshot = cart.clone();

        assert!(!cart.remove(CartItemId::generate()));
        assert_eq!(cart, snapshot);
    }

    #[test]
    fn test_personalization_empty_is_none() {
        let item = CartItem::guest(&product(1000), "");
        assert_eq!(item.personalization(), None);
        let item = CartItem::guest(&product(1000), "Pour Léa");
        assert_eq!(item.personalization(), Some("Pour Léa"));
    }
}
