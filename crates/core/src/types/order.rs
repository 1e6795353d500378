//! Order records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::CartItem;
use super::id::{OrderId, OrderItemId, ProductId, UserId};
use super::price::Price;
use super::status::{OrderStatus, PaymentMethod};

/// Shipping address snapshot stored on the order.
///
/// Serialized in camelCase: this is the JSON object written to the
/// `orders.shipping_address` column. Absent fields deserialize as empty so
/// form validation can name them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub country: String,
}

/// One of the seven required shipping fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingField {
    FullName,
    Email,
    Phone,
    Address,
    City,
    ZipCode,
    Country,
}

impl ShippingField {
    /// Every field, in form order.
    pub const ALL: [Self; 7] = [
        Self::FullName,
        Self::Email,
        Self::Phone,
        Self::Address,
        Self::City,
        Self::ZipCode,
        Self::Country,
    ];

    /// Human-readable field label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::FullName => "full name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::City => "city",
            Self::ZipCode => "zip code",
            Self::Country => "country",
        }
    }
}

impl std::fmt::Display for ShippingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl ShippingAddress {
    /// Value of `field`.
    #[must_use]
    pub fn get(&self, field: ShippingField) -> &str {
        match field {
            ShippingField::FullName => &self.full_name,
            ShippingField::Email => &self.email,
            ShippingField::Phone => &self.phone,
            ShippingField::Address => &self.address,
            ShippingField::City => &self.city,
            ShippingField::ZipCode => &self.zip_code,
            ShippingField::Country => &self.country,
        }
    }

    /// First field that is empty or whitespace-only, in form order.
    #[must_use]
    pub fn first_missing(&self) -> Option<ShippingField> {
        ShippingField::ALL
            .into_iter()
            .find(|field| self.get(*field).trim().is_empty())
    }
}

/// Insert payload for the `orders` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
}

/// An order row as returned by the backend after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Total as a store-currency price.
    #[must_use]
    pub const fn total(&self) -> Price {
        Price::store(self.total_amount)
    }
}

/// Insert payload for the `order_items` table.
///
/// Price and personalization are snapshots taken at order time, decoupled
/// from later product changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Decimal,
    pub personalization: String,
}

impl NewOrderItem {
    /// Snapshot a cart line into an order line for `order_id`.
    #[must_use]
    pub fn snapshot(order_id: OrderId, item: &CartItem) -> Self {
        Self {
            order_id,
            product_id: item.product.id,
            quantity: item.quantity,
            price: item.product.price,
            personalization: item.personalization.clone(),
        }
    }
}

/// An order line row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default)]
    pub personalization: String,
}
