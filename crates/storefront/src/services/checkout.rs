//! Order placement.
//!
//! # Sequence
//!
//! 1. Reject an empty cart.
//! 2. Validate the seven shipping fields, the payment method, and for
//!    `card` the card sub-form. Nothing is written if any check fails.
//! 3. Require a signed-in identity.
//! 4. Insert the order (`pending`, total from the cart).
//! 5. Insert one order line per cart line. The order from step 4 is not
//!    rolled back if this fails.
//! 6. Clear the identity's cart rows (best-effort).
//! 7. Clear the guest slot (always).
//!
//! Steps run strictly in order and nothing is retried.

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use atelier_core::{
    CardDetails, CardError, Cart, NewOrder, NewOrderItem, Order, OrderId, OrderStatus,
    PaymentMethod, ShippingAddress, ShippingField,
};

use super::guest_store::GuestStore;
use crate::backend::{Backend, BackendError, Identity};

/// Errors that can occur when placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    #[error("please fill in the {0} field")]
    MissingShippingField(ShippingField),

    #[error("please select a payment method")]
    MissingPaymentMethod,

    #[error("unsupported payment method: {0}")]
    UnknownPaymentMethod(String),

    #[error("{0}")]
    Card(#[from] CardError),

    #[error("you must be signed in to place an order")]
    NotAuthenticated,

    /// Order row could not be created. Nothing was written.
    #[error("could not create order: {0}")]
    OrderCreation(#[source] BackendError),

    /// Order row exists but its lines could not be created.
    #[error("order {order_id} was created but its items could not be saved: {source}")]
    OrderItemsCreation {
        order_id: OrderId,
        #[source]
        source: BackendError,
    },
}

impl CheckoutError {
    /// Whether the error is a form problem the customer can fix.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyCart
                | Self::MissingShippingField(_)
                | Self::MissingPaymentMethod
                | Self::UnknownPaymentMethod(_)
                | Self::Card(_)
        )
    }
}

/// Raw card sub-form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CardForm {
    pub number: String,
    pub expiry: String,
    pub cvv: String,
}

/// Checkout form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutRequest {
    pub shipping: ShippingAddress,
    pub payment_method: Option<String>,
    pub card: Option<CardForm>,
}

/// Checkout form that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedCheckout {
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub card: Option<CardDetails>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub order: Order,
    pub item_count: usize,
    /// Last four card digits when paid by card.
    pub card_last4: Option<String>,
}

/// Validate a checkout submission against `cart`.
///
/// # Errors
///
/// Returns the first failing precondition, checked in the order: cart
/// non-empty, shipping fields, payment method, card details.
pub fn validate(
    cart: &Cart,
    request: &CheckoutRequest,
) -> Result<ValidatedCheckout, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    if let Some(field) = request.shipping.first_missing() {
        return Err(CheckoutError::MissingShippingField(field));
    }

    let method = request
        .payment_method
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or(CheckoutError::MissingPaymentMethod)?;
    let payment_method: PaymentMethod = method
        .parse()
        .map_err(|_| CheckoutError::UnknownPaymentMethod(method.to_string()))?;

    let card = if payment_method.requires_card() {
        let form = request.card.clone().unwrap_or_default();
        Some(CardDetails::parse(&form.number, &form.expiry, &form.cvv)?)
    } else {
        None
    };

    Ok(ValidatedCheckout {
        shipping: request.shipping.clone(),
        payment_method,
        card,
    })
}

/// Order placement for one request.
pub struct CheckoutService<'a> {
    backend: &'a dyn Backend,
    guest: &'a dyn GuestStore,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend, guest: &'a dyn GuestStore) -> Self {
        Self { backend, guest }
    }

    /// Place an order for the contents of `cart`.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any write, `NotAuthenticated`
    /// without an identity, `OrderCreation` if the order insert fails, and
    /// `OrderItemsCreation` (carrying the orphaned order id) if the line
    /// insert fails. Cart cleanup failures are logged, not returned.
    #[instrument(skip_all, fields(item_count = cart.item_count()))]
    pub async fn place_order(
        &self,
        identity: Option<&Identity>,
        cart: &Cart,
        request: &CheckoutRequest,
    ) -> Result<OrderConfirmation, CheckoutError> {
        let checkout = validate(cart, request)?;
        let identity = identity.ok_or(CheckoutError::NotAuthenticated)?;

        let new_order = NewOrder {
            user_id: identity.user_id,
            total_amount: cart.total(),
            status: OrderStatus::Pending,
            payment_method: checkout.payment_method,
            shipping_address: checkout.shipping,
        };
        let order = self
            .backend
            .insert_order(identity, &new_order)
            .await
            .map_err(CheckoutError::OrderCreation)?;

        let lines: Vec<NewOrderItem> = cart
            .items()
            .iter()
            .map(|item| NewOrderItem::snapshot(order.id, item))
            .collect();
        if let Err(source) = self.backend.insert_order_items(identity, &lines).await {
            error!(
                order_id = %order.id,
                user_id = %identity.user_id,
                error = %source,
                "Order created without items"
            );
            return Err(CheckoutError::OrderItemsCreation {
                order_id: order.id,
                source,
            });
        }

        if let Err(e) = self.backend.clear_cart_items(identity).await {
            warn!(order_id = %order.id, error = %e, "Failed to clear cart after order");
        }
        if let Err(e) = self.guest.clear_slot().await {
            warn!(order_id = %order.id, error = %e, "Failed to clear guest cart after order");
        }

        info!(
            order_id = %order.id,
            total = %order.total_amount,
            payment_method = %order.payment_method,
            "Order placed"
        );

        Ok(OrderConfirmation {
            item_count: lines.len(),
            card_last4: checkout.card.as_ref().map(|c| c.last4().to_string()),
            order,
        })
    }
}
