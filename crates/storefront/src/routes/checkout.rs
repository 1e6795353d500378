//! Checkout route handlers. Both require a signed-in identity.

use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{OrderId, OrderStatus, PaymentMethod};

use super::cart::CartView;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireIdentity;
use crate::services::{
    CartManager, CheckoutRequest, CheckoutService, OrderConfirmation, SessionGuestStore,
};
use crate::state::AppState;

/// Order summary shown beside the checkout form.
#[derive(Debug, Serialize)]
pub struct CheckoutSummaryView {
    pub email: String,
    pub cart: CartView,
}

/// Placed order display data.
#[derive(Debug, Serialize)]
pub struct OrderConfirmationView {
    pub order_id: OrderId,
    pub reference: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub total: Decimal,
    pub total_display: String,
    pub item_count: usize,
    pub card_last4: Option<String>,
}

impl From<OrderConfirmation> for OrderConfirmationView {
    fn from(confirmation: OrderConfirmation) -> Self {
        let order = confirmation.order;
        Self {
            order_id: order.id,
            reference: order.id.short_reference(),
            status: order.status,
            payment_method: order.payment_method,
            total: order.total_amount,
            total_display: order.total().display(),
            item_count: confirmation.item_count,
            card_last4: confirmation.card_last4,
        }
    }
}

/// Order summary for the signed-in cart.
#[instrument(skip_all, fields(user_id = %identity.user_id))]
pub async fn summary(
    State(state): State<AppState>,
    session: Session,
    RequireIdentity(identity): RequireIdentity,
) -> Json<CheckoutSummaryView> {
    let guest = SessionGuestStore::new(session);
    let mut manager = CartManager::new(state.backend(), &guest, Some(&identity));
    let cart = CartView::from(manager.load().await);

    Json(CheckoutSummaryView {
        email: identity.email.to_string(),
        cart,
    })
}

/// Place an order for the signed-in cart.
#[instrument(skip_all, fields(user_id = %identity.user_id))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireIdentity(identity): RequireIdentity,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderConfirmationView>)> {
    let guest = SessionGuestStore::new(session);
    let mut manager = CartManager::new(state.backend(), &guest, Some(&identity));
    manager.load().await;
    let cart = manager.into_cart();

    let confirmation = CheckoutService::new(state.backend(), &guest)
        .place_order(Some(&identity), &cart, &request)
        .await?;

    add_breadcrumb(
        "checkout",
        "order placed",
        &[("order_id", confirmation.order.id.to_string())],
    );

    Ok((
        StatusCode::CREATED,
        Json(OrderConfirmationView::from(confirmation)),
    ))
}
