//! Cart route handlers.
//!
//! The cart is resolved per request: the signed-in identity's cart rows when
//! there is one, otherwise the guest slot in the session. All mutations go
//! through one command endpoint.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{Cart, CartItem, CartItemId, ProductId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::OptionalIdentity;
use crate::services::{CartCommand, CartManager, Catalog, SessionGuestStore};
use crate::state::AppState;

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub image_url: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub personalization: Option<String>,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            name: item.product.name.clone(),
            image_url: item.product.image_url.clone(),
            quantity: item.quantity,
            price: item.product.unit_price().display(),
            line_price: atelier_core::Price::store(item.line_total()).display(),
            personalization: item.personalization().map(str::to_owned),
        }
    }
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total: Decimal,
    pub total_display: String,
    pub item_count: usize,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().iter().map(CartItemView::from).collect(),
            total: cart.total(),
            total_display: cart.total_price().display(),
            item_count: cart.item_count(),
        }
    }
}

/// Current cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(identity): OptionalIdentity,
) -> Json<CartView> {
    let guest = SessionGuestStore::new(session);
    let mut manager = CartManager::new(state.backend(), &guest, identity.as_ref());
    Json(CartView::from(manager.load().await))
}

/// Apply a cart command and return the updated cart.
#[instrument(skip_all)]
pub async fn command(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(identity): OptionalIdentity,
    Json(command): Json<CartCommand>,
) -> Result<Json<CartView>> {
    let (action, target) = match &command {
        CartCommand::Add { product_id, .. } => ("add", product_id.to_string()),
        CartCommand::Remove { item_id } => ("remove", item_id.to_string()),
    };
    add_breadcrumb("cart", action, &[("target", target)]);

    let guest = SessionGuestStore::new(session);
    let mut manager = CartManager::new(state.backend(), &guest, identity.as_ref());
    manager.load().await;
    manager
        .dispatch(command, &Catalog::new(state.backend()))
        .await?;

    Ok(Json(CartView::from(manager.cart())))
}
