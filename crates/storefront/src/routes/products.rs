//! Product route handlers: gallery, search, and detail.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use atelier_core::{Product, ProductId, parse_id};

use crate::error::{AppError, Result};
use crate::services::Catalog;
use crate::state::AppState;

/// Product display data.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub price_display: String,
    pub image_url: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            price_display: product.unit_price().display(),
            image_url: product.image_url.clone(),
        }
    }
}

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Search results.
#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub products: Vec<ProductView>,
}

/// Product gallery, oldest first.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Json<Vec<ProductView>> {
    let products = Catalog::new(state.backend()).list().await;
    Json(products.iter().map(ProductView::from).collect())
}

/// Substring search over name and description.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<SearchResults> {
    let products = Catalog::new(state.backend()).search(&query.q).await;
    Json(SearchResults {
        query: query.q,
        products: products.iter().map(ProductView::from).collect(),
    })
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductView>> {
    let not_found = || AppError::NotFound(format!("product {id}"));
    let product_id: ProductId = parse_id(&id).ok_or_else(not_found)?;

    Catalog::new(state.backend())
        .find(product_id)
        .await
        .map(|p| Json(ProductView::from(&p)))
        .ok_or_else(not_found)
}
