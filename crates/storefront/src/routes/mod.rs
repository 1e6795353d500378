//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (backend reachable)
//!
//! # Products
//! GET  /api/products           - Product gallery
//! GET  /api/products/search    - Search (?q=)
//! GET  /api/products/{id}      - Product detail
//!
//! # Cart
//! GET  /api/cart               - Cart with total and item count
//! POST /api/cart/commands      - Apply {"action": "add" | "remove", ...}
//!
//! # Checkout (requires auth)
//! GET  /api/checkout           - Order summary
//! POST /api/checkout           - Place order
//!
//! # Auth
//! POST /api/auth/register      - Register
//! POST /api/auth/login         - Login
//! POST /api/auth/logout        - Logout
//! GET  /api/auth/me            - Current user
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{RateLimiterLayer, api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/search", get(products::search))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router. Commands go through `writes`.
pub fn cart_routes(writes: RateLimiterLayer) -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/commands", post(cart::command).layer(writes))
}

/// Create the checkout routes router. Placing an order goes through `writes`.
pub fn checkout_routes(writes: RateLimiterLayer) -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::summary))
        .route("/", post(checkout::place).layer(writes))
}

/// Create the auth routes router. Register and login share `credentials`.
pub fn auth_routes(credentials: RateLimiterLayer) -> Router<AppState> {
    let credentials = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(credentials);

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .merge(credentials)
}

/// Create all API routes for the storefront.
///
/// `trust_proxy` lets the rate limiters key on proxy headers.
pub fn routes(trust_proxy: bool) -> Router<AppState> {
    let writes = api_rate_limiter(trust_proxy);

    Router::new()
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes(writes.clone()))
        .nest("/api/checkout", checkout_routes(writes))
        .nest("/api/auth", auth_routes(auth_rate_limiter(trust_proxy)))
}
