//! Hosted backend (database + auth) access.
//!
//! # Architecture
//!
//! - [`Backend`] is the seam between the storefront services and the hosted
//!   backend-as-a-service: one method per collection operation and identity
//!   call the storefront needs, nothing more.
//! - [`SupabaseClient`] implements it over the PostgREST (`/rest/v1`) and
//!   GoTrue (`/auth/v1`) HTTP APIs with `reqwest`.
//! - [`MemoryBackend`] implements it in-process for tests and local runs.
//!
//! The backend is the source of truth: there is no local sync. The only
//! in-process state is the product list cache in [`SupabaseClient`].
//!
//! # Collections
//!
//! | Collection    | Operations                                              |
//! |---------------|---------------------------------------------------------|
//! | `products`    | read-all ordered by `created_at` ascending              |
//! | `cart_items`  | read by identity (joined with product), insert, delete  |
//! | `orders`      | insert returning the created row                        |
//! | `order_items` | insert-many                                             |

mod memory;
mod supabase;
pub mod types;

pub use memory::{FailPoint, MemoryBackend};
pub use supabase::SupabaseClient;
pub use types::{AuthSession, AuthUser, Identity, SignUpOutcome};

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use atelier_core::{
    CartItem, CartItemId, Email, NewCartItem, NewOrder, NewOrderItem, Order, Product,
};

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Credentials or access token rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

/// Remote data service consumed by the storefront.
///
/// Row-scoped calls take the caller's [`Identity`] so the backend's
/// row-level security sees the signed-in user.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All products, ordered by creation time ascending.
    async fn list_products(&self) -> Result<Vec<Product>, BackendError>;

    /// Cart rows owned by `identity`, each joined with its product.
    async fn list_cart_items(&self, identity: &Identity) -> Result<Vec<CartItem>, BackendError>;

    /// Insert one cart row.
    async fn insert_cart_item(
        &self,
        identity: &Identity,
        item: &NewCartItem,
    ) -> Result<(), BackendError>;

    /// Delete one cart row by id. Deleting an unknown id succeeds.
    async fn delete_cart_item(&self, identity: &Identity, id: CartItemId)
    -> Result<(), BackendError>;

    /// Delete every cart row owned by `identity`.
    async fn clear_cart_items(&self, identity: &Identity) -> Result<(), BackendError>;

    /// Insert an order and return the created row (with generated id).
    async fn insert_order(&self, identity: &Identity, order: &NewOrder)
    -> Result<Order, BackendError>;

    /// Insert order lines in one request.
    async fn insert_order_items(
        &self,
        identity: &Identity,
        items: &[NewOrderItem],
    ) -> Result<(), BackendError>;

    /// Create an account with email and password.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, BackendError>;

    /// Exchange email and password for a session.
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError>;

    /// Exchange a refresh token for a new session.
    ///
    /// Refresh tokens are single use: the returned session carries the
    /// replacement. A spent or revoked token is `Unauthorized`.
    async fn refresh_session(&self, refresh_token: &SecretString)
    -> Result<AuthSession, BackendError>;

    /// User behind `access_token`, or `None` if the token is not (or no
    /// longer) valid.
    async fn current_user(&self, access_token: &SecretString)
    -> Result<Option<AuthUser>, BackendError>;

    /// Revoke `access_token`.
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError>;
}
