//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; the response body is `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;
use crate::services::{AuthError, CartError, CheckoutError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Hosted backend operation failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order placement failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Backend(err) => backend_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::PasswordMismatch
                | AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Backend(err) => backend_status(err),
            },
            Self::Cart(err) => match err {
                CartError::UnknownProduct(_) => StatusCode::NOT_FOUND,
                CartError::Backend(err) => backend_status(err),
                CartError::GuestStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) if err.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Checkout(CheckoutError::NotAuthenticated) => StatusCode::UNAUTHORIZED,
            Self::Checkout(_) => StatusCode::BAD_GATEWAY,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Client-facing message. Internal details are not exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Backend(_) => "External service error".to_string(),
            Self::Session(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::PasswordMismatch => "Passwords do not match".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Backend(_) => "Authentication service error".to_string(),
            },
            Self::Cart(err) => match err {
                CartError::UnknownProduct(_) => "Product not found".to_string(),
                _ => "Could not update your cart".to_string(),
            },
            Self::Checkout(err) => match err {
                CheckoutError::OrderCreation(_) => "Could not create your order".to_string(),
                CheckoutError::OrderItemsCreation { order_id, .. } => format!(
                    "Order {} was recorded but its items could not be saved. Please contact us.",
                    order_id.short_reference()
                ),
                other => other.to_string(),
            },
            Self::NotFound(_) | Self::Unauthorized(_) => self.to_string(),
        }
    }
}

const fn backend_status(err: &BackendError) -> StatusCode {
    match err {
        BackendError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a cart or checkout action.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use atelier_core::{CardError, OrderId, ProductId, ShippingField};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Session(tower_sessions::session::Error::Store(
                tower_sessions::session_store::Error::Backend("store down".to_string())
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::UnknownProduct(ProductId::generate()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Backend(BackendError::RateLimited(5))),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_checkout_validation_is_unprocessable() {
        for err in [
            CheckoutError::EmptyCart,
            CheckoutError::MissingShippingField(ShippingField::ZipCode),
            CheckoutError::MissingPaymentMethod,
            CheckoutError::Card(CardError::InvalidCvv),
        ] {
            assert_eq!(
                get_status(AppError::Checkout(err)),
                StatusCode::UNPROCESSABLE_ENTITY
            );
        }
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::NotAuthenticated)),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_orphaned_order_message_names_reference() {
        let order_id = OrderId::generate();
        let err = AppError::Checkout(CheckoutError::OrderItemsCreation {
            order_id,
            source: BackendError::NotFound("order_items".to_string()),
        });
        assert!(err.public_message().contains(&order_id.short_reference()));
    }
}
