//! In-process backend.
//!
//! Mirrors the hosted backend's table semantics closely enough for the
//! storefront services: products are read-only and ordered by insertion,
//! cart rows are scoped to their owner, orders get generated ids, and
//! tokens are opaque strings mapped to users. Access tokens live for an hour
//! and single-use refresh tokens renew them. Fail points let tests make a
//! single operation fail.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use uuid::Uuid;

use atelier_core::{
    CartItem, CartItemId, Email, NewCartItem, NewOrder, NewOrderItem, Order, OrderId, OrderItem,
    OrderItemId, Product, UserId,
};

use super::{AuthSession, AuthUser, Backend, BackendError, Identity, SignUpOutcome};

/// Operation that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ListProducts,
    ListCartItems,
    InsertCartItem,
    DeleteCartItem,
    ClearCartItems,
    InsertOrder,
    InsertOrderItems,
    SignUp,
    SignIn,
    RefreshSession,
}

const ACCESS_TOKEN_LIFETIME: TimeDelta = TimeDelta::hours(1);

/// Backend kept entirely in memory.
///
/// Cheaply cloneable; clones share state.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    products: Vec<Product>,
    cart_items: Vec<StoredCartItem>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    users: HashMap<String, StoredUser>,
    tokens: HashMap<String, AccessToken>,
    /// Refresh token to the access token it was issued with.
    refresh_tokens: HashMap<String, String>,
    fail_points: HashSet<FailPoint>,
}

struct AccessToken {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

struct StoredCartItem {
    id: CartItemId,
    user_id: UserId,
    row: NewCartItem,
}

struct StoredUser {
    user: AuthUser,
    password: String,
}

impl MemoryBackend {
    /// Create a backend whose catalog holds `products`.
    #[must_use]
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                products,
                ..MemoryState::default()
            })),
        }
    }

    /// Make `point` fail until [`MemoryBackend::clear_failure`] is called.
    pub async fn fail(&self, point: FailPoint) {
        self.state.lock().await.fail_points.insert(point);
    }

    /// Stop failing `point`.
    pub async fn clear_failure(&self, point: FailPoint) {
        self.state.lock().await.fail_points.remove(&point);
    }

    /// Register an account directly, returning its user record.
    pub async fn add_user(&self, email: &Email, password: &str) -> AuthUser {
        let user = AuthUser {
            id: UserId::generate(),
            email: email.clone(),
        };
        self.state.lock().await.users.insert(
            email.as_str().to_lowercase(),
            StoredUser {
                user: user.clone(),
                password: password.to_owned(),
            },
        );
        user
    }

    /// Invalidate every access and refresh token issued to `user_id`.
    pub async fn revoke_tokens(&self, user_id: UserId) {
        let mut state = self.state.lock().await;
        state.tokens.retain(|_, token| token.user_id != user_id);
        let MemoryState {
            tokens,
            refresh_tokens,
            ..
        } = &mut *state;
        refresh_tokens.retain(|_, access| tokens.contains_key(access));
    }

    /// Let every access token issued to `user_id` run out. Refresh tokens
    /// stay usable.
    pub async fn expire_access_tokens(&self, user_id: UserId) {
        let expired = Utc::now() - TimeDelta::seconds(1);
        for token in self.state.lock().await.tokens.values_mut() {
            if token.user_id == user_id {
                token.expires_at = expired;
            }
        }
    }

    /// Snapshot of every stored order.
    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }

    /// Snapshot of every stored order line.
    pub async fn order_items(&self) -> Vec<OrderItem> {
        self.state.lock().await.order_items.clone()
    }

    /// Number of cart rows owned by `user_id`.
    pub async fn cart_row_count(&self, user_id: UserId) -> usize {
        self.state
            .lock()
            .await
            .cart_items
            .iter()
            .filter(|row| row.user_id == user_id)
            .count()
    }
}

impl MemoryState {
    fn check(&self, point: FailPoint) -> Result<(), BackendError> {
        if self.fail_points.contains(&point) {
            return Err(BackendError::Api {
                status: 503,
                message: format!("injected failure: {point:?}"),
            });
        }
        Ok(())
    }

    /// Owner of `access_token` while it is live.
    fn token_owner(&self, access_token: &str) -> Option<UserId> {
        self.tokens
            .get(access_token)
            .filter(|token| token.expires_at > Utc::now())
            .map(|token| token.user_id)
    }

    fn authorize(&self, identity: &Identity) -> Result<UserId, BackendError> {
        match self.token_owner(identity.access_token.expose_secret()) {
            Some(user_id) if user_id == identity.user_id => Ok(user_id),
            _ => Err(BackendError::Unauthorized("invalid JWT".to_string())),
        }
    }

    fn issue_session(&mut self, user: AuthUser) -> AuthSession {
        let access = Uuid::new_v4().simple().to_string();
        let refresh = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + ACCESS_TOKEN_LIFETIME;
        self.tokens.insert(
            access.clone(),
            AccessToken {
                user_id: user.id,
                expires_at,
            },
        );
        self.refresh_tokens.insert(refresh.clone(), access.clone());
        AuthSession {
            access_token: SecretString::from(access),
            refresh_token: Some(SecretString::from(refresh)),
            expires_at: Some(expires_at),
            user,
        }
    }

    fn user(&self, user_id: UserId) -> Option<AuthUser> {
        self.users
            .values()
            .find(|stored| stored.user.id == user_id)
            .map(|stored| stored.user.clone())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        let state = self.state.lock().await;
        state.check(FailPoint::ListProducts)?;
        Ok(state.products.clone())
    }

    async fn list_cart_items(&self, identity: &Identity) -> Result<Vec<CartItem>, BackendError> {
        let state = self.state.lock().await;
        state.check(FailPoint::ListCartItems)?;
        let user_id = state.authorize(identity)?;

        Ok(state
            .cart_items
            .iter()
            .filter(|stored| stored.user_id == user_id)
            .filter_map(|stored| {
                let product = state
                    .products
                    .iter()
                    .find(|p| p.id == stored.row.product_id)?;
                Some(CartItem {
                    id: stored.id,
                    user_id: Some(stored.user_id),
                    product_id: stored.row.product_id,
                    product: product.clone(),
                    quantity: stored.row.quantity,
                    personalization: stored.row.personalization.clone(),
                })
            })
            .collect())
    }

    async fn insert_cart_item(
        &self,
        identity: &Identity,
        item: &NewCartItem,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::InsertCartItem)?;
        let user_id = state.authorize(identity)?;
        if item.user_id != user_id {
            return Err(BackendError::Unauthorized(
                "new row violates row-level security policy".to_string(),
            ));
        }
        if !state.products.iter().any(|p| p.id == item.product_id) {
            return Err(BackendError::Api {
                status: 409,
                message: "insert violates foreign key constraint".to_string(),
            });
        }

        state.cart_items.push(StoredCartItem {
            id: CartItemId::generate(),
            user_id,
            row: item.clone(),
        });
        Ok(())
    }

    async fn delete_cart_item(
        &self,
        identity: &Identity,
        id: CartItemId,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::DeleteCartItem)?;
        let user_id = state.authorize(identity)?;
        state
            .cart_items
            .retain(|stored| !(stored.id == id && stored.user_id == user_id));
        Ok(())
    }

    async fn clear_cart_items(&self, identity: &Identity) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::ClearCartItems)?;
        let user_id = state.authorize(identity)?;
        state.cart_items.retain(|stored| stored.user_id != user_id);
        Ok(())
    }

    async fn insert_order(
        &self,
        identity: &Identity,
        order: &NewOrder,
    ) -> Result<Order, BackendError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::InsertOrder)?;
        let user_id = state.authorize(identity)?;
        if order.user_id != user_id {
            return Err(BackendError::Unauthorized(
                "new row violates row-level security policy".to_string(),
            ));
        }

        let created = Order {
            id: OrderId::generate(),
            user_id,
            total_amount: order.total_amount,
            status: order.status,
            payment_method: order.payment_method,
            shipping_address: order.shipping_address.clone(),
            created_at: Some(chrono::Utc::now()),
        };
        state.orders.push(created.clone());
        Ok(created)
    }

    async fn insert_order_items(
        &self,
        identity: &Identity,
        items: &[NewOrderItem],
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::InsertOrderItems)?;
        state.authorize(identity)?;

        let rows: Vec<OrderItem> = items
            .iter()
            .map(|item| OrderItem {
                id: OrderItemId::generate(),
                order_id: item.order_id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
                personalization: item.personalization.clone(),
            })
            .collect();
        state.order_items.extend(rows);
        Ok(())
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, BackendError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::SignUp)?;
        let key = email.as_str().to_lowercase();
        if state.users.contains_key(&key) {
            return Err(BackendError::Api {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let user = AuthUser {
            id: UserId::generate(),
            email: email.clone(),
        };
        state.users.insert(
            key,
            StoredUser {
                user: user.clone(),
                password: password.expose_secret().to_owned(),
            },
        );
        Ok(SignUpOutcome::SignedIn(state.issue_session(user)))
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::SignIn)?;
        let user = match state.users.get(&email.as_str().to_lowercase()) {
            Some(stored) if stored.password == password.expose_secret() => stored.user.clone(),
            _ => {
                return Err(BackendError::Unauthorized(
                    "Invalid login credentials".to_string(),
                ));
            }
        };
        Ok(state.issue_session(user))
    }

    async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::RefreshSession)?;
        let issued_with = state.refresh_tokens.remove(refresh_token.expose_secret());
        let previous = issued_with.and_then(|access| state.tokens.remove(&access));
        let user = previous
            .and_then(|token| state.user(token.user_id))
            .ok_or_else(|| BackendError::Unauthorized("Invalid Refresh Token".to_string()))?;
        Ok(state.issue_session(user))
    }

    async fn current_user(
        &self,
        access_token: &SecretString,
    ) -> Result<Option<AuthUser>, BackendError> {
        let state = self.state.lock().await;
        Ok(state
            .token_owner(access_token.expose_secret())
            .and_then(|user_id| state.user(user_id)))
    }

    async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        let access = access_token.expose_secret();
        state.tokens.remove(access);
        state
            .refresh_tokens
            .retain(|_, issued_with| issued_with.as_str() != access);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use atelier_core::ProductId;

    fn product() -> Product {
        Product {
            id: ProductId::generate(),
            name: "Mug".to_string(),
            description: String::new(),
            price: Decimal::new(1200, 2),
            image_url: String::new(),
            created_at: None,
        }
    }

    async fn signed_in(backend: &MemoryBackend) -> Identity {
        let email = Email::parse("lea@example.fr").unwrap();
        backend.add_user(&email, "motdepasse").await;
        let session = backend
            .sign_in(&email, &SecretString::from("motdepasse"))
            .await
            .unwrap();
        Identity::from_session(session)
    }

    #[tokio::test]
    async fn test_cart_rows_are_scoped_to_owner() {
        let p = product();
        let backend = MemoryBackend::with_products(vec![p.clone()]);
        let identity = signed_in(&backend).await;

        backend
            .insert_cart_item(&identity, &NewCartItem::for_product(identity.user_id, &p, ""))
            .await
            .unwrap();

        let other_email = Email::parse("hugo@example.fr").unwrap();
        backend.add_user(&other_email, "secret123").await;
        let other = Identity::from_session(
            backend
                .sign_in(&other_email, &SecretString::from("secret123"))
                .await
                .unwrap(),
        );

        assert_eq!(backend.list_cart_items(&identity).await.unwrap().len(), 1);
        assert!(backend.list_cart_items(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_point_applies_until_cleared() {
        let backend = MemoryBackend::with_products(vec![product()]);
        backend.fail(FailPoint::ListProducts).await;
        assert!(backend.list_products().await.is_err());

        backend.clear_failure(FailPoint::ListProducts).await;
        assert_eq!(backend.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() {
        let backend = MemoryBackend::default();
        let identity = signed_in(&backend).await;
        assert!(
            backend
                .current_user(&identity.access_token)
                .await
                .unwrap()
                .is_some()
        );

        backend.sign_out(&identity.access_token).await.unwrap();
        assert!(
            backend
                .current_user(&identity.access_token)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_renewed_once_by_refresh() {
        let backend = MemoryBackend::default();
        let identity = signed_in(&backend).await;
        let refresh_token = identity.refresh_token.clone().unwrap();

        backend.expire_access_tokens(identity.user_id).await;
        assert!(
            backend
                .current_user(&identity.access_token)
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            backend.list_cart_items(&identity).await,
            Err(BackendError::Unauthorized(_))
        ));

        let renewed =
            Identity::from_session(backend.refresh_session(&refresh_token).await.unwrap());
        assert_eq!(renewed.user_id, identity.user_id);
        assert!(!renewed.is_expired());
        assert!(backend.list_cart_items(&renewed).await.unwrap().is_empty());

        // Refresh tokens are single use
        assert!(matches!(
            backend.refresh_session(&refresh_token).await,
            Err(BackendError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_out_and_revoke_spend_refresh_tokens() {
        let backend = MemoryBackend::default();

        let identity = signed_in(&backend).await;
        backend.sign_out(&identity.access_token).await.unwrap();
        assert!(
            backend
                .refresh_session(identity.refresh_token.as_ref().unwrap())
                .await
                .is_err()
        );

        let identity = Identity::from_session(
            backend
                .sign_in(&identity.email, &SecretString::from("motdepasse"))
                .await
                .unwrap(),
        );
        backend.revoke_tokens(identity.user_id).await;
        assert!(
            backend
                .refresh_session(identity.refresh_token.as_ref().unwrap())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let backend = MemoryBackend::default();
        let email = Email::parse("lea@example.fr").unwrap();
        backend.add_user(&email, "motdepasse").await;

        let result = backend.sign_in(&email, &SecretString::from("nope")).await;
        assert!(matches!(result, Err(BackendError::Unauthorized(_))));
    }
}
