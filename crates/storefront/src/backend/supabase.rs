//! Supabase client implementation.
//!
//! Talks to PostgREST for table access and GoTrue for authentication using
//! `reqwest`. Caches the product list using `moka`.
//!
//! Each operation is split into a request builder and the send. The builders
//! carry the whole wire contract (paths, PostgREST filters, headers, bodies)
//! and can be inspected without a network.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use atelier_core::{
    CartItem, CartItemId, Email, NewCartItem, NewOrder, NewOrderItem, Order, Product,
};

use super::types::{CartItemRow, ErrorBody, TokenResponse};
use super::{AuthSession, AuthUser, Backend, BackendError, Identity, SignUpOutcome};
use crate::config::SupabaseConfig;

const PRODUCTS_CACHE_KEY: &str = "products";

/// Client for a Supabase project.
///
/// Cheaply cloneable; the HTTP connection pool and cache are shared.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    client: reqwest::Client,
    rest_url: Url,
    auth_url: Url,
    anon_key: String,
    products: Cache<&'static str, Arc<Vec<Product>>>,
}

/// Credentials body for sign-up and password sign-in.
#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Body for the refresh-token grant.
#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

impl SupabaseClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the project URL cannot be extended with the API
    /// paths.
    pub fn new(config: &SupabaseConfig) -> Result<Self, BackendError> {
        let products = Cache::builder()
            .max_capacity(1)
            .time_to_live(config.product_cache_ttl)
            .build();

        let base = with_trailing_slash(&config.url);

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                client: reqwest::Client::new(),
                rest_url: base.join("rest/v1/")?,
                auth_url: base.join("auth/v1/")?,
                anon_key: config.anon_key().to_string(),
                products,
            }),
        })
    }

    /// Build a PostgREST request against `table` with filter/query pairs.
    ///
    /// Requests run as `identity` when given, otherwise as the anon role.
    fn rest(
        &self,
        method: Method,
        table: &str,
        query: &[(&str, &str)],
        identity: Option<&Identity>,
    ) -> Result<RequestBuilder, BackendError> {
        let mut url = self.inner.rest_url.join(table)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let bearer = identity.map_or(self.inner.anon_key.as_str(), |id| {
            id.access_token.expose_secret()
        });
        Ok(self
            .inner
            .client
            .request(method, url)
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(bearer))
    }

    /// Build a GoTrue request against `path`.
    fn auth(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<RequestBuilder, BackendError> {
        let mut url = self.inner.auth_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(self
            .inner
            .client
            .request(method, url)
            .header("apikey", &self.inner.anon_key))
    }

    fn products_request(&self) -> Result<RequestBuilder, BackendError> {
        self.rest(
            Method::GET,
            "products",
            &[("select", "*"), ("order", "created_at.asc")],
            None,
        )
    }

    fn cart_items_request(&self, identity: &Identity) -> Result<RequestBuilder, BackendError> {
        let user_filter = format!("eq.{}", identity.user_id);
        self.rest(
            Method::GET,
            "cart_items",
            &[
                ("select", "*,product:products(*)"),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.asc"),
            ],
            Some(identity),
        )
    }

    fn insert_cart_item_request(
        &self,
        identity: &Identity,
        item: &NewCartItem,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .rest(Method::POST, "cart_items", &[], Some(identity))?
            .header("Prefer", "return=minimal")
            .json(item))
    }

    fn delete_cart_item_request(
        &self,
        identity: &Identity,
        id: CartItemId,
    ) -> Result<RequestBuilder, BackendError> {
        let id_filter = format!("eq.{id}");
        self.rest(
            Method::DELETE,
            "cart_items",
            &[("id", id_filter.as_str())],
            Some(identity),
        )
    }

    fn clear_cart_items_request(
        &self,
        identity: &Identity,
    ) -> Result<RequestBuilder, BackendError> {
        let user_filter = format!("eq.{}", identity.user_id);
        self.rest(
            Method::DELETE,
            "cart_items",
            &[("user_id", user_filter.as_str())],
            Some(identity),
        )
    }

    fn insert_order_request(
        &self,
        identity: &Identity,
        order: &NewOrder,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .rest(Method::POST, "orders", &[], Some(identity))?
            .header("Prefer", "return=representation")
            .json(order))
    }

    fn insert_order_items_request(
        &self,
        identity: &Identity,
        items: &[NewOrderItem],
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .rest(Method::POST, "order_items", &[], Some(identity))?
            .header("Prefer", "return=minimal")
            .json(items))
    }

    fn sign_up_request(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self.auth(Method::POST, "signup", &[])?.json(&Credentials {
            email: email.as_str(),
            password: password.expose_secret(),
        }))
    }

    fn password_grant_request(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .auth(Method::POST, "token", &[("grant_type", "password")])?
            .json(&Credentials {
                email: email.as_str(),
                password: password.expose_secret(),
            }))
    }

    fn refresh_grant_request(
        &self,
        refresh_token: &SecretString,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .auth(Method::POST, "token", &[("grant_type", "refresh_token")])?
            .json(&RefreshGrant {
                refresh_token: refresh_token.expose_secret(),
            }))
    }

    fn user_request(&self, access_token: &SecretString) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .auth(Method::GET, "user", &[])?
            .bearer_auth(access_token.expose_secret()))
    }

    fn logout_request(&self, access_token: &SecretString) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .auth(Method::POST, "logout", &[])?
            .bearer_auth(access_token.expose_secret()))
    }

    /// Send a request and parse a JSON body.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let text = self.send(request).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    /// Send a request, mapping non-success statuses to errors, and return
    /// the raw body.
    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.text().await?);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;
        let err = status_error(status, retry_after.as_deref(), &body);

        tracing::warn!(status = %status, error = %err, "Backend returned non-success status");
        Err(err)
    }

    /// Run a GoTrue token grant and take the session it issues.
    async fn grant(&self, request: RequestBuilder) -> Result<AuthSession, BackendError> {
        let response: TokenResponse = self.fetch(request).await.map_err(rejected_grant)?;
        response
            .into_session()
            .ok_or_else(|| BackendError::Unauthorized("no session issued".to_string()))
    }
}

#[async_trait]
impl Backend for SupabaseClient {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        if let Some(products) = self.inner.products.get(PRODUCTS_CACHE_KEY).await {
            debug!("Cache hit for products");
            return Ok(products.as_ref().clone());
        }

        let products: Vec<Product> = self.fetch(self.products_request()?).await?;

        self.inner
            .products
            .insert(PRODUCTS_CACHE_KEY, Arc::new(products.clone()))
            .await;

        Ok(products)
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn list_cart_items(&self, identity: &Identity) -> Result<Vec<CartItem>, BackendError> {
        let rows: Vec<CartItemRow> = self.fetch(self.cart_items_request(identity)?).await?;
        Ok(rows.into_iter().map(CartItem::from).collect())
    }

    #[instrument(skip(self, identity, item), fields(user_id = %identity.user_id, product_id = %item.product_id))]
    async fn insert_cart_item(
        &self,
        identity: &Identity,
        item: &NewCartItem,
    ) -> Result<(), BackendError> {
        self.send(self.insert_cart_item_request(identity, item)?).await?;
        Ok(())
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn delete_cart_item(
        &self,
        identity: &Identity,
        id: CartItemId,
    ) -> Result<(), BackendError> {
        self.send(self.delete_cart_item_request(identity, id)?).await?;
        Ok(())
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn clear_cart_items(&self, identity: &Identity) -> Result<(), BackendError> {
        self.send(self.clear_cart_items_request(identity)?).await?;
        Ok(())
    }

    #[instrument(skip(self, identity, order), fields(user_id = %identity.user_id))]
    async fn insert_order(
        &self,
        identity: &Identity,
        order: &NewOrder,
    ) -> Result<Order, BackendError> {
        let rows: Vec<Order> = self.fetch(self.insert_order_request(identity, order)?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound("created order row".to_string()))
    }

    #[instrument(skip(self, identity, items), fields(user_id = %identity.user_id, count = items.len()))]
    async fn insert_order_items(
        &self,
        identity: &Identity,
        items: &[NewOrderItem],
    ) -> Result<(), BackendError> {
        self.send(self.insert_order_items_request(identity, items)?).await?;
        Ok(())
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, BackendError> {
        let response: TokenResponse = self.fetch(self.sign_up_request(email, password)?).await?;
        response.into_outcome().ok_or_else(|| BackendError::Api {
            status: 200,
            message: "sign-up response carried no user".to_string(),
        })
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        self.grant(self.password_grant_request(email, password)?).await
    }

    #[instrument(skip_all)]
    async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        self.grant(self.refresh_grant_request(refresh_token)?).await
    }

    #[instrument(skip_all)]
    async fn current_user(
        &self,
        access_token: &SecretString,
    ) -> Result<Option<AuthUser>, BackendError> {
        match self.fetch::<AuthUser>(self.user_request(access_token)?).await {
            Ok(user) => Ok(Some(user)),
            Err(BackendError::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError> {
        self.send(self.logout_request(access_token)?).await?;
        Ok(())
    }
}

/// Map a non-success response to an error.
///
/// 429 carries `Retry-After` seconds (1 when absent or unparsable); the
/// message comes from PostgREST's or GoTrue's error body when it has one.
fn status_error(status: StatusCode, retry_after: Option<&str>, body: &str) -> BackendError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let seconds = retry_after
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(1);
        return BackendError::RateLimited(seconds);
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .unwrap_or_default()
        .message_or(body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// GoTrue answers bad credentials and spent refresh tokens with
/// 400 `invalid_grant`.
fn rejected_grant(err: BackendError) -> BackendError {
    match err {
        BackendError::Api {
            status: 400,
            message,
        } => BackendError::Unauthorized(message),
        other => other,
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;
    use serde_json::Value;

    use atelier_core::{OrderStatus, PaymentMethod, ProductId, ShippingAddress};

    use super::*;

    fn config(url: &str) -> SupabaseConfig {
        SupabaseConfig {
            url: Url::parse(url).unwrap(),
            anon_key: SecretString::from("anon-key"),
            product_cache_ttl: Duration::from_secs(300),
        }
    }

    fn client() -> SupabaseClient {
        SupabaseClient::new(&config("https://abcd.supabase.co")).unwrap()
    }

    fn identity() -> Identity {
        Identity {
            user_id: "5d0c8b7e-1f0e-4c55-9a0e-6a9e2f1d3c4b".parse().unwrap(),
            email: Email::parse("lea@example.fr").unwrap(),
            access_token: SecretString::from("user-jwt"),
            refresh_token: None,
            expires_at: None,
        }
    }

    fn query(request: &reqwest::Request) -> Vec<(String, String)> {
        request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn header<'a>(request: &'a reqwest::Request, name: &str) -> &'a str {
        request.headers()[name].to_str().unwrap()
    }

    fn body(request: &reqwest::Request) -> Value {
        let bytes = request.body().and_then(reqwest::Body::as_bytes).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_endpoints_are_joined_under_project_url() {
        let client = client();
        assert_eq!(
            client.inner.rest_url.join("cart_items").unwrap().as_str(),
            "https://abcd.supabase.co/rest/v1/cart_items"
        );
        assert_eq!(
            client.inner.auth_url.join("token").unwrap().as_str(),
            "https://abcd.supabase.co/auth/v1/token"
        );
    }

    #[test]
    fn test_endpoints_keep_path_prefix() {
        let client = SupabaseClient::new(&config("http://localhost:54321/project")).unwrap();
        assert_eq!(
            client.inner.rest_url.as_str(),
            "http://localhost:54321/project/rest/v1/"
        );
    }

    #[test]
    fn test_products_are_read_oldest_first_as_anon() {
        let request = client().products_request().unwrap().build().unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.url().path(), "/rest/v1/products");
        assert_eq!(
            query(&request),
            vec![pair("select", "*"), pair("order", "created_at.asc")]
        );
        assert_eq!(header(&request, "apikey"), "anon-key");
        assert_eq!(header(&request, "authorization"), "Bearer anon-key");
    }

    #[test]
    fn test_cart_items_join_product_and_filter_by_owner() {
        let identity = identity();
        let request = client()
            .cart_items_request(&identity)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.url().path(), "/rest/v1/cart_items");
        assert_eq!(
            query(&request),
            vec![
                pair("select", "*,product:products(*)"),
                pair("user_id", &format!("eq.{}", identity.user_id)),
                pair("order", "created_at.asc"),
            ]
        );
        assert_eq!(header(&request, "apikey"), "anon-key");
        assert_eq!(header(&request, "authorization"), "Bearer user-jwt");
    }

    #[test]
    fn test_cart_deletes_filter_by_row_or_owner() {
        let client = client();
        let identity = identity();
        let id = CartItemId::generate();

        let one = client
            .delete_cart_item_request(&identity, id)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(one.method(), Method::DELETE);
        assert_eq!(query(&one), vec![pair("id", &format!("eq.{id}"))]);

        let all = client
            .clear_cart_items_request(&identity)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(all.method(), Method::DELETE);
        assert_eq!(
            query(&all),
            vec![pair("user_id", &format!("eq.{}", identity.user_id))]
        );
    }

    #[test]
    fn test_cart_insert_sends_row_without_representation() {
        let identity = identity();
        let product = Product {
            id: ProductId::generate(),
            name: "Mug".to_string(),
            description: String::new(),
            price: Decimal::new(1200, 2),
            image_url: String::new(),
            created_at: None,
        };
        let item = NewCartItem::for_product(identity.user_id, &product, "Léa");
        let request = client()
            .insert_cart_item_request(&identity, &item)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(header(&request, "prefer"), "return=minimal");
        let sent = body(&request);
        assert_eq!(sent["product_id"], product.id.to_string());
        assert_eq!(sent["personalization"], "Léa");
    }

    #[test]
    fn test_order_insert_asks_for_created_row() {
        let identity = identity();
        let order = NewOrder {
            user_id: identity.user_id,
            total_amount: Decimal::new(2500, 2),
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::Card,
            shipping_address: ShippingAddress::default(),
        };
        let request = client()
            .insert_order_request(&identity, &order)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.url().path(), "/rest/v1/orders");
        assert_eq!(header(&request, "prefer"), "return=representation");
        assert_eq!(header(&request, "authorization"), "Bearer user-jwt");
        assert_eq!(body(&request)["user_id"], identity.user_id.to_string());

        let items = client()
            .insert_order_items_request(&identity, &[])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(items.url().path(), "/rest/v1/order_items");
        assert_eq!(header(&items, "prefer"), "return=minimal");
        assert_eq!(body(&items), Value::Array(Vec::new()));
    }

    #[test]
    fn test_token_grants() {
        let client = client();
        let email = Email::parse("lea@example.fr").unwrap();

        let password = client
            .password_grant_request(&email, &SecretString::from("motdepasse"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(password.url().path(), "/auth/v1/token");
        assert_eq!(query(&password), vec![pair("grant_type", "password")]);
        assert_eq!(body(&password)["email"], "lea@example.fr");
        assert!(password.headers().get("authorization").is_none());

        let refresh = client
            .refresh_grant_request(&SecretString::from("refresh-me"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(query(&refresh), vec![pair("grant_type", "refresh_token")]);
        assert_eq!(body(&refresh)["refresh_token"], "refresh-me");
        assert_eq!(header(&refresh, "apikey"), "anon-key");
    }

    #[test]
    fn test_user_and_logout_run_as_token_holder() {
        let client = client();
        let token = SecretString::from("user-jwt");

        let user = client.user_request(&token).unwrap().build().unwrap();
        assert_eq!(user.url().path(), "/auth/v1/user");
        assert_eq!(header(&user, "authorization"), "Bearer user-jwt");

        let logout = client.logout_request(&token).unwrap().build().unwrap();
        assert_eq!(logout.method(), Method::POST);
        assert_eq!(logout.url().path(), "/auth/v1/logout");
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some("30"), ""),
            BackendError::RateLimited(30)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some("soon"), ""),
            BackendError::RateLimited(1)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, None, ""),
            BackendError::RateLimited(1)
        ));
    }

    #[test]
    fn test_rejected_token_is_unauthorized() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = status_error(status, None, r#"{"msg":"invalid JWT"}"#);
            assert!(
                matches!(&err, BackendError::Unauthorized(m) if m == "invalid JWT"),
                "{status}: {err}"
            );
        }
    }

    #[test]
    fn test_other_statuses_keep_code_and_message() {
        let err = status_error(
            StatusCode::CONFLICT,
            None,
            r#"{"code":"23503","message":"violates foreign key constraint"}"#,
        );
        assert!(matches!(
            err,
            BackendError::Api { status: 409, ref message }
                if message == "violates foreign key constraint"
        ));

        let err = status_error(StatusCode::BAD_GATEWAY, None, "upstream down");
        assert!(matches!(
            err,
            BackendError::Api { status: 502, ref message } if message == "upstream down"
        ));

        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, None, "{}"),
            BackendError::NotFound(_)
        ));
    }

    #[test]
    fn test_invalid_grant_is_unauthorized() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            None,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert!(matches!(
            rejected_grant(err),
            BackendError::Unauthorized(ref m) if m == "Invalid login credentials"
        ));

        let err = status_error(StatusCode::UNPROCESSABLE_ENTITY, None, "{}");
        assert!(matches!(
            rejected_grant(err),
            BackendError::Api { status: 422, .. }
        ));
    }
}
