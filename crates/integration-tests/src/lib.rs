//! Integration tests for Atelier.
//!
//! Each test boots the full storefront router on an ephemeral local port,
//! backed by [`MemoryBackend`], and drives it over HTTP with a cookie-aware
//! `reqwest` client so the session behaves as in a browser.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p atelier-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

use atelier_core::{Product, ProductId};
use atelier_storefront::backend::MemoryBackend;
use atelier_storefront::config::{SentryConfig, StorefrontConfig, SupabaseConfig};
use atelier_storefront::state::AppState;

/// Password used by every test account.
pub const PASSWORD: &str = "motdepasse";

/// A running storefront.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub backend: MemoryBackend,
}

impl TestApp {
    /// Start a storefront whose catalog holds `products`.
    pub async fn spawn(products: Vec<Product>) -> Self {
        let backend = MemoryBackend::with_products(products);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = AppState::new(test_config(addr), Arc::new(backend.clone()));
        let app = atelier_storefront::app(state);
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr,
            client: new_client(),
            backend,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// A second visitor with its own cookie jar.
    #[must_use]
    pub fn other_visitor(&self) -> Client {
        new_client()
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Add `product` to the current visitor's cart.
    pub async fn add_to_cart(&self, product: &Product, personalization: &str) -> Value {
        let resp = self
            .post(
                "/api/cart/commands",
                &json!({
                    "action": "add",
                    "product_id": product.id,
                    "personalization": personalization,
                }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.unwrap()
    }

    /// Current visitor's cart view.
    pub async fn cart(&self) -> Value {
        let resp = self.get("/api/cart").await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.unwrap()
    }

    /// Register `email` and sign the current visitor in.
    pub async fn register(&self, email: &str) {
        let resp = self
            .post(
                "/api/auth/register",
                &json!({
                    "email": email,
                    "password": PASSWORD,
                    "password_confirm": PASSWORD,
                }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    /// Sign the current visitor in as `email`.
    pub async fn login(&self, email: &str) -> Response {
        self.post(
            "/api/auth/login",
            &json!({ "email": email, "password": PASSWORD }),
        )
        .await
    }

    /// Sign the current visitor out.
    pub async fn logout(&self) {
        let resp = self.post("/api/auth/logout", &json!({})).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}

fn new_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

fn test_config(addr: SocketAddr) -> StorefrontConfig {
    StorefrontConfig {
        host: addr.ip(),
        port: addr.port(),
        base_url: format!("http://{addr}"),
        trust_proxy: false,
        supabase: SupabaseConfig {
            url: Url::parse("http://127.0.0.1:54321").unwrap(),
            anon_key: SecretString::from("unused-by-memory-backend"),
            product_cache_ttl: Duration::from_secs(300),
        },
        sentry: SentryConfig::default(),
    }
}

/// A catalog product priced at `cents / 100`.
#[must_use]
pub fn product(name: &str, description: &str, cents: i64) -> Product {
    Product {
        id: ProductId::generate(),
        name: name.to_string(),
        description: description.to_string(),
        price: Decimal::new(cents, 2),
        image_url: format!("/images/{}.jpg", name.to_lowercase().replace(' ', "-")),
        created_at: None,
    }
}

/// Checkout body with complete shipping details and a valid-format card.
#[must_use]
pub fn card_checkout() -> Value {
    json!({
        "shipping": {
            "fullName": "Camille Martin",
            "email": "camille@example.fr",
            "phone": "0601020304",
            "address": "12 rue des Lilas",
            "city": "Lyon",
            "zipCode": "69003",
            "country": "France"
        },
        "payment_method": "card",
        "card": {
            "number": "4111 1111 1111 1111",
            "expiry": "12/29",
            "cvv": "123"
        }
    })
}

/// Cart line ids from a cart view.
#[must_use]
pub fn item_ids(cart: &Value) -> Vec<String> {
    cart["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i["id"].as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}
