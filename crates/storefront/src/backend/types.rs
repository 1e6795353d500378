//! Wire types for the hosted backend.
//!
//! Row shapes returned by PostgREST and session payloads returned by the
//! auth API, plus their conversions into core types.

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use serde::Deserialize;

use atelier_core::{CartItem, CartItemId, Email, Product, ProductId, UserId};

/// Access tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN: TimeDelta = TimeDelta::seconds(60);

/// A signed-in user as seen by the storefront.
///
/// Carries the access token so row-scoped requests run as this user, and
/// the refresh token that renews it.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Email,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// When the access token stops being accepted, if the backend said.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Build an identity from an auth session.
    #[must_use]
    pub fn from_session(session: AuthSession) -> Self {
        Self {
            user_id: session.user.id,
            email: session.user.email,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
        }
    }

    /// Whether the access token is expired or within a minute of it.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Utc::now() >= expires_at - EXPIRY_MARGIN)
    }
}

/// User record returned by the auth API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Email,
}

/// Session returned by sign-in, refresh, and sign-up when auto-confirm is on.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

/// Result of a sign-up request.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// Account created and signed in.
    SignedIn(AuthSession),
    /// Account created; the user must confirm their email before signing in.
    ConfirmationRequired(AuthUser),
}

/// Token response from `/auth/v1/token` (password and refresh grants) and
/// `/auth/v1/signup`.
///
/// Sign-up without auto-confirm returns the bare user object instead, so
/// every field is optional and [`TokenResponse::into_outcome`] sorts it out.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix timestamp; preferred over `expires_in` when present.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<AuthUser>,
    // Bare-user shape
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub email: Option<Email>,
}

impl TokenResponse {
    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .and_then(TimeDelta::try_seconds)
                    .map(|lifetime| Utc::now() + lifetime)
            })
    }

    pub(crate) fn into_outcome(self) -> Option<SignUpOutcome> {
        let expires_at = self.expiry();
        match (self.access_token, self.user) {
            (Some(token), Some(user)) => Some(SignUpOutcome::SignedIn(AuthSession {
                access_token: SecretString::from(token),
                refresh_token: self.refresh_token.map(SecretString::from),
                expires_at,
                user,
            })),
            (None, Some(user)) => Some(SignUpOutcome::ConfirmationRequired(user)),
            (_, None) => match (self.id, self.email) {
                (Some(id), Some(email)) => {
                    Some(SignUpOutcome::ConfirmationRequired(AuthUser { id, email }))
                }
                _ => None,
            },
        }
    }

    pub(crate) fn into_session(self) -> Option<AuthSession> {
        match self.into_outcome()? {
            SignUpOutcome::SignedIn(session) => Some(session),
            SignUpOutcome::ConfirmationRequired(_) => None,
        }
    }
}

/// A `cart_items` row selected with `product:products(*)`.
#[derive(Debug, Deserialize)]
pub(crate) struct CartItemRow {
    pub id: CartItemId,
    pub user_id: Option<UserId>,
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub personalization: Option<String>,
    pub product: Product,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            product: row.product,
            quantity: row.quantity,
            personalization: row.personalization.unwrap_or_default(),
        }
    }
}

/// Error body shapes used by PostgREST (`message`) and GoTrue
/// (`msg`, `error_description`).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message, falling back to the truncated raw body.
    pub(crate) fn message_or(self, raw: &str) -> String {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .unwrap_or_else(|| raw.chars().take(200).collect())
    }
}
