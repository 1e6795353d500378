//! Session-related types.
//!
//! Types stored in the session for authentication and guest cart state.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use atelier_core::{Email, UserId};

use crate::backend::Identity;

/// Session-stored identity.
///
/// Holds the backend tokens in plain form because the session store
/// serializes them; they are wrapped back into secrets on the way out.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: UserId,
    pub email: Email,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl SessionIdentity {
    /// Access token as a secret.
    #[must_use]
    pub fn access_token(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }

    /// Identity for backend calls.
    #[must_use]
    pub fn to_identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            email: self.email.clone(),
            access_token: self.access_token(),
            refresh_token: self.refresh_token.clone().map(SecretString::from),
            expires_at: self.expires_at,
        }
    }
}

impl From<&Identity> for SessionIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id,
            email: identity.email.clone(),
            access_token: identity.access_token.expose_secret().to_owned(),
            refresh_token: identity
                .refresh_token
                .as_ref()
                .map(|token| token.expose_secret().to_owned()),
            expires_at: identity.expires_at,
        }
    }
}

impl std::fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Session keys.
pub mod keys {
    /// Key for the signed-in identity.
    pub const CURRENT_IDENTITY: &str = "current_identity";

    /// Key for the guest cart slot (JSON list of cart items).
    pub const GUEST_CART: &str = "guest_cart";
}
