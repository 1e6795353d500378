//! Authentication service.
//!
//! Email/password accounts are held by the hosted backend; this service
//! validates form input, forwards to the backend, and turns the resulting
//! session into an [`Identity`].
//!
//! Signing in does not touch the guest cart. Guest lines stay in the guest
//! slot and are not merged into the account's cart.

mod error;

pub use error::AuthError;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use atelier_core::Email;

use crate::backend::{Backend, BackendError, Identity, SignUpOutcome};
use crate::models::SessionIdentity;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Result of a registration.
#[derive(Debug)]
pub enum Registration {
    /// Account created and signed in.
    SignedIn(Identity),
    /// Account created; the email address must be confirmed first.
    ConfirmationRequired { email: Email },
}

/// Outcome of checking a session-stored identity with the backend.
#[derive(Debug)]
pub enum SessionCheck {
    /// The stored access token is still accepted.
    Valid(Identity),
    /// The access token had run out and was renewed. The session must
    /// store the new tokens: the old refresh token is spent.
    Refreshed(Identity),
    /// Signed out, revoked, or not renewable.
    Invalid,
}

/// Authentication service.
pub struct AuthService<'a> {
    backend: &'a dyn Backend,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordMismatch` if the confirmation differs.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password, password_confirm))]
    pub async fn register(
        &self,
        email: &str,
        password: &SecretString,
        password_confirm: &SecretString,
    ) -> Result<Registration, AuthError> {
        if password.expose_secret() != password_confirm.expose_secret() {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(password.expose_secret())?;
        let email = Email::parse(email)?;

        let outcome = self
            .backend
            .sign_up(&email, password)
            .await
            .map_err(|e| match e {
                BackendError::Api { message, .. }
                    if message.to_lowercase().contains("already registered") =>
                {
                    AuthError::UserAlreadyExists
                }
                other => AuthError::Backend(other),
            })?;

        Ok(match outcome {
            SignUpOutcome::SignedIn(session) => {
                info!(user_id = %session.user.id, "Account registered");
                Registration::SignedIn(Identity::from_session(session))
            }
            SignUpOutcome::ConfirmationRequired(user) => {
                info!(user_id = %user.id, "Account registered, awaiting confirmation");
                Registration::ConfirmationRequired { email: user.email }
            }
        })
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the backend rejects the
    /// email/password pair.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Identity, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let session = self
            .backend
            .sign_in(&email, password)
            .await
            .map_err(|e| match e {
                BackendError::Unauthorized(_) => AuthError::InvalidCredentials,
                other => AuthError::Backend(other),
            })?;

        info!(user_id = %session.user.id, "Signed in");
        Ok(Identity::from_session(session))
    }

    /// Resolve a session-stored identity against the backend.
    ///
    /// An access token at or near its expiry, or one the backend no longer
    /// accepts, is renewed with the refresh token before giving up. A token
    /// that now belongs to a different user is `Invalid`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Backend` if the backend cannot be reached.
    #[instrument(skip(self, stored), fields(user_id = %stored.user_id))]
    pub async fn current_identity(
        &self,
        stored: &SessionIdentity,
    ) -> Result<SessionCheck, AuthError> {
        let identity = stored.to_identity();

        if !identity.is_expired() {
            match self.backend.current_user(&identity.access_token).await? {
                Some(user) if user.id == identity.user_id => {
                    return Ok(SessionCheck::Valid(identity));
                }
                Some(_) => return Ok(SessionCheck::Invalid),
                None => {}
            }
        }

        self.refresh(identity).await
    }

    async fn refresh(&self, identity: Identity) -> Result<SessionCheck, AuthError> {
        let Some(refresh_token) = identity.refresh_token else {
            return Ok(SessionCheck::Invalid);
        };

        match self.backend.refresh_session(&refresh_token).await {
            Ok(session) if session.user.id == identity.user_id => {
                info!("Session refreshed");
                Ok(SessionCheck::Refreshed(Identity::from_session(session)))
            }
            Ok(_) | Err(BackendError::Unauthorized(_)) => Ok(SessionCheck::Invalid),
            Err(e) => Err(e.into()),
        }
    }

    /// Revoke the identity's token. Failures are logged.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn logout(&self, identity: &Identity) {
        if let Err(e) = self.backend.sign_out(&identity.access_token).await {
            warn!(error = %e, "Remote sign-out failed");
        }
    }
}

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}
