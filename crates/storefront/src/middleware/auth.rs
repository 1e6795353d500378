//! Identity extractors.
//!
//! The session stores a [`SessionIdentity`]; the extractors re-check its
//! token with the backend. An expired access token is renewed and the new
//! tokens written back. A revoked session is treated as a guest and its
//! identity removed from the session.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use tracing::warn;

use crate::backend::Identity;
use crate::error::AppError;
use crate::models::{SessionIdentity, session_keys};
use crate::services::{AuthService, SessionCheck};
use crate::state::AppState;

/// Extractor that requires a signed-in identity.
///
/// Rejects with `401 Unauthorized` when there is none.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireIdentity(identity): RequireIdentity) -> String {
///     format!("Hello, {}!", identity.email)
/// }
/// ```
pub struct RequireIdentity(pub Identity);

impl FromRequestParts<AppState> for RequireIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("sign in to continue".to_string()))
    }
}

/// Extractor that optionally gets the signed-in identity.
pub struct OptionalIdentity(pub Option<Identity>);

impl FromRequestParts<AppState> for OptionalIdentity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve(parts, state).await))
    }
}

async fn resolve(parts: &Parts, state: &AppState) -> Option<Identity> {
    let session = parts.extensions.get::<Session>()?;
    let stored: SessionIdentity = session
        .get(session_keys::CURRENT_IDENTITY)
        .await
        .ok()
        .flatten()?;

    match AuthService::new(state.backend()).current_identity(&stored).await {
        Ok(SessionCheck::Valid(identity)) => Some(identity),
        Ok(SessionCheck::Refreshed(identity)) => {
            if let Err(e) = session
                .insert(
                    session_keys::CURRENT_IDENTITY,
                    SessionIdentity::from(&identity),
                )
                .await
            {
                warn!(error = %e, user_id = %identity.user_id, "Failed to store refreshed tokens");
            }
            Some(identity)
        }
        Ok(SessionCheck::Invalid) => {
            if let Err(e) = clear_identity(session).await {
                warn!(error = %e, "Failed to clear stale identity");
            }
            None
        }
        Err(e) => {
            warn!(error = %e, user_id = %stored.user_id, "Could not verify session identity");
            Some(stored.to_identity())
        }
    }
}

/// Store `identity` in the session (login).
///
/// Cycles the session id. The guest cart slot is left as is.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_identity(
    session: &Session,
    identity: &Identity,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(
            session_keys::CURRENT_IDENTITY,
            SessionIdentity::from(identity),
        )
        .await
}

/// Remove the identity from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_identity(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<SessionIdentity>(session_keys::CURRENT_IDENTITY)
        .await?;
    Ok(())
}
