//! Authentication route handlers.

use axum::{Json, extract::State, http::StatusCode};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{Email, UserId};

use crate::backend::Identity;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalIdentity, clear_identity, set_identity};
use crate::services::{AuthService, Registration};
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Signed-in user display data.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub email: Email,
}

impl From<&Identity> for UserView {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.user_id,
            email: identity.email.clone(),
        }
    }
}

/// Authentication state.
#[derive(Debug, Serialize)]
pub struct AuthStatusView {
    pub signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    /// Set after a registration that awaits email confirmation.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub confirmation_required: bool,
}

impl AuthStatusView {
    fn signed_in(identity: &Identity) -> Self {
        Self {
            signed_in: true,
            user: Some(UserView::from(identity)),
            confirmation_required: false,
        }
    }

    const fn signed_out() -> Self {
        Self {
            signed_in: false,
            user: None,
            confirmation_required: false,
        }
    }
}

async fn start_session(session: &Session, identity: &Identity) -> Result<()> {
    set_identity(session, identity).await?;
    set_sentry_user(&identity.user_id, Some(identity.email.as_str()));
    Ok(())
}

/// Register a new account.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<AuthStatusView>)> {
    let registration = AuthService::new(state.backend())
        .register(
            &form.email,
            &SecretString::from(form.password),
            &SecretString::from(form.password_confirm),
        )
        .await?;

    match registration {
        Registration::SignedIn(identity) => {
            start_session(&session, &identity).await?;
            Ok((StatusCode::CREATED, Json(AuthStatusView::signed_in(&identity))))
        }
        Registration::ConfirmationRequired { .. } => Ok((
            StatusCode::ACCEPTED,
            Json(AuthStatusView {
                confirmation_required: true,
                ..AuthStatusView::signed_out()
            }),
        )),
    }
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<AuthStatusView>> {
    let identity = AuthService::new(state.backend())
        .login(&form.email, &SecretString::from(form.password))
        .await?;

    start_session(&session, &identity).await?;
    Ok(Json(AuthStatusView::signed_in(&identity)))
}

/// Sign out. The guest cart slot is left untouched.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(identity): OptionalIdentity,
) -> Result<StatusCode> {
    if let Some(identity) = identity {
        AuthService::new(state.backend()).logout(&identity).await;
    }
    clear_identity(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Current authentication state.
#[instrument(skip_all)]
pub async fn me(OptionalIdentity(identity): OptionalIdentity) -> Json<AuthStatusView> {
    Json(
        identity
            .as_ref()
            .map_or_else(AuthStatusView::signed_out, AuthStatusView::signed_in),
    )
}
