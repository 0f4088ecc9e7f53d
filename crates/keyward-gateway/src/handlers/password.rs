//! Password reset and change endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use keyward_accounts::AccountService;
use keyward_auth::JwtValidator;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Body of a lost-password request.
#[derive(Debug, Deserialize)]
pub struct ResetRequestBody {
    /// The account's email.
    pub email: String,
}

/// Body completing a reset.
#[derive(Debug, Deserialize)]
pub struct ResetBody {
    /// Ticket from the reset mail.
    pub ticket: String,
    /// The password to set.
    pub new_password: String,
}

/// Body of an authenticated change.
#[derive(Debug, Deserialize)]
pub struct ChangeBody {
    /// The current password.
    pub old_password: String,
    /// The password to set.
    pub new_password: String,
}

/// Mail a reset link.
///
/// Answers `204` whether or not the email belongs to an account.
///
/// # Errors
///
/// Returns an error if the backend or the mailer fails.
pub async fn request_reset<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Json(body): Json<ResetRequestBody>,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    state.accounts.request_password_reset(&body.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set a new password with a reset ticket.
///
/// # Errors
///
/// Returns `400` for a rejected password and `401` for a bad ticket.
pub async fn reset<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Json(body): Json<ResetBody>,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    state
        .accounts
        .reset_password(&body.ticket, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change the password of the signed-in user.
///
/// # Errors
///
/// Returns `401` if the old password is wrong and `400` for a rejected new one.
pub async fn change<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    user: AuthUser,
    Json(body): Json<ChangeBody>,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    state
        .accounts
        .change_password(user.user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
