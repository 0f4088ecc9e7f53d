//! Email change endpoints.

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

/// Body naming the new address.
#[derive(Debug, Deserialize)]
pub struct NewEmailBody {
    /// The address to switch to.
    pub new_email: String,
}

/// Body carrying a `changeEmail:` ticket.
#[derive(Debug, Deserialize)]
pub struct ChangeEmailBody {
    /// Ticket from the confirmation mail.
    pub ticket: String,
}

/// Start a confirmed email change; the new address receives a link.
///
/// # Errors
///
/// Returns `403` when email verification is off, and `400`/`409` for an
/// invalid or taken address.
pub async fn request_change<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    user: AuthUser,
    Json(body): Json<NewEmailBody>,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    state
        .accounts
        .request_email_change(user.user_id, &body.new_email)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change the email immediately.
///
/// # Errors
///
/// Returns `403` when email verification is on, and `400`/`409` for an
/// invalid or taken address.
pub async fn direct_change<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    user: AuthUser,
    Json(body): Json<NewEmailBody>,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    state
        .accounts
        .change_email_directly(user.user_id, &body.new_email)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Confirm an email change with the mailed ticket.
///
/// # Errors
///
/// Returns `401` if the ticket is unknown, expired or used.
pub async fn confirm_change<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Json(body): Json<ChangeEmailBody>,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    state.accounts.confirm_email_change(&body.ticket).await?;
    Ok(StatusCode::NO_CONTENT)
}
