//! Endpoints about the signed-in user.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use keyward_accounts::AccountService;
use keyward_auth::JwtValidator;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Account and profile of the signed-in user.
///
/// # Errors
///
/// Returns `404` if the account no longer exists.
pub async fn me<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    let info = state.accounts.account_info(user.user_id).await?;
    Ok(Json(info))
}

/// Delete the signed-in user's account.
///
/// # Errors
///
/// Returns `403` unless self-deletion is enabled.
pub async fn delete<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    state.accounts.delete_account(user.user_id).await?;
    tracing::info!(user_id = %user.user_id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}
