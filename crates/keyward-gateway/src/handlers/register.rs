//! Registration and activation endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;

use keyward_accounts::{AccountService, RegisterRequest, Registered};
use keyward_auth::JwtValidator;

use super::{redirect_failure, redirect_success};
use crate::error::ApiError;
use crate::state::GatewayState;

/// Query of an activation link.
#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    /// The `verifyEmail:` ticket.
    pub ticket: String,
}

/// Register a new account.
///
/// Answers `200` with a session when the account is active right away and
/// `204` when it still has to be confirmed through a mailed link.
///
/// # Errors
///
/// Returns an error if the email is invalid or taken, the password or roles
/// are rejected, or the backend fails.
pub async fn register<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    match state.accounts.register(body).await? {
        Registered::Session(session) => Ok((StatusCode::OK, Json(session)).into_response()),
        Registered::VerificationPending => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Activate an account from the link in the activation mail.
///
/// # Errors
///
/// Only fails if the configured redirect URLs are unusable; workflow errors
/// are reported to the error page.
pub async fn activate<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Query(query): Query<TicketQuery>,
) -> Result<Redirect, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    match state.accounts.activate(&query.ticket).await {
        Ok(account) => {
            tracing::info!(account_id = %account.account_id, "Account activated");
            redirect_success(&state.config, None)
        }
        Err(e) => redirect_failure(&state.config, &ApiError::from(e)),
    }
}
