//! Sign-in and session endpoints.
//!
//! Login by password or magic link, refresh-token rotation, logout and the
//! public key set used to verify issued tokens.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use keyward_accounts::{AccountService, LoginOutcome, LoginRequest, MagicLinkAction};
use keyward_auth::JwtValidator;

use super::{redirect_failure, redirect_success};
use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Answer to a passwordless login.
#[derive(Debug, Serialize)]
pub struct MagicLinkSentResponse {
    /// Always `true`.
    pub magic_link: bool,
}

/// Query of a magic link.
#[derive(Debug, Deserialize)]
pub struct MagicLinkQuery {
    /// `register` or `login`.
    pub action: String,
    /// The `magicLink:` ticket.
    pub token: String,
}

/// Body carrying a refresh token.
#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    /// The refresh token to rotate.
    pub refresh_token: String,
}

/// Body of a logout.
#[derive(Debug, Deserialize)]
pub struct LogoutBody {
    /// The refresh token of the session to end.
    pub refresh_token: String,
    /// End every session of the account.
    #[serde(default)]
    pub all: bool,
}

fn parse_action(raw: &str) -> Result<MagicLinkAction, ApiError> {
    match raw {
        "register" => Ok(MagicLinkAction::Register),
        "login" => Ok(MagicLinkAction::Login),
        other => Err(ApiError::BadRequest(format!("unknown magic link action: {other}"))),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Sign in with a password, or request a magic link by omitting it.
///
/// # Errors
///
/// Returns `401` for bad credentials or an inactive account.
pub async fn login<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    match state.accounts.login(body).await? {
        LoginOutcome::Session(session) => Ok(Json(session).into_response()),
        LoginOutcome::MagicLinkSent => {
            Ok(Json(MagicLinkSentResponse { magic_link: true }).into_response())
        }
    }
}

/// Complete a magic link and hand the refresh token to the client app.
///
/// # Errors
///
/// Only fails if the configured redirect URLs are unusable.
pub async fn magic_link<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Query(query): Query<MagicLinkQuery>,
) -> Result<Redirect, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    let action = match parse_action(&query.action) {
        Ok(action) => action,
        Err(e) => return redirect_failure(&state.config, &e),
    };

    match state.accounts.complete_magic_link(&query.token).await {
        Ok(session) => {
            tracing::info!(user_id = %session.user_id, action = action.as_str(), "Magic link completed");
            redirect_success(&state.config, Some(&session.refresh_token))
        }
        Err(e) => redirect_failure(&state.config, &ApiError::from(e)),
    }
}

/// Exchange a refresh token for a new session.
///
/// # Errors
///
/// Returns `401` if the token is unknown, expired or already used.
pub async fn refresh<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Json(body): Json<RefreshBody>,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    let session = state.accounts.refresh_session(&body.refresh_token).await?;
    Ok(Json(session))
}

/// Revoke the given refresh token, or all of the account's tokens.
///
/// # Errors
///
/// Returns an error if the backend fails.
pub async fn logout<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Json(body): Json<LogoutBody>,
) -> Result<impl IntoResponse, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    state.accounts.logout(&body.refresh_token, body.all).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public keys for verifying issued tokens.
pub async fn jwks<A, V>(State(state): State<Arc<GatewayState<A, V>>>) -> impl IntoResponse
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    Json(state.jwks.clone())
}
