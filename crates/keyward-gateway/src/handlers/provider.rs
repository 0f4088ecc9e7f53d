//! OAuth provider sign-in endpoints.
//!
//! `GET /auth/providers/:provider` sends the browser to the provider; the
//! provider sends it back to the callback, which signs the user in and
//! forwards a refresh token to the client app.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use serde::{Deserialize, Serialize};

use keyward_accounts::AccountService;
use keyward_auth::{JwtValidator, OAuthProvider};

use super::{redirect_failure, redirect_success};
use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Providers that can be used for sign-in.
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Configured providers.
    pub providers: Vec<OAuthProvider>,
}

/// Query the provider appends to the callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code.
    #[serde(default)]
    pub code: Option<String>,
    /// The `state` issued with the redirect.
    #[serde(default)]
    pub state: Option<String>,
    /// Set when the user declined or the provider failed.
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List the providers with credentials.
pub async fn list<A, V>(State(state): State<Arc<GatewayState<A, V>>>) -> impl IntoResponse
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    Json(ProvidersResponse {
        providers: state.oauth.config().configured_providers(),
    })
}

/// Redirect to the provider's consent page.
///
/// # Errors
///
/// Returns `404` for an unknown or unconfigured provider.
pub async fn authorize<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Path(provider): Path<String>,
) -> Result<Redirect, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    let provider: OAuthProvider = provider.parse()?;
    let url = state.oauth.authorize_url(provider)?;
    Ok(Redirect::to(&url))
}

/// Finish a provider sign-in.
///
/// # Errors
///
/// Returns `404` for an unknown provider. Every later failure is reported
/// to the error page.
pub async fn callback<A, V>(
    State(state): State<Arc<GatewayState<A, V>>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    let provider: OAuthProvider = provider.parse()?;

    match sign_in(&state, provider, query).await {
        Ok(refresh_token) => redirect_success(&state.config, Some(&refresh_token)),
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "Provider sign-in failed");
            redirect_failure(&state.config, &e)
        }
    }
}

async fn sign_in<A, V>(
    state: &GatewayState<A, V>,
    provider: OAuthProvider,
    query: CallbackQuery,
) -> Result<String, ApiError>
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    if let Some(error) = query.error {
        return Err(ApiError::Unauthorized(format!("provider declined: {error}")));
    }
    let (Some(code), Some(csrf_state)) = (query.code, query.state) else {
        return Err(ApiError::BadRequest("missing code or state".to_string()));
    };

    let profile = state.oauth.complete(provider, &csrf_state, &code).await?;
    let session = state.accounts.sign_in_with_provider(profile).await?;
    Ok(session.refresh_token)
}
