//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.
//! Browser flows (activation, magic links, OAuth callbacks) answer with
//! redirects; everything else answers with JSON.

use axum::response::Redirect;
use url::Url;

use crate::config::GatewayConfig;
use crate::error::ApiError;

pub mod email;
pub mod health;
pub mod password;
pub mod provider;
pub mod register;
pub mod token;
pub mod user;

/// Redirect to `base` with `params` appended to its query.
pub(crate) fn redirect_with(base: &str, params: &[(&str, &str)]) -> Result<Redirect, ApiError> {
    let mut url = Url::parse(base).map_err(|e| {
        tracing::error!(url = %base, error = %e, "Invalid redirect URL");
        ApiError::Internal("invalid redirect configuration".to_string())
    })?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(Redirect::to(url.as_str()))
}

/// Send the browser to the success page, handing over a refresh token if any.
pub(crate) fn redirect_success(
    config: &GatewayConfig,
    refresh_token: Option<&str>,
) -> Result<Redirect, ApiError> {
    match refresh_token {
        Some(token) => redirect_with(&config.redirect_url_success, &[("refresh_token", token)]),
        None => redirect_with(&config.redirect_url_success, &[]),
    }
}

/// Send the browser to the error page with a client-safe description.
pub(crate) fn redirect_failure(
    config: &GatewayConfig,
    err: &ApiError,
) -> Result<Redirect, ApiError> {
    let message = err.to_string();
    redirect_with(
        &config.redirect_url_error,
        &[("error", err.code()), ("error_description", message.as_str())],
    )
}
