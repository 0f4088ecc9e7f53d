//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use keyward_accounts::AccountService;
use keyward_auth::JwtValidator;

use crate::handlers::{email, health, password, provider, register, token, user};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /healthz` - Health check
/// - `POST /auth/register` - Register
/// - `GET /auth/activate` - Activation link
/// - `POST /auth/login` - Password or magic-link sign-in
/// - `GET /auth/magic-link` - Magic link
/// - `POST /auth/token/refresh` - Rotate refresh token
/// - `POST /auth/logout` - Revoke refresh tokens
/// - `GET /auth/jwks` - Public signing keys
/// - `POST /auth/change-email/change` - Confirm email change
/// - `POST /auth/change-password/request` - Lost password
/// - `POST /auth/change-password/change` - Reset password
/// - `GET /auth/providers` - Configured providers
/// - `GET /auth/providers/:provider` - Redirect to provider
/// - `GET /auth/providers/:provider/callback` - Provider callback
///
/// ## Authenticated
/// - `POST /auth/change-email/request` - Start confirmed email change
/// - `POST /auth/change-email/direct-change` - Change email immediately
/// - `POST /auth/change-password` - Change password
/// - `GET /auth/user` - Account info
/// - `POST /auth/delete` - Delete account
pub fn create_router<A, V>(state: GatewayState<A, V>) -> Router
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    // Extract config values before moving state
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        .route("/healthz", get(health::health))
        // Registration
        .route("/auth/register", post(register::register::<A, V>))
        .route("/auth/activate", get(register::activate::<A, V>))
        // Sign-in and sessions
        .route("/auth/login", post(token::login::<A, V>))
        .route("/auth/magic-link", get(token::magic_link::<A, V>))
        .route("/auth/token/refresh", post(token::refresh::<A, V>))
        .route("/auth/logout", post(token::logout::<A, V>))
        .route("/auth/jwks", get(token::jwks::<A, V>))
        // Email
        .route(
            "/auth/change-email/request",
            post(email::request_change::<A, V>),
        )
        .route(
            "/auth/change-email/direct-change",
            post(email::direct_change::<A, V>),
        )
        .route(
            "/auth/change-email/change",
            post(email::confirm_change::<A, V>),
        )
        // Password
        .route(
            "/auth/change-password/request",
            post(password::request_reset::<A, V>),
        )
        .route(
            "/auth/change-password/change",
            post(password::reset::<A, V>),
        )
        .route("/auth/change-password", post(password::change::<A, V>))
        // User
        .route("/auth/user", get(user::me::<A, V>))
        .route("/auth/delete", post(user::delete::<A, V>))
        // Providers
        .route("/auth/providers", get(provider::list::<A, V>))
        .route("/auth/providers/:provider", get(provider::authorize::<A, V>))
        .route(
            "/auth/providers/:provider/callback",
            get(provider::callback::<A, V>),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
