//! HTTP gateway for the keyward authentication service.
//!
//! This crate exposes the account workflows as a JSON API. It handles:
//!
//! - Registration, activation and password or magic-link sign-in
//! - Refresh-token rotation, logout and the JWK set
//! - Email change and password reset flows
//! - OAuth provider redirects and callbacks
//! - Bearer token authentication for user endpoints
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Clients (browser / app)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     keyward-gateway                         │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Auth      │ │   Router    │ │    Redirects        │    │
//! │  │  Extractor  │ │  + Handlers │ │  (links, OAuth)     │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │ Accounts │   │  Auth    │   │  OAuth   │
//!        │ + Store  │   │ (JWT)    │   │ Providers│
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keyward_accounts::{AccountManager, AccountsConfig, LogMailer};
//! use keyward_auth::{JwtConfig, JwtService, OAuthConfig, OAuthManager};
//! use keyward_gateway::{create_router, GatewayConfig, GatewayState};
//! use keyward_store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let jwt = Arc::new(JwtService::new(JwtConfig {
//!     secret: Some("a-secret-of-at-least-thirty-two-bytes".to_string()),
//!     ..JwtConfig::default()
//! })?);
//! let accounts = Arc::new(AccountManager::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(LogMailer::default()),
//!     Arc::clone(&jwt),
//!     AccountsConfig::default(),
//! ));
//! let oauth = Arc::new(OAuthManager::new(OAuthConfig::default())?);
//!
//! let jwks = jwt.jwks();
//! let state = GatewayState::new(accounts, jwt, oauth, jwks, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:4000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ConfigError, GatewayConfig, Settings};
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;

pub use auth::AuthUser;
