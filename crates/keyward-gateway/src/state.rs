//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use keyward_accounts::AccountService;
use keyward_auth::{JwkSet, JwtValidator, OAuthManager};

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
///
/// This struct holds references to all services needed by the HTTP handlers.
pub struct GatewayState<A, V>
where
    A: AccountService,
    V: JwtValidator,
{
    /// Account workflows.
    pub accounts: Arc<A>,
    /// The JWT validator for authenticated routes.
    pub jwt_validator: Arc<V>,
    /// OAuth provider flows.
    pub oauth: Arc<OAuthManager>,
    /// Public keys served at `/auth/jwks`.
    pub jwks: JwkSet,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<A, V> GatewayState<A, V>
where
    A: AccountService,
    V: JwtValidator,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(
        accounts: Arc<A>,
        jwt_validator: Arc<V>,
        oauth: Arc<OAuthManager>,
        jwks: JwkSet,
        config: GatewayConfig,
    ) -> Self {
        Self {
            accounts,
            jwt_validator,
            oauth,
            jwks,
            config,
        }
    }
}

impl<A, V> Clone for GatewayState<A, V>
where
    A: AccountService,
    V: JwtValidator,
{
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            jwt_validator: Arc::clone(&self.jwt_validator),
            oauth: Arc::clone(&self.oauth),
            jwks: self.jwks.clone(),
            config: self.config.clone(),
        }
    }
}
