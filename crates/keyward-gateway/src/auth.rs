//! Authentication extractor.
//!
//! This module provides the `AuthUser` extractor that validates JWT tokens
//! and extracts user identity from requests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use keyward_accounts::AccountService;
use keyward_auth::{JwtValidator, ValidatedClaims};
use keyward_core::UserId;

use crate::error::ApiError;
use crate::state::GatewayState;

/// An authenticated user extracted from a JWT token.
///
/// This extractor validates the `Authorization: Bearer <token>` header
/// and provides access to the user's identity.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The signed-in user.
    pub user_id: UserId,
    /// Role the token was issued with.
    pub default_role: String,
    /// Every role the token grants.
    pub allowed_roles: Vec<String>,
}

impl AuthUser {
    /// Create an `AuthUser` from validated claims.
    #[must_use]
    pub fn from_claims(claims: &ValidatedClaims) -> Self {
        Self {
            user_id: claims.user_id,
            default_role: claims.default_role.clone(),
            allowed_roles: claims.allowed_roles.clone(),
        }
    }
}

/// Pull the bearer token out of the request headers.
fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".to_string()))
}

#[async_trait]
impl<A, V> FromRequestParts<Arc<GatewayState<A, V>>> for AuthUser
where
    A: AccountService + 'static,
    V: JwtValidator + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<A, V>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.jwt_validator.validate(token).await?;
        Ok(Self::from_claims(&claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use keyward_auth::MockJwtValidator;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/auth/user");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))).unwrap(), "abc");
        assert!(matches!(
            bearer_token(&parts(None)),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&parts(Some("Basic abc"))),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&parts(Some("Bearer "))),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn auth_user_from_mock_token() {
        let user_id = UserId::generate();
        let claims = MockJwtValidator
            .validate(&format!("test-token:{user_id}:user"))
            .await
            .unwrap();

        let user = AuthUser::from_claims(&claims);
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.default_role, "user");
        assert_eq!(user.allowed_roles, vec!["user"]);
    }
}
