//! Credentials for keyward: tokens, passwords, roles and OAuth.
//!
//! This crate provides the security primitives the account workflows use:
//!
//! - JWT signing and validation (HS256/HS512 or Ed25519)
//! - JWKS publication for Ed25519 keys
//! - Argon2id password hashing and the new-password policy
//! - Role resolution for new accounts
//! - OAuth2 sign-in with GitHub, Google and Facebook
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Gateway        │────▶│   JwtValidator   │
//! │   (HTTP)         │     │   (trait)        │
//! └────────┬─────────┘     └────────┬─────────┘
//!          │                        │
//!          │               ┌────────▼─────────┐
//!          │               │   JwtService     │──▶ JwkSet (/auth/jwks)
//!          │               │   (sign + verify)│
//!          │               └──────────────────┘
//!          │
//!          │               ┌──────────────────┐       HTTPS
//!          └──────────────▶│   OAuthManager   │──────────────▶ providers
//!                          │   (state cache)  │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use keyward_auth::{JwtConfig, JwtService, JwtValidator, SessionSubject};
//! use keyward_core::UserId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = JwtService::new(JwtConfig {
//!     secret: Some("a-secret-of-at-least-thirty-two-bytes".to_string()),
//!     ..JwtConfig::default()
//! })?;
//!
//! let issued = service.issue(&SessionSubject {
//!     user_id: UserId::generate(),
//!     default_role: "user".to_string(),
//!     allowed_roles: vec!["user".to_string()],
//! })?;
//!
//! let claims = service.validate(&issued.token).await?;
//! assert_eq!(claims.default_role, "user");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod jwks;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod roles;

pub use error::{AuthError, Result};
pub use jwks::{JwkKey, JwkSet};
pub use jwt::{
    IssuedToken, JwtAlgorithm, JwtConfig, JwtService, JwtValidator, SessionSubject,
    ValidatedClaims, DEFAULT_CLAIMS_NAMESPACE,
};
pub use oauth::{
    OAuthConfig, OAuthManager, OAuthProfile, OAuthProvider, ProviderCredentials,
    ProviderEndpoints,
};
pub use password::{PasswordPolicy, PasswordPolicyError};
pub use roles::{ResolvedRoles, RoleError, RolePolicy};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockJwtValidator;
