//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while issuing or validating credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The JWT has expired.
    #[error("token expired")]
    TokenExpired,

    /// The JWT signature is invalid.
    #[error("invalid signature")]
    InvalidSignature,

    /// The JWT issuer does not match the expected value.
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The user ID in the token is malformed.
    #[error("invalid user ID format")]
    InvalidUserId,

    /// A required claim is missing from the token.
    #[error("missing required claim: {0}")]
    MissingClaim(String),

    /// The token format is invalid.
    #[error("invalid token format: {0}")]
    InvalidToken(String),

    /// The signing key configuration is unusable.
    #[error("invalid key configuration: {0}")]
    KeyConfig(String),

    /// Hashing or parsing a password hash failed.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// The provider name is not one we support.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The provider is supported but has no credentials configured.
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// The OAuth `state` is unknown, expired, or for another provider.
    #[error("invalid OAuth state")]
    InvalidOAuthState,

    /// Exchanging the authorization code failed.
    #[error("code exchange failed: {0}")]
    CodeExchange(String),

    /// Fetching the provider profile failed.
    #[error("profile fetch failed: {0}")]
    ProfileFetch(String),

    /// Too many provider sign-ins are in flight to accept another.
    #[error("too many pending sign-ins")]
    TooManyPendingStates,

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns `true` if this error indicates the client should retry with a new token.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::TokenExpired
                | Self::CodeExchange(_)
                | Self::ProfileFetch(_)
                | Self::TooManyPendingStates
        )
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::TokenExpired
            | Self::InvalidSignature
            | Self::InvalidIssuer
            | Self::InvalidUserId
            | Self::MissingClaim(_)
            | Self::InvalidToken(_)
            | Self::InvalidOAuthState => 401,
            Self::UnknownProvider(_) | Self::ProviderNotConfigured(_) => 404,
            Self::CodeExchange(_) | Self::ProfileFetch(_) => 502,
            Self::TooManyPendingStates => 503,
            Self::KeyConfig(_) | Self::PasswordHash(_) | Self::Internal(_) => 500,
        }
    }
}
