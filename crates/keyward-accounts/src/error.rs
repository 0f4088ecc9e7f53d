//! Error types for account workflows.
//!
//! Every failure a workflow can report maps to an HTTP status, so the
//! gateway can translate errors without knowing the workflows.

use keyward_auth::{AuthError, PasswordPolicyError, RoleError};
use keyward_core::TicketError;
use keyward_store::StoreError;
use thiserror::Error;

use crate::mailer::MailError;

/// A result type using `AccountError`.
pub type Result<T> = std::result::Result<T, AccountError>;

/// Errors that can occur in account workflows.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Unknown email, wrong password, or an account without a password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The account exists but has not been activated.
    #[error("account is not activated")]
    AccountInactive,

    /// Another account already uses the email.
    #[error("email already in use")]
    EmailInUse,

    /// The email is not a valid address.
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    /// The email's domain is not on the allow list.
    #[error("email domain not allowed: {0}")]
    EmailDomainNotAllowed(String),

    /// A password is required because magic links are disabled.
    #[error("password is required")]
    PasswordRequired,

    /// The new password violates the password policy.
    #[error(transparent)]
    WeakPassword(#[from] PasswordPolicyError),

    /// The requested roles violate the role policy.
    #[error(transparent)]
    Roles(#[from] RoleError),

    /// The ticket string is malformed or belongs to another flow.
    #[error(transparent)]
    Ticket(#[from] TicketError),

    /// The ticket is unknown, expired or already used.
    #[error("invalid or expired ticket")]
    InvalidTicket,

    /// The refresh token is unknown, expired or already rotated.
    #[error("invalid or expired refresh token")]
    InvalidRefreshToken,

    /// The operation is switched off in this deployment.
    #[error("{0} is disabled")]
    FeatureDisabled(&'static str),

    /// No account belongs to the authenticated user.
    #[error("account not found")]
    NotFound,

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Credential error.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Sending mail failed.
    #[error("mail error: {0}")]
    Mail(#[from] MailError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AccountError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials
            | Self::AccountInactive
            | Self::InvalidTicket
            | Self::InvalidRefreshToken => 401,
            Self::InvalidEmail(_)
            | Self::EmailDomainNotAllowed(_)
            | Self::PasswordRequired
            | Self::WeakPassword(_)
            | Self::Roles(_)
            | Self::Ticket(_) => 400,
            Self::FeatureDisabled(_) => 403,
            Self::NotFound | Self::Store(StoreError::NotFound) => 404,
            Self::EmailInUse | Self::Store(StoreError::Conflict(_)) => 409,
            Self::Auth(e) => e.http_status_code(),
            Self::Store(_) | Self::Mail(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retriable(),
            Self::Auth(e) => e.is_retriable(),
            Self::Mail(_) => true,
            _ => false,
        }
    }

    /// Returns true if the message may be shown to clients verbatim.
    ///
    /// Server-side failures carry backend details that only belong in logs.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.http_status_code() < 500
    }
}

/// Map a uniqueness conflict on email to `EmailInUse`.
pub(crate) fn email_conflict(err: StoreError) -> AccountError {
    match err {
        StoreError::Conflict(_) => AccountError::EmailInUse,
        other => AccountError::Store(other),
    }
}
