//! Session issuance and refresh-token rotation.
//!
//! A session is a short-lived JWT plus an opaque refresh token. Only the
//! refresh token's digest is stored. Rotation removes the presented token
//! in the same step that reads it, so each refresh token is redeemable once.

use chrono::{Duration, Utc};
use keyward_auth::{JwtService, SessionSubject};
use keyward_core::{RefreshToken, UserId};
use keyward_store::{Account, RefreshTokenRecord, Store};
use serde::{Deserialize, Serialize};

use crate::error::{AccountError, Result};

/// Credentials returned to a signed-in client.
#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    /// Signed JWT.
    pub jwt_token: String,
    /// JWT lifetime in milliseconds.
    pub jwt_expires_in: i64,
    /// Opaque refresh token.
    pub refresh_token: String,
    /// Refresh token lifetime in milliseconds.
    pub refresh_expires_in: i64,
    /// The signed-in user.
    pub user_id: UserId,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("jwt_expires_in", &self.jwt_expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Issue a JWT and a fresh refresh token for `account`.
///
/// # Errors
///
/// Returns an error if signing fails or the refresh token cannot be stored.
pub async fn issue<S: Store>(
    store: &S,
    jwt: &JwtService,
    account: &Account,
    refresh_ttl: Duration,
) -> Result<Session> {
    let issued = jwt.issue(&SessionSubject {
        user_id: account.user_id,
        default_role: account.default_role.clone(),
        allowed_roles: account.roles.clone(),
    })?;

    let expires_at = Utc::now()
        .checked_add_signed(refresh_ttl)
        .ok_or_else(|| AccountError::Internal("refresh token lifetime out of range".into()))?;

    let refresh_token = RefreshToken::generate();
    store
        .insert_refresh_token(&RefreshTokenRecord {
            token_digest: refresh_token.digest(),
            account_id: account.account_id,
            expires_at,
        })
        .await?;

    tracing::debug!(account_id = %account.account_id, "Issued session");

    Ok(Session {
        jwt_token: issued.token,
        jwt_expires_in: issued.expires_in_ms,
        refresh_token: refresh_token.expose().to_string(),
        refresh_expires_in: refresh_ttl.num_milliseconds(),
        user_id: account.user_id,
    })
}

/// Exchange a refresh token for a new session.
///
/// The presented token is consumed whether or not a new session results.
///
/// # Errors
///
/// Returns `AccountError::InvalidRefreshToken` if the token is unknown,
/// expired or already used, and `AccountError::AccountInactive` if the
/// account was deactivated since the token was issued.
pub async fn rotate<S: Store>(
    store: &S,
    jwt: &JwtService,
    presented: &RefreshToken,
    refresh_ttl: Duration,
) -> Result<Session> {
    let record = store
        .take_refresh_token(&presented.digest(), Utc::now())
        .await?
        .ok_or(AccountError::InvalidRefreshToken)?;

    let account = store
        .account_by_id(record.account_id)
        .await?
        .ok_or(AccountError::InvalidRefreshToken)?;
    if !account.active {
        return Err(AccountError::AccountInactive);
    }

    issue(store, jwt, &account, refresh_ttl).await
}
