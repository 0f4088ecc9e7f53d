//! Password hashing using Argon2id, and the length policy new passwords
//! must satisfy.
//!
//! Hashing is CPU bound, so the async helpers run it on the blocking pool.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AuthError, Result};

/// Hash a password into a PHC string.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a PHC string.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswordHash(e.to_string())),
    }
}

/// [`hash_password`] on the blocking thread pool.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking thread pool.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if the stored hash cannot be parsed.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("verification task failed: {e}")))?
}

/// A new password that fails the policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    /// Fewer characters than the minimum.
    #[error("password must be at least {0} characters long")]
    TooShort(usize),

    /// More characters than the maximum.
    #[error("password must be at most {0} characters long")]
    TooLong(usize),
}

/// Length bounds for new passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Minimum length in characters.
    pub min_length: usize,
    /// Maximum length in characters.
    pub max_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 128,
        }
    }
}

impl PasswordPolicy {
    /// Check a new password against the policy.
    ///
    /// # Errors
    ///
    /// Returns the first bound the password violates.
    pub fn check(&self, password: &str) -> std::result::Result<(), PasswordPolicyError> {
        let len = password.chars().count();
        if len < self.min_length {
            return Err(PasswordPolicyError::TooShort(self.min_length));
        }
        if len > self.max_length {
            return Err(PasswordPolicyError::TooLong(self.max_length));
        }
        Ok(())
    }
}
