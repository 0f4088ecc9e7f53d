//! Opaque refresh tokens.
//!
//! The raw token is handed to the client once. Only its blake3 digest is
//! persisted, so a leaked table cannot be replayed.

use std::fmt;

/// A bearer refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Generate a new random refresh token.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap a token received from a client.
    #[must_use]
    pub fn from_client(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token value, to be returned to the client.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// The storage key for this token.
    #[must_use]
    pub fn digest(&self) -> String {
        blake3::hash(self.0.as_bytes()).to_hex().to_string()
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshToken(…)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_hex() {
        let token = RefreshToken::from_client("abc");
        assert_eq!(token.digest(), token.digest());
        assert_eq!(token.digest().len(), 64);
        assert!(token.digest().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(RefreshToken::generate(), RefreshToken::generate());
    }

    #[test]
    fn debug_hides_value() {
        let token = RefreshToken::from_client("secret-value");
        assert!(!format!("{token:?}").contains("secret-value"));
    }
}
