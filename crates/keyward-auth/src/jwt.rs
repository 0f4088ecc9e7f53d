//! JWT issuance, validation and claims extraction.
//!
//! Tokens carry the standard `sub`, `iat`, `exp` and optional `iss` claims,
//! plus a namespaced object the GraphQL backend reads for authorization:
//!
//! ```json
//! {
//!   "sub": "550e8400-e29b-41d4-a716-446655440000",
//!   "https://hasura.io/jwt/claims": {
//!     "x-hasura-user-id": "550e8400-e29b-41d4-a716-446655440000",
//!     "x-hasura-default-role": "user",
//!     "x-hasura-allowed-roles": ["user", "me"]
//!   }
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use keyward_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, Result};
use crate::jwks::{JwkKey, JwkSet};

/// Default namespace for the authorization claims.
pub const DEFAULT_CLAIMS_NAMESPACE: &str = "https://hasura.io/jwt/claims";

/// Minimum HMAC secret length in bytes.
const MIN_SECRET_LEN: usize = 32;

/// Signing algorithm for issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-512.
    HS512,
    /// Ed25519 signatures.
    EdDSA,
}

impl JwtAlgorithm {
    const fn to_jsonwebtoken(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS512 => Algorithm::HS512,
            Self::EdDSA => Algorithm::EdDSA,
        }
    }
}

impl FromStr for JwtAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS512" => Ok(Self::HS512),
            "EDDSA" | "ED25519" => Ok(Self::EdDSA),
            other => Err(AuthError::KeyConfig(format!("unsupported algorithm: {other}"))),
        }
    }
}

/// Signing configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Signing algorithm.
    pub algorithm: JwtAlgorithm,
    /// Shared secret for HMAC algorithms.
    #[serde(default)]
    pub secret: Option<String>,
    /// PKCS#8 PEM private key for `EdDSA`.
    #[serde(default)]
    pub private_key_pem: Option<String>,
    /// Base64url public key (`x`) matching the private key, for `EdDSA`.
    #[serde(default)]
    pub public_key_x: Option<String>,
    /// Key ID placed in the token header and the JWK set.
    #[serde(default)]
    pub key_id: Option<String>,
    /// Issuer claim. Validated when set.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Token lifetime in minutes.
    #[serde(default = "default_expires_in_minutes")]
    pub expires_in_minutes: i64,
    /// Key of the authorization claims object.
    #[serde(default = "default_claims_namespace")]
    pub claims_namespace: String,
}

const fn default_expires_in_minutes() -> i64 {
    15
}

fn default_claims_namespace() -> String {
    DEFAULT_CLAIMS_NAMESPACE.to_string()
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            algorithm: JwtAlgorithm::HS256,
            secret: None,
            private_key_pem: None,
            public_key_x: None,
            key_id: None,
            issuer: None,
            expires_in_minutes: default_expires_in_minutes(),
            claims_namespace: default_claims_namespace(),
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("issuer", &self.issuer)
            .field("expires_in_minutes", &self.expires_in_minutes)
            .field("claims_namespace", &self.claims_namespace)
            .finish_non_exhaustive()
    }
}

/// Who a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSubject {
    /// The user the token authenticates.
    pub user_id: UserId,
    /// Role used when the client does not pick one.
    pub default_role: String,
    /// Roles the client may pick.
    pub allowed_roles: Vec<String>,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The encoded JWT.
    pub token: String,
    /// Lifetime in milliseconds.
    pub expires_in_ms: i64,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

/// Validated claims extracted from a JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaims {
    /// The user ID from the `sub` claim.
    pub user_id: UserId,
    /// The default role.
    pub default_role: String,
    /// The allowed roles.
    pub allowed_roles: Vec<String>,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

/// Trait for validating JWTs.
#[async_trait]
pub trait JwtValidator: Send + Sync {
    /// Validate a JWT and extract claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid, expired, or cannot be validated.
    async fn validate(&self, token: &str) -> Result<ValidatedClaims>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamespacedClaims {
    #[serde(rename = "x-hasura-user-id")]
    user_id: String,
    #[serde(rename = "x-hasura-default-role")]
    default_role: String,
    #[serde(rename = "x-hasura-allowed-roles")]
    allowed_roles: Vec<String>,
}

/// Signs and validates tokens with the configured key.
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    jwk: Option<JwkKey>,
}

impl JwtService {
    /// Build the service from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyConfig` if the key material for the selected
    /// algorithm is missing or malformed, or an HMAC secret is shorter than
    /// 32 bytes.
    pub fn new(config: JwtConfig) -> Result<Self> {
        let (encoding_key, decoding_key, jwk) = match config.algorithm {
            JwtAlgorithm::HS256 | JwtAlgorithm::HS512 => {
                let secret = config
                    .secret
                    .as_deref()
                    .ok_or_else(|| AuthError::KeyConfig("missing HMAC secret".to_string()))?;
                if secret.len() < MIN_SECRET_LEN {
                    return Err(AuthError::KeyConfig(format!(
                        "HMAC secret must be at least {MIN_SECRET_LEN} bytes"
                    )));
                }
                (
                    EncodingKey::from_secret(secret.as_bytes()),
                    DecodingKey::from_secret(secret.as_bytes()),
                    None,
                )
            }
            JwtAlgorithm::EdDSA => {
                let pem = config
                    .private_key_pem
                    .as_deref()
                    .ok_or_else(|| AuthError::KeyConfig("missing Ed25519 private key".to_string()))?;
                let x = config
                    .public_key_x
                    .as_deref()
                    .ok_or_else(|| AuthError::KeyConfig("missing Ed25519 public key".to_string()))?;
                let encoding_key = EncodingKey::from_ed_pem(pem.as_bytes())
                    .map_err(|e| AuthError::KeyConfig(format!("invalid Ed25519 private key: {e}")))?;
                let jwk = JwkKey::ed25519(x, config.key_id.clone());
                let decoding_key = jwk.decoding_key()?;
                check_key_pair(&encoding_key, &decoding_key, Algorithm::EdDSA)?;
                (encoding_key, decoding_key, Some(jwk))
            }
        };

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            jwk,
        })
    }

    /// Get the signing configuration.
    #[must_use]
    pub const fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Public keys for token verification. Empty for HMAC algorithms.
    #[must_use]
    pub fn jwks(&self) -> JwkSet {
        JwkSet {
            keys: self.jwk.iter().cloned().collect(),
        }
    }

    /// Sign a token for `subject`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if encoding fails.
    pub fn issue(&self, subject: &SessionSubject) -> Result<IssuedToken> {
        self.issue_at(subject, Utc::now())
    }

    fn issue_at(&self, subject: &SessionSubject, now: DateTime<Utc>) -> Result<IssuedToken> {
        let lifetime = Duration::try_minutes(self.config.expires_in_minutes)
            .ok_or_else(|| AuthError::Internal("token lifetime out of range".into()))?;
        let expires_at = now
            .checked_add_signed(lifetime)
            .ok_or_else(|| AuthError::Internal("token lifetime out of range".into()))?;

        let namespaced = NamespacedClaims {
            user_id: subject.user_id.to_string(),
            default_role: subject.default_role.clone(),
            allowed_roles: subject.allowed_roles.clone(),
        };
        let mut extra = Map::new();
        extra.insert(
            self.config.claims_namespace.clone(),
            serde_json::to_value(namespaced).map_err(|e| AuthError::Internal(e.to_string()))?,
        );

        let claims = Claims {
            sub: subject.user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            extra,
        };

        let mut header = Header::new(self.config.algorithm.to_jsonwebtoken());
        header.kid.clone_from(&self.config.key_id);

        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))?;

        Ok(IssuedToken {
            token,
            expires_in_ms: lifetime.num_milliseconds(),
            expires_at,
        })
    }
}

/// Sign a fixed message and verify it, so a private key paired with the
/// wrong public key fails at startup.
fn check_key_pair(
    encoding_key: &EncodingKey,
    decoding_key: &DecodingKey,
    algorithm: Algorithm,
) -> Result<()> {
    const MESSAGE: &[u8] = b"keyward key check";
    let signature = jsonwebtoken::crypto::sign(MESSAGE, encoding_key, algorithm)
        .map_err(|e| AuthError::KeyConfig(format!("cannot sign with private key: {e}")))?;
    let verified = jsonwebtoken::crypto::verify(&signature, MESSAGE, decoding_key, algorithm)
        .map_err(|e| AuthError::KeyConfig(format!("cannot verify with public key: {e}")))?;
    if verified {
        Ok(())
    } else {
        Err(AuthError::KeyConfig(
            "public key does not match private key".to_string(),
        ))
    }
}

#[async_trait]
impl JwtValidator for JwtService {
    async fn validate(&self, token: &str) -> Result<ValidatedClaims> {
        let mut validation = Validation::new(self.config.algorithm.to_jsonwebtoken());
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation.validate_aud = false;
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;
        let mut claims = token_data.claims;

        let namespaced = claims
            .extra
            .remove(&self.config.claims_namespace)
            .ok_or_else(|| AuthError::MissingClaim(self.config.claims_namespace.clone()))?;
        let namespaced: NamespacedClaims = serde_json::from_value(namespaced)
            .map_err(|e| AuthError::InvalidToken(format!("malformed claims: {e}")))?;

        let user_id = UserId::from_str(&claims.sub).map_err(|_| AuthError::InvalidUserId)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::InvalidToken("invalid exp timestamp".to_string()))?;

        Ok(ValidatedClaims {
            user_id,
            default_role: namespaced.default_role,
            allowed_roles: namespaced.allowed_roles,
            expires_at,
        })
    }
}

/// A mock JWT validator for testing.
///
/// This validator accepts any token in the format `test-token:<user_uuid>:<role>`
/// and extracts the user ID and role from it.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockJwtValidator;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl JwtValidator for MockJwtValidator {
    async fn validate(&self, token: &str) -> Result<ValidatedClaims> {
        let rest = token.strip_prefix("test-token:").ok_or_else(|| {
            AuthError::InvalidToken("expected test-token:<user>:<role>".to_string())
        })?;
        let (user, role) = rest.split_once(':').ok_or_else(|| {
            AuthError::InvalidToken("expected test-token:<user>:<role>".to_string())
        })?;

        let user_id = UserId::from_str(user).map_err(|_| AuthError::InvalidUserId)?;

        Ok(ValidatedClaims {
            user_id,
            default_role: role.to_string(),
            allowed_roles: vec![role.to_string()],
            expires_at: Utc::now() + Duration::hours(1),
        })
    }
}
