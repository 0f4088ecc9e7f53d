//! JWKS (JSON Web Key Set) publication.
//!
//! When tokens are signed with Ed25519, the public key is published at
//! `/auth/jwks` so the GraphQL backend and other services can verify them
//! without sharing a secret. HMAC deployments publish an empty set.

use base64::prelude::*;
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// A JWK set as served to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// The list of keys.
    pub keys: Vec<JwkKey>,
}

/// A single JWK (JSON Web Key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkKey {
    /// Key type (`OKP` for Ed25519).
    pub kty: String,
    /// Curve (`Ed25519`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Public key (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Key use (`sig`).
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Algorithm (`EdDSA`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl JwkKey {
    /// Describe an Ed25519 signing key by its public component.
    #[must_use]
    pub fn ed25519(x: impl Into<String>, kid: Option<String>) -> Self {
        Self {
            kty: "OKP".to_string(),
            crv: Some("Ed25519".to_string()),
            x: Some(x.into()),
            kid,
            key_use: Some("sig".to_string()),
            alg: Some("EdDSA".to_string()),
        }
    }

    /// Build the decoding key this JWK describes.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyConfig` if the key is not a well-formed
    /// Ed25519 public key.
    pub fn decoding_key(&self) -> Result<DecodingKey> {
        if self.kty != "OKP" {
            return Err(AuthError::KeyConfig(format!(
                "unsupported key type: {}",
                self.kty
            )));
        }
        let crv = self.crv.as_deref().unwrap_or("");
        if crv != "Ed25519" {
            return Err(AuthError::KeyConfig(format!("unsupported curve: {crv}")));
        }

        let x = self
            .x
            .as_ref()
            .ok_or_else(|| AuthError::KeyConfig("missing x parameter".to_string()))?;
        let public_key = BASE64_URL_SAFE_NO_PAD
            .decode(x)
            .map_err(|e| AuthError::KeyConfig(format!("invalid base64: {e}")))?;
        if public_key.len() != 32 {
            return Err(AuthError::KeyConfig(format!(
                "Ed25519 public key must be 32 bytes, got {}",
                public_key.len()
            )));
        }

        Ok(DecodingKey::from_ed_der(&public_key))
    }
}
