//! JWT signing and validation.
//!
//! Tokens are HS256-signed and carry the caller's identity under a
//! configurable claim key next to the registered `nbf`, `iat` and `exp`
//! claims. One [`JwtValidator`] is built at startup and shared by the
//! authentication stage (validation) and the login handlers (signing).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::AppError;

/// Claim key used for the identity when none is configured.
pub const DEFAULT_IDENTITY_KEY: &str = "x-user-id";

/// JWT validation errors.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("invalid authorization format")]
    InvalidFormat,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("invalid claim: {0}")]
    InvalidClaim(&'static str),
}

impl From<JwtError> for AppError {
    fn from(e: JwtError) -> Self {
        Self::Unauthenticated(e.to_string())
    }
}

/// Pre-compiled JWT validator with cached encoding/decoding keys.
///
/// Cheap to clone: keys and the identity claim name are behind `Arc`.
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
    identity_key: Arc<str>,
    expiration: Duration,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("identity_key", &self.identity_key)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// Create a validator from a shared secret.
    #[must_use]
    pub fn new(secret: &SecretString, identity_key: &str, expiration: Duration) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret_bytes)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret_bytes)),
            validation,
            identity_key: identity_key.into(),
            expiration,
        }
    }

    /// Claim key the identity is stored under.
    #[inline]
    #[must_use]
    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    /// Sign a token for `identity`, returning it with its expiry time.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if encoding fails.
    pub fn sign(&self, identity: &str) -> Result<(String, DateTime<Utc>), AppError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.expiration)
            .map_err(|e| AppError::Internal(format!("JWT expiration out of range: {e}")))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal("JWT expiration out of range".into()))?;

        let mut claims = Map::new();
        claims.insert(self.identity_key.to_string(), Value::from(identity));
        claims.insert("nbf".into(), Value::from(now.timestamp()));
        claims.insert("iat".into(), Value::from(now.timestamp()));
        claims.insert("exp".into(), Value::from(expires_at.timestamp()));

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("JWT encoding failed: {e}")))?;

        Ok((token, expires_at))
    }

    /// Validate a JWT and extract the identity claim.
    ///
    /// # Errors
    /// `InvalidToken` for bad signatures, malformed or expired tokens;
    /// `InvalidClaim` when the identity claim is absent or not a non-empty string.
    pub fn validate(&self, token: &str) -> Result<String, JwtError> {
        let token_data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map_err(|_| JwtError::InvalidToken)?;

        match token_data.claims.get(self.identity_key.as_ref()) {
            Some(Value::String(identity)) if !identity.is_empty() => Ok(identity.clone()),
            _ => Err(JwtError::InvalidClaim("identity")),
        }
    }
}
