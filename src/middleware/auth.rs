//! Bearer-token authentication.
//!
//! The credential travels as `authorization: Bearer <token>` on both
//! transports: an HTTP header on the gateway, a metadata entry on gRPC.
//! [`CredentialCarrier`] hides the difference from the [`Authenticator`].

use blog_core::{JwtError, JwtValidator};
use tonic::metadata::MetadataMap;
use tracing::debug;

use crate::context::Principal;

/// Header / metadata key carrying the bearer credential.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// Transport-specific source of the raw authorization value.
pub trait CredentialCarrier {
    /// The raw `authorization` value, if present and readable.
    fn authorization(&self) -> Option<&str>;
}

impl CredentialCarrier for http::HeaderMap {
    fn authorization(&self) -> Option<&str> {
        self.get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }
}

impl CredentialCarrier for MetadataMap {
    fn authorization(&self) -> Option<&str> {
        self.get(AUTHORIZATION_KEY).and_then(|v| v.to_str().ok())
    }
}

/// Extract the token from a `Bearer <token>` value.
///
/// # Errors
/// `MissingHeader` when the carrier has no credential, `InvalidFormat` when
/// the scheme is not bearer or the token is empty.
pub fn bearer_token<C: CredentialCarrier + ?Sized>(carrier: &C) -> Result<&str, JwtError> {
    const BEARER_PREFIX: &str = "Bearer ";

    let header = carrier.authorization().ok_or(JwtError::MissingHeader)?;

    header
        .strip_prefix(BEARER_PREFIX)
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(JwtError::InvalidFormat)
}

/// Verifies bearer credentials and resolves the caller.
#[derive(Debug, Clone)]
pub struct Authenticator {
    validator: JwtValidator,
}

impl Authenticator {
    #[must_use]
    pub const fn new(validator: JwtValidator) -> Self {
        Self { validator }
    }

    /// Authenticate the credential found in `carrier`.
    ///
    /// # Errors
    /// Any [`JwtError`]: absent or malformed credential, bad signature,
    /// expired token, or a missing identity claim.
    pub fn authenticate<C: CredentialCarrier + ?Sized>(
        &self,
        carrier: &C,
    ) -> Result<Principal, JwtError> {
        let token = bearer_token(carrier)?;
        let identity = self.validator.validate(token)?;
        debug!(user_id = %identity, "Authenticated");
        Ok(Principal::new(identity))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use blog_core::DEFAULT_IDENTITY_KEY;
    use secrecy::SecretString;
    use tonic::metadata::MetadataValue;

    use super::*;

    fn validator() -> JwtValidator {
        JwtValidator::new(
            &SecretString::from("test_secret_key_minimum_32_chars!"),
            DEFAULT_IDENTITY_KEY,
            Duration::from_secs(600),
        )
    }

    fn metadata_with(value: &str) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert(AUTHORIZATION_KEY, MetadataValue::try_from(value).unwrap());
        metadata
    }

    #[test]
    fn missing_credential() {
        let auth = Authenticator::new(validator());
        assert!(matches!(
            auth.authenticate(&MetadataMap::new()),
            Err(JwtError::MissingHeader)
        ));
        assert!(matches!(
            auth.authenticate(&http::HeaderMap::new()),
            Err(JwtError::MissingHeader)
        ));
    }

    #[test]
    fn wrong_scheme_or_empty_token() {
        let auth = Authenticator::new(validator());
        assert!(matches!(
            auth.authenticate(&metadata_with("Basic dXNlcjpwYXNz")),
            Err(JwtError::InvalidFormat)
        ));
        assert!(matches!(
            auth.authenticate(&metadata_with("Bearer ")),
            Err(JwtError::InvalidFormat)
        ));
    }

    #[test]
    fn valid_token_on_both_carriers() {
        let validator = validator();
        let (token, _) = validator.sign("user-000000").unwrap();
        let auth = Authenticator::new(validator);

        let principal = auth
            .authenticate(&metadata_with(&format!("Bearer {token}")))
            .unwrap();
        assert_eq!(principal.as_str(), "user-000000");

        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_str(&format!("bearer {token}")).unwrap(),
        );
        assert_eq!(auth.authenticate(&headers).unwrap().as_str(), "user-000000");
    }

    #[test]
    fn tampered_token_rejected() {
        let validator = validator();
        let (token, _) = validator.sign("user-000000").unwrap();
        let auth = Authenticator::new(validator);

        let tampered = format!("Bearer {token}x");
        assert!(matches!(
            auth.authenticate(&metadata_with(&tampered)),
            Err(JwtError::InvalidToken)
        ));
    }
}
