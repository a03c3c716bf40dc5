//! API key verification
//!
//! Every protected request carries the shared secret in the `x-api-key`
//! header. The secret is held server-side; verification goes through the
//! [`Authenticator`] capability so the secret source can be swapped without
//! touching the HTTP layer.
//!
//! # Pure Functions
//!
//! No HTTP framework dependencies here; the axum middleware lives in the
//! service crate.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Header carrying the shared secret
pub const API_KEY_HEADER: &str = "x-api-key";

/// API key verification failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiKeyError {
    /// Header absent from the request
    #[error("Missing x-api-key header")]
    Missing,

    /// Header present but does not match the secret
    #[error("Invalid API key")]
    Mismatch,

    /// Secret could not be obtained from its backing store
    #[error("API key secret unavailable: {0}")]
    SecretUnavailable(String),
}

/// Capability that decides whether a presented API key is acceptable
///
/// Queried once per request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(&self, presented: Option<&str>) -> Result<(), ApiKeyError>;
}

/// Authenticator backed by a secret loaded at startup
#[derive(Clone)]
pub struct StaticKeyAuthenticator {
    secret: String,
}

impl StaticKeyAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for StaticKeyAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyAuthenticator")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Authenticator for StaticKeyAuthenticator {
    async fn verify(&self, presented: Option<&str>) -> Result<(), ApiKeyError> {
        verify_api_key(presented, &self.secret)
    }
}

/// Compare a presented key against the secret
///
/// An empty secret never matches.
pub fn verify_api_key(presented: Option<&str>, secret: &str) -> Result<(), ApiKeyError> {
    let presented = presented.ok_or(ApiKeyError::Missing)?;

    if secret.is_empty() || !keys_match(presented, secret) {
        return Err(ApiKeyError::Mismatch);
    }

    Ok(())
}

/// Compare two keys by SHA-256 digest so timing does not depend on the
/// length of the common prefix
fn keys_match(a: &str, b: &str) -> bool {
    let da = Sha256::digest(a.as_bytes());
    let db = Sha256::digest(b.as_bytes());

    da.iter()
        .zip(db.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_key_accepted() {
        assert_eq!(verify_api_key(Some("s3cret"), "s3cret"), Ok(()));
    }

    #[test]
    fn test_missing_key_rejected() {
        assert_eq!(verify_api_key(None, "s3cret"), Err(ApiKeyError::Missing));
    }

    #[test]
    fn test_wrong_key_rejected() {
        assert_eq!(
            verify_api_key(Some("s3cret "), "s3cret"),
            Err(ApiKeyError::Mismatch)
        );
        assert_eq!(
            verify_api_key(Some("S3CRET"), "s3cret"),
            Err(ApiKeyError::Mismatch)
        );
    }

    #[test]
    fn test_empty_secret_never_matches() {
        assert_eq!(verify_api_key(Some(""), ""), Err(ApiKeyError::Mismatch));
    }

    #[tokio::test]
    async fn test_static_authenticator() {
        let auth = StaticKeyAuthenticator::new("k");
        assert!(auth.verify(Some("k")).await.is_ok());
        assert!(auth.verify(Some("nope")).await.is_err());
        assert!(format!("{:?}", auth).contains("<redacted>"));
    }
}
