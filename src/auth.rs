//! Credential provider seam.
//!
//! Token acquisition and refresh live outside this crate. The session builder
//! only needs a bearer token string on demand; how it is obtained (IAM
//! exchange, Cloud Pak, a file on disk) is the caller's business.

use crate::error::RecognizeError;

/// Supplies a bearer token for the connection request.
///
/// Returning `Ok(None)` means "connect without an Authorization header",
/// which is valid against local or proxied endpoints.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<Option<String>, RecognizeError>;
}

/// A fixed, pre-fetched bearer token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl CredentialProvider for StaticToken {
    async fn bearer_token(&self) -> Result<Option<String>, RecognizeError> {
        Ok(Some(self.0.clone()))
    }
}

/// No authentication; never attaches an Authorization header.
pub struct NoAuth;

#[async_trait::async_trait]
impl CredentialProvider for NoAuth {
    async fn bearer_token(&self) -> Result<Option<String>, RecognizeError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_returns_its_token() {
        let provider = StaticToken::new("abc123");
        assert_eq!(provider.bearer_token().await.unwrap().as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn no_auth_returns_none() {
        assert!(NoAuth.bearer_token().await.unwrap().is_none());
    }
}
