//! Identity-provider seam
//!
//! The engine never mints or stores long-lived credentials; it consumes
//! bearer tokens through an injected [`TokenProvider`]. On an auth
//! failure the invoker forces exactly one `refresh` and retries once.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::sync::RwLock;

/// A bearer token; `Debug` redacts the secret
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value, for building the Authorization header
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BearerToken(****)")
    }
}

/// Interface to the external identity provider
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current token, possibly cached
    async fn token(&self) -> Result<BearerToken>;

    /// Force-refresh and return a new token
    async fn refresh(&self) -> Result<BearerToken>;
}

/// A provider returning a fixed token; for tests and single-tenant setups
pub struct StaticTokenProvider {
    token: RwLock<BearerToken>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(BearerToken::new(token)),
        }
    }

    /// Replace the stored token
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().unwrap() = BearerToken::new(token);
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<BearerToken> {
        Ok(self.token.read().unwrap().clone())
    }

    async fn refresh(&self) -> Result<BearerToken> {
        // A static provider has nothing to rotate to
        Err(EngineError::Auth(
            "static token provider cannot refresh".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let token = BearerToken::new("super-secret");
        assert_eq!(format!("{:?}", token), "BearerToken(****)");
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        assert_eq!(provider.token().await.unwrap().reveal(), "abc");
        assert!(provider.refresh().await.is_err());

        provider.set("def");
        assert_eq!(provider.token().await.unwrap().reveal(), "def");
    }
}
