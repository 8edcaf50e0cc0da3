//! Core bearer-token validation
//!
//! Static tokens from configuration are checked first (no network hop);
//! anything else is handed to the identity provider for verification.

use super::{AccountContext, AuthError, CredentialSource};
use crate::config::AuthConfig;
use crate::identity::{IdentityError, IdentityProvider};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Core authenticator for bearer-token validation
pub struct Authenticator {
    /// Identity provider for dynamic token verification
    identity: Arc<dyn IdentityProvider>,
    /// Static tokens indexed by token hash -> (account_id, email)
    static_tokens: HashMap<String, (Uuid, String)>,
}

impl Authenticator {
    /// Create a new Authenticator from configuration and an identity provider
    pub fn new(auth_config: AuthConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        let mut static_tokens = HashMap::new();

        for entry in auth_config.static_tokens {
            let token_hash = Self::hash_token(&entry.token);
            static_tokens.insert(token_hash, (entry.account_id, entry.email));
        }

        Self {
            identity,
            static_tokens,
        }
    }

    /// Authenticate a request using its bearer token
    ///
    /// # Returns
    /// * `Ok(AccountContext)` - token resolved to an account
    /// * `Err(AuthError)` - authentication failed (400/401)
    pub async fn authenticate(&self, token: &str) -> Result<AccountContext, AuthError> {
        // Raw tokens never sit in the map, only their hashes
        let token_hash = Self::hash_token(token);

        if let Some((account_id, email)) = self.static_tokens.get(&token_hash) {
            return Ok(AccountContext::new(
                *account_id,
                email.clone(),
                CredentialSource::Config,
            ));
        }

        match self.identity.verify_token(token).await {
            Ok(identity) => Ok(AccountContext::new(
                identity.account_id,
                identity.email,
                CredentialSource::Provider,
            )),
            Err(IdentityError::NotFound) | Err(IdentityError::Unauthorized) => {
                Err(AuthError::unauthorized("Invalid or expired bearer token"))
            }
            Err(e) => Err(AuthError::unauthorized(format!(
                "Token verification failed: {e}"
            ))),
        }
    }

    /// Hash a bearer token using SHA-256
    fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticTokenConfig;
    use crate::testing::StaticIdentityProvider;

    fn static_token(token: &str, account_id: Uuid) -> StaticTokenConfig {
        StaticTokenConfig {
            token: token.to_string(),
            account_id,
            email: "person@example.com".to_string(),
        }
    }

    #[test]
    fn test_hash_token() {
        let token = "test-token-12345";
        let hash1 = Authenticator::hash_token(token);
        let hash2 = Authenticator::hash_token(token);

        // Hashes should be deterministic
        assert_eq!(hash1, hash2);

        // Hash should be 64 hex characters (SHA-256)
        assert_eq!(hash1.len(), 64);

        // Different tokens should have different hashes
        let different_hash = Authenticator::hash_token("different-token");
        assert_ne!(hash1, different_hash);
    }

    #[tokio::test]
    async fn test_static_token_authentication() {
        let account_id = Uuid::new_v4();
        let identity = Arc::new(StaticIdentityProvider::new());
        let auth_config = AuthConfig {
            static_tokens: vec![static_token("dev-token-1", account_id)],
        };
        let authenticator = Authenticator::new(auth_config, identity);

        let ctx = authenticator.authenticate("dev-token-1").await.unwrap();
        assert_eq!(ctx.account_id, account_id);
        assert_eq!(ctx.email, "person@example.com");
        assert_eq!(ctx.source, CredentialSource::Config);
    }

    #[tokio::test]
    async fn test_provider_token_authentication() {
        let identity = Arc::new(StaticIdentityProvider::new());
        let account_id = identity.register("provider-token", "live@example.com");

        let authenticator = Authenticator::new(AuthConfig::default(), identity);

        let ctx = authenticator.authenticate("provider-token").await.unwrap();
        assert_eq!(ctx.account_id, account_id);
        assert_eq!(ctx.email, "live@example.com");
        assert_eq!(ctx.source, CredentialSource::Provider);
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let identity = Arc::new(StaticIdentityProvider::new());
        let authenticator = Authenticator::new(AuthConfig::default(), identity);

        let result = authenticator.authenticate("unknown-token").await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.status_code, 401);
    }

    #[tokio::test]
    async fn test_static_tokens_win_over_provider() {
        let account_id = Uuid::new_v4();
        let identity = Arc::new(StaticIdentityProvider::new());
        // The same token is also known to the provider under a different account
        identity.register("shared-token", "other@example.com");

        let auth_config = AuthConfig {
            static_tokens: vec![static_token("shared-token", account_id)],
        };
        let authenticator = Authenticator::new(auth_config, identity);

        let ctx = authenticator.authenticate("shared-token").await.unwrap();
        assert_eq!(ctx.account_id, account_id);
        assert_eq!(ctx.source, CredentialSource::Config);
    }
}
