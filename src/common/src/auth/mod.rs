//! Bearer-token authentication for account-facing endpoints
//!
//! Tokens are resolved either from static entries in configuration (local
//! development, tests) or against the identity provider. Handlers receive
//! the resolved [`AccountContext`] and never see the raw token.

mod authenticator;
mod middleware;

pub use authenticator::Authenticator;
pub use middleware::{AccountContextExtractor, auth_middleware};

use uuid::Uuid;

/// The authenticated account behind a request.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub account_id: Uuid,
    pub email: String,
    /// Where the token was resolved (config entry or identity provider)
    pub source: CredentialSource,
}

impl AccountContext {
    pub fn new(account_id: Uuid, email: String, source: CredentialSource) -> Self {
        Self {
            account_id,
            email,
            source,
        }
    }
}

/// Source of a resolved credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Static token defined in configuration
    Config,
    /// Token verified against the identity provider
    Provider,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Provider => write!(f, "provider"),
        }
    }
}

/// Authentication error with HTTP status code
#[derive(Debug, Clone)]
pub struct AuthError {
    /// HTTP status code (400, 401)
    pub status_code: u16,
    /// Error message for client
    pub message: String,
}

impl AuthError {
    /// Create a 400 Bad Request error (missing/malformed Authorization header)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status_code: 400,
            message: message.into(),
        }
    }

    /// Create a 401 Unauthorized error (unknown or rejected token)
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status_code: 401,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status_code, self.message)
    }
}

impl std::error::Error for AuthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_context_creation() {
        let account_id = Uuid::new_v4();
        let ctx = AccountContext::new(
            account_id,
            "person@example.com".to_string(),
            CredentialSource::Config,
        );

        assert_eq!(ctx.account_id, account_id);
        assert_eq!(ctx.email, "person@example.com");
        assert_eq!(ctx.source, CredentialSource::Config);
    }

    #[test]
    fn test_credential_source_display() {
        assert_eq!(CredentialSource::Config.to_string(), "config");
        assert_eq!(CredentialSource::Provider.to_string(), "provider");
    }

    #[test]
    fn test_auth_error_constructors() {
        let bad_request = AuthError::bad_request("Missing Authorization header");
        assert_eq!(bad_request.status_code, 400);
        assert_eq!(bad_request.message, "Missing Authorization header");

        let unauthorized = AuthError::unauthorized("Invalid bearer token");
        assert_eq!(unauthorized.status_code, 401);
        assert_eq!(unauthorized.message, "Invalid bearer token");
    }

    #[test]
    fn test_auth_error_display() {
        let error = AuthError::unauthorized("Invalid bearer token");
        assert_eq!(error.to_string(), "401: Invalid bearer token");
    }
}
