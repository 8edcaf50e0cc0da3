use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::IdentityConfig;

/// An authenticated account as the identity provider knows it.
#[derive(Debug, Clone)]
pub struct AccountIdentity {
    pub account_id: Uuid,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider has no record under this account id. During revocation
    /// this means the credential is already gone and counts as success.
    #[error("account not found at identity provider")]
    NotFound,
    /// The presented credential was rejected.
    #[error("identity provider rejected the credential")]
    Unauthorized,
    /// Timeout, connection failure, or a 5xx. Worth retrying.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    /// Any other provider-side rejection. Retrying will not help.
    #[error("identity provider error: {0}")]
    Provider(String),
}

impl IdentityError {
    pub fn is_transient(&self) -> bool {
        matches!(self, IdentityError::Unavailable(_))
    }
}

/// Boundary to the hosted identity provider.
///
/// `delete_account` is the irreversible step of the deletion flow: once it
/// succeeds the account can no longer sign in anywhere.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a user-supplied bearer token to the account it belongs to.
    async fn verify_token(&self, token: &str) -> Result<AccountIdentity, IdentityError>;

    /// Delete the credential record for an account.
    async fn delete_account(&self, account_id: Uuid) -> Result<(), IdentityError>;
}

/// GoTrue-style user object, as returned by `/user` and `/admin/users/{id}`.
#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    email: Option<String>,
}

impl UserPayload {
    fn into_identity(self) -> Result<AccountIdentity, IdentityError> {
        let account_id = Uuid::parse_str(&self.id)
            .map_err(|_| IdentityError::Provider(format!("malformed user id '{}'", self.id)))?;
        Ok(AccountIdentity {
            account_id,
            email: self.email.unwrap_or_default(),
        })
    }
}

/// HTTP client for the identity provider's user and admin endpoints.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &IdentityConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        })
    }

    fn user_url(&self) -> String {
        format!("{}/user", self.base_url)
    }

    fn admin_user_url(&self, account_id: Uuid) -> String {
        format!("{}/admin/users/{account_id}", self.base_url)
    }

    fn classify_status(status: StatusCode, detail: String) -> IdentityError {
        match status {
            StatusCode::NOT_FOUND => IdentityError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => IdentityError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => IdentityError::Unavailable(detail),
            s if s.is_server_error() => IdentityError::Unavailable(detail),
            _ => IdentityError::Provider(detail),
        }
    }

    fn transport_error(e: reqwest::Error) -> IdentityError {
        IdentityError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<AccountIdentity, IdentityError> {
        let response = self
            .client
            .get(self.user_url())
            .bearer_auth(token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(
                status,
                format!("token verification returned {status}"),
            ));
        }

        let payload: UserPayload = response
            .json()
            .await
            .map_err(|e| IdentityError::Provider(format!("malformed user payload: {e}")))?;
        payload.into_identity()
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<(), IdentityError> {
        let response = self
            .client
            .delete(self.admin_user_url(account_id))
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::classify_status(
            status,
            format!("account deletion returned {status}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base_url: &str) -> HttpIdentityProvider {
        HttpIdentityProvider::new(&IdentityConfig {
            base_url: base_url.to_string(),
            ..IdentityConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_urls_tolerate_trailing_slash() {
        let account_id = Uuid::new_v4();
        let p = provider("http://identity.test/");
        assert_eq!(p.user_url(), "http://identity.test/user");
        assert_eq!(
            p.admin_user_url(account_id),
            format!("http://identity.test/admin/users/{account_id}")
        );
    }

    #[test]
    fn test_status_classification() {
        let err = HttpIdentityProvider::classify_status(StatusCode::NOT_FOUND, "_".into());
        assert!(matches!(err, IdentityError::NotFound));
        assert!(!err.is_transient());

        let err = HttpIdentityProvider::classify_status(StatusCode::UNAUTHORIZED, "_".into());
        assert!(matches!(err, IdentityError::Unauthorized));

        let err = HttpIdentityProvider::classify_status(StatusCode::SERVICE_UNAVAILABLE, "_".into());
        assert!(err.is_transient());

        let err = HttpIdentityProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, "_".into());
        assert!(err.is_transient());

        let err = HttpIdentityProvider::classify_status(StatusCode::UNPROCESSABLE_ENTITY, "_".into());
        assert!(matches!(err, IdentityError::Provider(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_user_payload_conversion() {
        let account_id = Uuid::new_v4();
        let payload = UserPayload {
            id: account_id.to_string(),
            email: Some("person@example.com".to_string()),
        };
        let identity = payload.into_identity().unwrap();
        assert_eq!(identity.account_id, account_id);
        assert_eq!(identity.email, "person@example.com");

        let bad = UserPayload {
            id: "not-a-uuid".to_string(),
            email: None,
        };
        assert!(matches!(bad.into_identity(), Err(IdentityError::Provider(_))));
    }
}
