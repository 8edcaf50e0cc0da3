use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::config::BillingConfig;

/// Provider-side view of a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionState {
    pub subscription_id: String,
    pub customer_id: String,
    pub status: String,
    /// True once the subscription is set to lapse at the end of the current
    /// paid period instead of renewing.
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    pub fn is_active_like(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing" | "past_due")
    }
}

#[derive(Debug, Error)]
pub enum BillingError {
    /// The provider has no such subscription; the local mirror was stale.
    #[error("subscription not found at billing provider")]
    NotFound,
    /// Timeout, connection failure, rate limit, or a 5xx. Worth retrying.
    #[error("billing provider unavailable: {0}")]
    Unavailable(String),
    /// Rejected request (bad key, malformed id, ...). Retrying will not help.
    #[error("billing provider error: {0}")]
    Provider(String),
}

impl BillingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BillingError::Unavailable(_))
    }
}

/// Boundary to the billing provider.
///
/// The deletion flow only ever stops a future renewal. It never cancels a
/// subscription immediately and never issues a refund, so attendees keep
/// whatever period they already paid for.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionState, BillingError>;

    /// Flag the subscription to lapse at period end. Idempotent on the
    /// provider side; calling it on an already-flagged subscription is a
    /// no-op.
    async fn cancel_at_period_end(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionState, BillingError>;
}

/// Stripe-style subscription object. `current_period_end` arrives as epoch
/// seconds.
#[derive(Debug, Deserialize)]
struct SubscriptionPayload {
    id: String,
    customer: String,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
    current_period_end: Option<i64>,
}

impl SubscriptionPayload {
    fn into_state(self) -> SubscriptionState {
        SubscriptionState {
            subscription_id: self.id,
            customer_id: self.customer,
            status: self.status,
            cancel_at_period_end: self.cancel_at_period_end,
            current_period_end: self
                .current_period_end
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        }
    }
}

/// HTTP client for the billing provider's subscription endpoints.
pub struct HttpBillingProvider {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HttpBillingProvider {
    pub fn new(config: &BillingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn subscription_url(&self, subscription_id: &str) -> String {
        format!("{}/v1/subscriptions/{subscription_id}", self.base_url)
    }

    fn classify_status(status: StatusCode, detail: String) -> BillingError {
        match status {
            StatusCode::NOT_FOUND => BillingError::NotFound,
            StatusCode::TOO_MANY_REQUESTS => BillingError::Unavailable(detail),
            s if s.is_server_error() => BillingError::Unavailable(detail),
            _ => BillingError::Provider(detail),
        }
    }

    fn transport_error(e: reqwest::Error) -> BillingError {
        BillingError::Unavailable(e.to_string())
    }

    async fn read_subscription(
        response: reqwest::Response,
        context: &str,
    ) -> Result<SubscriptionState, BillingError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(
                status,
                format!("{context} returned {status}"),
            ));
        }
        let payload: SubscriptionPayload = response
            .json()
            .await
            .map_err(|e| BillingError::Provider(format!("malformed subscription payload: {e}")))?;
        Ok(payload.into_state())
    }
}

#[async_trait]
impl BillingProvider for HttpBillingProvider {
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionState, BillingError> {
        let response = self
            .client
            .get(self.subscription_url(subscription_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::read_subscription(response, "subscription fetch").await
    }

    async fn cancel_at_period_end(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionState, BillingError> {
        let response = self
            .client
            .post(self.subscription_url(subscription_id))
            .bearer_auth(&self.secret_key)
            .form(&[("cancel_at_period_end", "true")])
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::read_subscription(response, "renewal cancellation").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_url() {
        let provider = HttpBillingProvider::new(&BillingConfig {
            base_url: "http://billing.test/".to_string(),
            ..BillingConfig::default()
        })
        .unwrap();
        assert_eq!(
            provider.subscription_url("sub_123"),
            "http://billing.test/v1/subscriptions/sub_123"
        );
    }

    #[test]
    fn test_status_classification() {
        let err = HttpBillingProvider::classify_status(StatusCode::NOT_FOUND, "_".into());
        assert!(matches!(err, BillingError::NotFound));
        assert!(!err.is_transient());

        let err = HttpBillingProvider::classify_status(StatusCode::BAD_GATEWAY, "_".into());
        assert!(err.is_transient());

        let err = HttpBillingProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, "_".into());
        assert!(err.is_transient());

        let err = HttpBillingProvider::classify_status(StatusCode::UNAUTHORIZED, "_".into());
        assert!(matches!(err, BillingError::Provider(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_payload_conversion_maps_epoch_seconds() {
        let payload = SubscriptionPayload {
            id: "sub_123".to_string(),
            customer: "cus_9".to_string(),
            status: "active".to_string(),
            cancel_at_period_end: false,
            current_period_end: Some(1_767_225_600), // 2026-01-01T00:00:00Z
        };
        let state = payload.into_state();
        assert_eq!(state.subscription_id, "sub_123");
        assert_eq!(state.customer_id, "cus_9");
        assert!(state.is_active_like());
        assert!(!state.cancel_at_period_end);
        assert_eq!(
            state.current_period_end.unwrap().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_active_like_statuses() {
        let mut state = SubscriptionState {
            subscription_id: "sub_1".to_string(),
            customer_id: "cus_1".to_string(),
            status: "trialing".to_string(),
            cancel_at_period_end: false,
            current_period_end: None,
        };
        assert!(state.is_active_like());

        state.status = "canceled".to_string();
        assert!(!state.is_active_like());

        state.status = "incomplete_expired".to_string();
        assert!(!state.is_active_like());
    }
}
