//! Billing reconciliation: stop the subscription from renewing, nothing
//! more. Deletion never refunds and never revokes entitlements early, and a
//! billing outage never blocks the deletion itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::billing::{BillingError, BillingProvider};
use common::model::SubscriptionSnapshot;
use serde::{Deserialize, Serialize};

use crate::retry::{RetryPolicy, retry_transient};

/// What happened to the subscription, as reported to the caller.
///
/// `effective_expiry` is only ever the provider's current period end, so a
/// paid member keeps their entitlements until the date they already paid
/// for, even though their relational data is gone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDisposition {
    pub had_active_subscription: bool,
    pub renewal_cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_expiry: Option<DateTime<Utc>>,
}

pub struct BillingReconciler {
    provider: Arc<dyn BillingProvider>,
    retry: RetryPolicy,
}

impl BillingReconciler {
    pub fn new(provider: Arc<dyn BillingProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Reconciles against the snapshot captured before the cascade deleted
    /// the mirror row. Provider failures are logged and reported as
    /// `renewal_cancelled = false`; they never propagate.
    pub async fn reconcile(&self, snapshot: Option<&SubscriptionSnapshot>) -> BillingDisposition {
        let Some(snapshot) = snapshot else {
            tracing::debug!("No subscription mirror captured, nothing to reconcile");
            return BillingDisposition::default();
        };

        if !snapshot.is_active_like() {
            tracing::debug!(
                subscription_id = %snapshot.subscription_id,
                status = %snapshot.status,
                "Mirrored subscription already inactive, nothing to reconcile"
            );
            return BillingDisposition::default();
        }

        let subscription_id = snapshot.subscription_id.clone();

        let current = match retry_transient(
            &self.retry,
            "billing.fetch_subscription",
            BillingError::is_transient,
            || self.provider.fetch_subscription(&subscription_id),
        )
        .await
        {
            Ok(state) => state,
            Err(BillingError::NotFound) => {
                tracing::info!(
                    subscription_id,
                    "Subscription no longer exists at the provider"
                );
                return BillingDisposition::default();
            }
            Err(e) => {
                tracing::error!(
                    subscription_id,
                    error = %e,
                    "Could not read subscription from billing provider; renewal left untouched"
                );
                return BillingDisposition {
                    had_active_subscription: true,
                    renewal_cancelled: false,
                    effective_expiry: None,
                };
            }
        };

        if !current.is_active_like() {
            tracing::info!(
                subscription_id,
                status = %current.status,
                "Provider shows the subscription inactive, nothing to cancel"
            );
            return BillingDisposition::default();
        }

        if current.cancel_at_period_end {
            tracing::info!(subscription_id, "Renewal already scheduled to stop");
            return BillingDisposition {
                had_active_subscription: true,
                renewal_cancelled: true,
                effective_expiry: current.current_period_end,
            };
        }

        match retry_transient(
            &self.retry,
            "billing.cancel_at_period_end",
            BillingError::is_transient,
            || self.provider.cancel_at_period_end(&subscription_id),
        )
        .await
        {
            Ok(updated) => {
                tracing::info!(
                    subscription_id,
                    period_end = ?updated.current_period_end,
                    "Subscription set to end at period close"
                );
                BillingDisposition {
                    had_active_subscription: true,
                    renewal_cancelled: true,
                    effective_expiry: updated.current_period_end,
                }
            }
            Err(e) => {
                tracing::error!(
                    subscription_id,
                    error = %e,
                    "Could not stop subscription renewal; deletion continues, needs manual follow-up"
                );
                BillingDisposition {
                    had_active_subscription: true,
                    renewal_cancelled: false,
                    effective_expiry: None,
                }
            }
        }
    }
}
