//! Drives one account deletion through its ordered stages.
//!
//! The stages are intentionally sequential: the billing snapshot must be
//! captured before the cascade removes the mirror row, and identity
//! revocation must come after the cascade because it is irreversible.
//! Billing and storage failures are absorbed; eligibility, cascade and
//! identity failures end the attempt with a stage-tagged result.

use std::sync::Arc;

use common::Store;
use common::billing::BillingProvider;
use common::identity::{IdentityError, IdentityProvider};
use object_store::ObjectStore;
use uuid::Uuid;

use crate::billing::BillingReconciler;
use crate::cascade::{CascadeExecutor, CascadeOutcome};
use crate::eligibility::EligibilityChecker;
use crate::reclaim::StorageReclaimer;
use crate::report::{DeletionResult, DeletionStage};
use crate::retry::{RetryPolicy, retry_transient};

pub struct DeletionOrchestrator {
    eligibility: EligibilityChecker,
    cascade: CascadeExecutor,
    billing: BillingReconciler,
    reclaimer: StorageReclaimer,
    identity: Arc<dyn IdentityProvider>,
    identity_retry: RetryPolicy,
}

impl DeletionOrchestrator {
    pub fn new(
        store: Store,
        object_store: Arc<dyn ObjectStore>,
        billing: Arc<dyn BillingProvider>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::with_retry_policies(
            store,
            object_store,
            billing,
            identity,
            RetryPolicy::default(),
            RetryPolicy::default(),
        )
    }

    pub fn with_retry_policies(
        store: Store,
        object_store: Arc<dyn ObjectStore>,
        billing: Arc<dyn BillingProvider>,
        identity: Arc<dyn IdentityProvider>,
        billing_retry: RetryPolicy,
        identity_retry: RetryPolicy,
    ) -> Self {
        Self {
            eligibility: EligibilityChecker::new(store.clone()),
            cascade: CascadeExecutor::new(store),
            billing: BillingReconciler::new(billing, billing_retry),
            reclaimer: StorageReclaimer::new(object_store),
            identity,
            identity_retry,
        }
    }

    /// The eligibility gate, shared with the read-only endpoint.
    pub fn eligibility(&self) -> &EligibilityChecker {
        &self.eligibility
    }

    /// Runs the whole deletion for one account and always returns a
    /// structured result; no backend error escapes as-is.
    pub async fn run(&self, account_id: Uuid) -> DeletionResult {
        tracing::info!(account_id = %account_id, "Starting account deletion");

        let decision = match self.eligibility.check(account_id).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(account_id = %account_id, error = %e, "Eligibility check failed");
                return DeletionResult::retryable(format!("could not check eligibility: {e}"));
            }
        };
        if !decision.can_delete {
            return DeletionResult::blocked(decision.reason.unwrap_or_else(|| {
                "Account still hosts upcoming sessions with confirmed attendees".to_string()
            }));
        }

        let report = match self.cascade.execute(account_id).await {
            CascadeOutcome::Completed(report) => report,
            CascadeOutcome::InvocationFailed(detail) => {
                return DeletionResult::failed(DeletionStage::Cascade, detail);
            }
            CascadeOutcome::PartialFailure(detail) => {
                return DeletionResult::failed(DeletionStage::Cascade, detail);
            }
        };

        // Non-fatal from here until identity: a billing or storage outage
        // must not leave a ghost account.
        let subscription = self.billing.reconcile(report.subscription.as_ref()).await;
        let reclaimed = self.reclaimer.reclaim(account_id).await;

        let revocation = retry_transient(
            &self.identity_retry,
            "identity.delete_account",
            IdentityError::is_transient,
            || self.identity.delete_account(account_id),
        )
        .await;

        match revocation {
            Ok(()) => {}
            Err(IdentityError::NotFound) => {
                tracing::info!(
                    account_id = %account_id,
                    "Identity already absent, treating revocation as done"
                );
            }
            Err(e) => {
                tracing::error!(
                    account_id = %account_id,
                    error = %e,
                    "Identity revocation failed after the cascade; account is partially deleted"
                );
                return DeletionResult::identity_failed(
                    report.deleted,
                    subscription,
                    reclaimed.objects_removed,
                    format!("identity revocation failed: {e}"),
                );
            }
        }

        tracing::info!(
            account_id = %account_id,
            sessions = report.deleted.sessions,
            enrollments = report.deleted.enrollments,
            audit_records = report.deleted.audit_records,
            storage_objects = reclaimed.objects_removed,
            "Account deletion complete"
        );
        DeletionResult::succeeded(report.deleted, subscription, reclaimed.objects_removed)
    }
}
