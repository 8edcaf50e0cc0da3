//! Ordered relational cascade with a stepwise fallback.
//!
//! The primary strategy is a single transaction covering every delete; it
//! either commits fully or rolls back fully. The stepwise fallback runs the
//! same deletes as individual statements and is used only when the
//! transactional path could not start at all, so a fallback never re-runs
//! over a half-committed transaction.

use common::Store;
use common::db::{PurgeError, PurgeReport};
use common::model::SubscriptionSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rows removed for the account, as reported to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCounts {
    pub sessions: u64,
    pub enrollments: u64,
    pub audit_records: u64,
    pub profile: bool,
}

/// Everything a completed cascade hands to the later stages.
#[derive(Debug, Clone, Default)]
pub struct CascadeReport {
    pub deleted: DeletedCounts,
    /// Captured before the mirror row was deleted; the billing reconciler
    /// works from this, not from the (now gone) relational rows.
    pub subscription: Option<SubscriptionSnapshot>,
}

impl From<PurgeReport> for CascadeReport {
    fn from(report: PurgeReport) -> Self {
        Self {
            deleted: DeletedCounts {
                sessions: report.sessions,
                enrollments: report.enrollments,
                audit_records: report.audit_records,
                profile: report.profile_deleted,
            },
            subscription: report.subscription,
        }
    }
}

/// How one cascade attempt ended.
#[derive(Debug)]
pub enum CascadeOutcome {
    /// Every row belonging to the account is gone (possibly zero rows, for
    /// an account that was already purged).
    Completed(CascadeReport),
    /// Nothing was changed; the attempt can be retried safely.
    InvocationFailed(String),
    /// A strategy failed after deleting some rows. Fatal for this attempt;
    /// the remaining rows keep their referential integrity because deletes
    /// run children-first.
    PartialFailure(String),
}

#[derive(Clone)]
pub struct CascadeExecutor {
    store: Store,
}

impl CascadeExecutor {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn execute(&self, account_id: Uuid) -> CascadeOutcome {
        match self.store.purge_account(account_id).await {
            Ok(report) => {
                tracing::debug!(
                    account_id = %account_id,
                    sessions = report.sessions,
                    enrollments = report.enrollments,
                    audit_records = report.audit_records,
                    "Transactional purge committed"
                );
                CascadeOutcome::Completed(report.into())
            }
            Err(PurgeError::Aborted(e)) => {
                // The transaction rolled back, but its state is unknown
                // enough that re-running statements blind is not safe.
                tracing::error!(account_id = %account_id, error = %e, "Purge transaction aborted");
                CascadeOutcome::PartialFailure(format!("purge transaction aborted: {e}"))
            }
            Err(PurgeError::NotStarted(e)) => {
                tracing::warn!(
                    account_id = %account_id,
                    error = %e,
                    "Could not start purge transaction, falling back to stepwise deletes"
                );
                self.execute_stepwise(account_id).await
            }
        }
    }

    /// Same deletes, same order, one statement at a time. A failure before
    /// the first delete leaves the account untouched; a failure after it is
    /// reported as partial because some children are already gone.
    async fn execute_stepwise(&self, account_id: Uuid) -> CascadeOutcome {
        let subscription = match self.store.subscription_snapshot(account_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return CascadeOutcome::InvocationFailed(format!(
                    "subscription snapshot read failed: {e}"
                ));
            }
        };

        let mut deleted = DeletedCounts::default();
        let mut mutated = false;

        match self.store.delete_audit_records(account_id).await {
            Ok(n) => {
                deleted.audit_records = n;
                mutated |= n > 0;
            }
            Err(e) => return Self::stepwise_failure(mutated, "audit records", e),
        }

        match self.store.delete_attendee_enrollments(account_id).await {
            Ok(n) => {
                deleted.enrollments = n;
                mutated |= n > 0;
            }
            Err(e) => return Self::stepwise_failure(mutated, "attendee enrollments", e),
        }

        match self.store.delete_hosted_session_enrollments(account_id).await {
            Ok(n) => {
                deleted.enrollments += n;
                mutated |= n > 0;
            }
            Err(e) => return Self::stepwise_failure(mutated, "hosted-session enrollments", e),
        }

        match self.store.delete_hosted_sessions(account_id).await {
            Ok(n) => {
                deleted.sessions = n;
                mutated |= n > 0;
            }
            Err(e) => return Self::stepwise_failure(mutated, "hosted sessions", e),
        }

        match self.store.delete_subscription_record(account_id).await {
            Ok(n) => {
                mutated |= n > 0;
            }
            Err(e) => return Self::stepwise_failure(mutated, "subscription record", e),
        }

        match self.store.delete_profile(account_id).await {
            Ok(removed) => {
                deleted.profile = removed;
            }
            Err(e) => return Self::stepwise_failure(mutated, "profile", e),
        }

        tracing::info!(
            account_id = %account_id,
            sessions = deleted.sessions,
            enrollments = deleted.enrollments,
            audit_records = deleted.audit_records,
            "Stepwise cascade completed"
        );
        CascadeOutcome::Completed(CascadeReport {
            deleted,
            subscription,
        })
    }

    fn stepwise_failure(mutated: bool, step: &str, e: sqlx::Error) -> CascadeOutcome {
        let detail = format!("stepwise delete of {step} failed: {e}");
        if mutated {
            tracing::error!(step, error = %e, "Stepwise cascade failed after deleting rows");
            CascadeOutcome::PartialFailure(detail)
        } else {
            tracing::warn!(step, error = %e, "Stepwise cascade failed before deleting anything");
            CascadeOutcome::InvocationFailed(detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::model::{
        AuditRecord, Enrollment, EnrollmentStatus, HostedSession, Profile, SessionStatus,
        SubscriptionRecord,
    };

    async fn memory_store() -> Store {
        Store::new("sqlite::memory:").await.unwrap()
    }

    fn profile(email: &str) -> Profile {
        Profile {
            account_id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: "someone".to_string(),
            billing_customer_id: Some("cus_test".to_string()),
            created_at: Utc::now(),
        }
    }

    /// Host with one past session (one attendee), one enrollment of their
    /// own elsewhere, two audit rows and a subscription mirror row.
    async fn seed_account(store: &Store) -> (Uuid, Uuid) {
        let host = profile("host@example.com");
        let other = profile("other@example.com");
        store.insert_profile(&host).await.unwrap();
        store.insert_profile(&other).await.unwrap();

        let own_session = HostedSession {
            id: Uuid::new_v4(),
            host_id: host.account_id,
            title: "book club".to_string(),
            starts_at: Utc::now() - Duration::days(7),
            status: SessionStatus::Completed,
        };
        let others_session = HostedSession {
            id: Uuid::new_v4(),
            host_id: other.account_id,
            title: "hiking".to_string(),
            starts_at: Utc::now() + Duration::days(7),
            status: SessionStatus::Published,
        };
        store.insert_hosted_session(&own_session).await.unwrap();
        store.insert_hosted_session(&others_session).await.unwrap();

        for (session_id, profile_id) in [
            (own_session.id, other.account_id),
            (others_session.id, host.account_id),
        ] {
            store
                .insert_enrollment(&Enrollment {
                    id: Uuid::new_v4(),
                    session_id,
                    profile_id,
                    status: EnrollmentStatus::Confirmed,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        for action in ["login", "profile_update"] {
            store
                .insert_audit_record(&AuditRecord {
                    id: Uuid::new_v4(),
                    profile_id: host.account_id,
                    action: action.to_string(),
                    detail: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        store
            .upsert_subscription_record(&SubscriptionRecord {
                profile_id: host.account_id,
                subscription_id: "sub_42".to_string(),
                customer_id: "cus_test".to_string(),
                status: "active".to_string(),
                current_period_end: Some(Utc::now() + Duration::days(20)),
            })
            .await
            .unwrap();

        (host.account_id, other.account_id)
    }

    fn completed(outcome: CascadeOutcome) -> CascadeReport {
        match outcome {
            CascadeOutcome::Completed(report) => report,
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_removes_all_account_rows() {
        let store = memory_store().await;
        let (account_id, other_id) = seed_account(&store).await;

        let executor = CascadeExecutor::new(store.clone());
        let report = completed(executor.execute(account_id).await);

        assert_eq!(report.deleted.sessions, 1);
        assert_eq!(report.deleted.enrollments, 2);
        assert_eq!(report.deleted.audit_records, 2);
        assert!(report.deleted.profile);
        let snapshot = report.subscription.unwrap();
        assert_eq!(snapshot.subscription_id, "sub_42");

        assert!(store.get_profile(account_id).await.unwrap().is_none());
        // The other member is untouched
        assert!(store.get_profile(other_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_execute_is_idempotent_for_absent_account() {
        let store = memory_store().await;
        let executor = CascadeExecutor::new(store);

        let report = completed(executor.execute(Uuid::new_v4()).await);
        assert_eq!(report.deleted, DeletedCounts::default());
        assert!(report.subscription.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_invocation_failure() {
        let store = memory_store().await;
        store.close().await;

        let executor = CascadeExecutor::new(store);
        match executor.execute(Uuid::new_v4()).await {
            CascadeOutcome::InvocationFailed(detail) => {
                assert!(detail.contains("snapshot"), "detail: {detail}");
            }
            other => panic!("expected InvocationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stepwise_matches_transactional_counts() {
        let store = memory_store().await;
        let (account_id, _) = seed_account(&store).await;

        let executor = CascadeExecutor::new(store.clone());
        let report = completed(executor.execute_stepwise(account_id).await);

        assert_eq!(report.deleted.sessions, 1);
        assert_eq!(report.deleted.enrollments, 2);
        assert_eq!(report.deleted.audit_records, 2);
        assert!(report.deleted.profile);
        assert_eq!(report.subscription.unwrap().customer_id, "cus_test");
        assert!(store.get_profile(account_id).await.unwrap().is_none());
    }

    #[test]
    fn test_purge_report_conversion() {
        let report = CascadeReport::from(PurgeReport {
            audit_records: 4,
            enrollments: 3,
            sessions: 2,
            subscription_rows: 1,
            profile_deleted: true,
            subscription: None,
        });
        assert_eq!(
            report.deleted,
            DeletedCounts {
                sessions: 2,
                enrollments: 3,
                audit_records: 4,
                profile: true,
            }
        );
    }
}
