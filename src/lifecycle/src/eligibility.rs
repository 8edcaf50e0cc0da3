//! Eligibility gate: blocks deletion while the account still hosts
//! upcoming sessions that have committed attendees.

use chrono::Utc;
use common::Store;
use uuid::Uuid;

/// Outcome of the read-only eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityDecision {
    pub can_delete: bool,
    pub reason: Option<String>,
    pub blocking_sessions: u64,
}

impl EligibilityDecision {
    fn allowed() -> Self {
        Self {
            can_delete: true,
            reason: None,
            blocking_sessions: 0,
        }
    }

    fn blocked(blocking_sessions: u64) -> Self {
        let plural = if blocking_sessions == 1 {
            "session"
        } else {
            "sessions"
        };
        Self {
            can_delete: false,
            reason: Some(format!(
                "You still host {blocking_sessions} upcoming {plural} with confirmed attendees. \
                 Cancel or complete them before deleting your account."
            )),
            blocking_sessions,
        }
    }
}

/// Never mutates anything; safe to call repeatedly and from the UI.
#[derive(Clone)]
pub struct EligibilityChecker {
    store: Store,
}

impl EligibilityChecker {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// A session blocks deletion when it is published or active, starts in
    /// the future, and at least one enrollment is confirmed or paid.
    pub async fn check(&self, account_id: Uuid) -> Result<EligibilityDecision, sqlx::Error> {
        let blocking = self
            .store
            .blocking_session_count(account_id, Utc::now())
            .await?;

        if blocking == 0 {
            Ok(EligibilityDecision::allowed())
        } else {
            tracing::info!(
                account_id = %account_id,
                blocking,
                "Deletion blocked by upcoming hosted sessions"
            );
            Ok(EligibilityDecision::blocked(blocking))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::model::{Enrollment, EnrollmentStatus, HostedSession, Profile, SessionStatus};

    async fn memory_store() -> Store {
        Store::new("sqlite::memory:").await.unwrap()
    }

    fn profile(email: &str) -> Profile {
        Profile {
            account_id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: email.split('@').next().unwrap_or("someone").to_string(),
            billing_customer_id: None,
            created_at: Utc::now(),
        }
    }

    async fn seed_session(
        store: &Store,
        host_id: Uuid,
        attendee_id: Uuid,
        starts_in: Duration,
        session_status: SessionStatus,
        enrollment_status: EnrollmentStatus,
    ) {
        let session = HostedSession {
            id: Uuid::new_v4(),
            host_id,
            title: "board games night".to_string(),
            starts_at: Utc::now() + starts_in,
            status: session_status,
        };
        store.insert_hosted_session(&session).await.unwrap();
        store
            .insert_enrollment(&Enrollment {
                id: Uuid::new_v4(),
                session_id: session.id,
                profile_id: attendee_id,
                status: enrollment_status,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_allows_account_with_no_sessions() {
        let store = memory_store().await;
        let checker = EligibilityChecker::new(store);

        let decision = checker.check(Uuid::new_v4()).await.unwrap();
        assert!(decision.can_delete);
        assert_eq!(decision.reason, None);
        assert_eq!(decision.blocking_sessions, 0);
    }

    #[tokio::test]
    async fn test_blocks_host_with_upcoming_committed_session() {
        let store = memory_store().await;
        let host = profile("host@example.com");
        let attendee = profile("attendee@example.com");
        store.insert_profile(&host).await.unwrap();
        store.insert_profile(&attendee).await.unwrap();
        seed_session(
            &store,
            host.account_id,
            attendee.account_id,
            Duration::days(3),
            SessionStatus::Published,
            EnrollmentStatus::Confirmed,
        )
        .await;

        let checker = EligibilityChecker::new(store);
        let decision = checker.check(host.account_id).await.unwrap();

        assert!(!decision.can_delete);
        assert_eq!(decision.blocking_sessions, 1);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("1 upcoming session"), "reason: {reason}");
    }

    #[tokio::test]
    async fn test_ignores_past_and_uncommitted_sessions() {
        let store = memory_store().await;
        let host = profile("host@example.com");
        let attendee = profile("attendee@example.com");
        store.insert_profile(&host).await.unwrap();
        store.insert_profile(&attendee).await.unwrap();

        // Already happened, even though the enrollment is paid
        seed_session(
            &store,
            host.account_id,
            attendee.account_id,
            Duration::days(-3),
            SessionStatus::Completed,
            EnrollmentStatus::Paid,
        )
        .await;
        // Upcoming but nobody committed yet
        seed_session(
            &store,
            host.account_id,
            attendee.account_id,
            Duration::days(3),
            SessionStatus::Published,
            EnrollmentStatus::Pending,
        )
        .await;
        // Upcoming and committed, but the host cancelled it
        seed_session(
            &store,
            host.account_id,
            attendee.account_id,
            Duration::days(3),
            SessionStatus::Cancelled,
            EnrollmentStatus::Confirmed,
        )
        .await;

        let checker = EligibilityChecker::new(store);
        let decision = checker.check(host.account_id).await.unwrap();
        assert!(decision.can_delete);
        assert_eq!(decision.blocking_sessions, 0);
    }
}
