//! Full-service test context
//!
//! Wires the real router, auth middleware included, over an in-memory
//! store, a failure-injectable media store and fake identity/billing
//! providers, so tests exercise exactly what a client sees.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Duration, Utc};
use common::Store;
use common::model::{
    AuditRecord, Enrollment, EnrollmentStatus, HostedSession, Profile, SessionStatus,
    SubscriptionRecord,
};
use common::testing::{
    FakeBillingProvider, FlakyObjectStore, StaticIdentityProvider, TestConfigBuilder,
};
use futures::StreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use router::{AppState, create_router};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// A member account registered with the service under test.
pub struct SeededAccount {
    pub account_id: Uuid,
    pub token: String,
    pub email: String,
}

/// The whole service stood up over in-memory backends.
///
/// Two accounts are registered up front: `member`, the account the test
/// acts on, and `bystander`, whose data must survive whatever the test
/// does to the member.
pub struct AppContext {
    pub app: axum::Router,
    pub store: Store,
    pub media: Arc<FlakyObjectStore>,
    pub billing: Arc<FakeBillingProvider>,
    pub identity: Arc<StaticIdentityProvider>,
    pub member: SeededAccount,
    pub bystander: SeededAccount,
}

impl AppContext {
    pub async fn new() -> Self {
        let store = Store::new("sqlite::memory:")
            .await
            .expect("in-memory store");

        let member = SeededAccount {
            account_id: Uuid::new_v4(),
            token: "member-token".to_string(),
            email: "member@example.com".to_string(),
        };
        let bystander = SeededAccount {
            account_id: Uuid::new_v4(),
            token: "bystander-token".to_string(),
            email: "bystander@example.com".to_string(),
        };

        let mut config = TestConfigBuilder::new()
            .in_memory()
            .with_static_token(&member.token, member.account_id, &member.email)
            .with_static_token(&bystander.token, bystander.account_id, &bystander.email)
            .build();
        // Keep retry backoff out of the test clock
        config.billing.retry_base_delay = std::time::Duration::from_millis(1);
        config.identity.retry_base_delay = std::time::Duration::from_millis(1);

        let identity = Arc::new(StaticIdentityProvider::new());
        for account in [&member, &bystander] {
            store
                .insert_profile(&Profile {
                    account_id: account.account_id,
                    email: account.email.clone(),
                    display_name: account.email.clone(),
                    billing_customer_id: None,
                    created_at: Utc::now(),
                })
                .await
                .expect("profile insert");
            identity.register_account(account.account_id, &account.email);
        }

        let media = Arc::new(FlakyObjectStore::new());
        let billing = Arc::new(FakeBillingProvider::new());

        let state = AppState::new(
            store.clone(),
            media.clone(),
            billing.clone(),
            identity.clone(),
            &config,
        );
        let app = create_router(state);

        Self {
            app,
            store,
            media,
            billing,
            identity,
            member,
            bystander,
        }
    }

    /// Host a session starting `starts_in` from now with the given status,
    /// enrolling each `(attendee, status)` pair. Returns the session id.
    pub async fn seed_hosted_session(
        &self,
        host: Uuid,
        starts_in: Duration,
        status: SessionStatus,
        enrollments: &[(Uuid, EnrollmentStatus)],
    ) -> Uuid {
        let session_id = Uuid::new_v4();
        self.store
            .insert_hosted_session(&HostedSession {
                id: session_id,
                host_id: host,
                title: format!("session-{}", session_id.simple()),
                starts_at: Utc::now() + starts_in,
                status,
            })
            .await
            .expect("session insert");

        for (attendee, enrollment_status) in enrollments {
            self.store
                .insert_enrollment(&Enrollment {
                    id: Uuid::new_v4(),
                    session_id,
                    profile_id: *attendee,
                    status: *enrollment_status,
                    created_at: Utc::now(),
                })
                .await
                .expect("enrollment insert");
        }

        session_id
    }

    /// Member data in every corner of the schema: a completed hosted
    /// session with the bystander enrolled, an enrollment in the
    /// bystander's upcoming session, and two audit entries. None of it
    /// blocks deletion.
    pub async fn seed_member_history(&self) {
        self.seed_hosted_session(
            self.member.account_id,
            Duration::days(-30),
            SessionStatus::Completed,
            &[(self.bystander.account_id, EnrollmentStatus::Paid)],
        )
        .await;

        self.seed_hosted_session(
            self.bystander.account_id,
            Duration::days(3),
            SessionStatus::Published,
            &[(self.member.account_id, EnrollmentStatus::Paid)],
        )
        .await;

        for action in ["login", "profile.update"] {
            self.store
                .insert_audit_record(&AuditRecord {
                    id: Uuid::new_v4(),
                    profile_id: self.member.account_id,
                    action: action.to_string(),
                    detail: None,
                    created_at: Utc::now(),
                })
                .await
                .expect("audit insert");
        }
    }

    /// Mirror an active subscription for the member locally and at the
    /// billing provider. Returns the period end the cancelled subscription
    /// stays paid through.
    pub async fn seed_active_subscription(&self) -> DateTime<Utc> {
        let period_end = Utc::now() + Duration::days(12);
        self.store
            .upsert_subscription_record(&SubscriptionRecord {
                profile_id: self.member.account_id,
                subscription_id: "sub_member".to_string(),
                customer_id: "cus_member".to_string(),
                status: "active".to_string(),
                current_period_end: Some(period_end),
            })
            .await
            .expect("subscription mirror");
        self.billing
            .add_active_subscription("sub_member", "cus_member", period_end);
        period_end
    }

    /// Put two media objects under the member's prefixes plus one
    /// bystander avatar that must survive.
    pub async fn seed_media(&self) {
        let member = self.member.account_id;
        let bystander = self.bystander.account_id;
        for path in [
            format!("avatars/{member}/avatar.jpg"),
            format!("session-media/{member}/cover.jpg"),
            format!("avatars/{bystander}/avatar.jpg"),
        ] {
            self.media
                .put(&Path::from(path), PutPayload::from_static(b"media"))
                .await
                .expect("media put");
        }
    }

    /// Total objects currently in the media store.
    pub async fn media_object_count(&self) -> usize {
        let mut listing = self.media.list(None);
        let mut count = 0;
        while let Some(entry) = listing.next().await {
            entry.expect("media listing");
            count += 1;
        }
        count
    }

    /// Whether the relational store still has a profile for the account.
    pub async fn profile_exists(&self, account_id: Uuid) -> bool {
        self.store
            .get_profile(account_id)
            .await
            .expect("profile read")
            .is_some()
    }

    /// GET /api/v1/account/deletion-eligibility with the given bearer token.
    pub async fn get_eligibility(&self, token: &str) -> (StatusCode, Value) {
        self.request("GET", "/api/v1/account/deletion-eligibility", token)
            .await
    }

    /// POST /api/v1/account/delete with the given bearer token.
    pub async fn post_delete(&self, token: &str) -> (StatusCode, Value) {
        self.request("POST", "/api/v1/account/delete", token).await
    }

    async fn request(&self, method: &str, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }
}
