use axum::http::StatusCode;
use chrono::Duration;
use common::model::{EnrollmentStatus, SessionStatus};
use tests_integration::fixtures::AppContext;

/// A member with only past activity is clear to delete.
#[tokio::test]
async fn test_clean_account_is_eligible() {
    let ctx = AppContext::new().await;
    ctx.seed_member_history().await;

    let (status, body) = ctx.get_eligibility(&ctx.member.token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canDelete"], true);
    assert!(body.get("blockingSessionCount").is_none());
    assert!(body.get("reason").is_none());
}

/// Every upcoming hosted session with a committed attendee counts against
/// eligibility.
#[tokio::test]
async fn test_upcoming_hosted_sessions_block_deletion() {
    let ctx = AppContext::new().await;
    for _ in 0..2 {
        ctx.seed_hosted_session(
            ctx.member.account_id,
            Duration::days(5),
            SessionStatus::Published,
            &[(ctx.bystander.account_id, EnrollmentStatus::Confirmed)],
        )
        .await;
    }

    let (status, body) = ctx.get_eligibility(&ctx.member.token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canDelete"], false);
    assert_eq!(body["blockingSessionCount"], 2);
    let reason = body["reason"].as_str().unwrap();
    assert!(reason.contains("2 upcoming session"));
}

/// Past, cancelled, draft and pending-only sessions never block.
#[tokio::test]
async fn test_only_committed_upcoming_sessions_block() {
    let ctx = AppContext::new().await;
    let member = ctx.member.account_id;
    let bystander = ctx.bystander.account_id;

    ctx.seed_hosted_session(
        member,
        Duration::days(-10),
        SessionStatus::Completed,
        &[(bystander, EnrollmentStatus::Paid)],
    )
    .await;
    ctx.seed_hosted_session(
        member,
        Duration::days(2),
        SessionStatus::Cancelled,
        &[(bystander, EnrollmentStatus::Confirmed)],
    )
    .await;
    ctx.seed_hosted_session(
        member,
        Duration::days(2),
        SessionStatus::Published,
        &[(bystander, EnrollmentStatus::Pending)],
    )
    .await;
    ctx.seed_hosted_session(member, Duration::days(2), SessionStatus::Draft, &[])
        .await;

    let (status, body) = ctx.get_eligibility(&ctx.member.token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canDelete"], true);
    assert!(body.get("blockingSessionCount").is_none());
}

/// A blocked delete answers 409 and changes nothing in any backend.
#[tokio::test]
async fn test_blocked_deletion_leaves_every_backend_untouched() {
    let ctx = AppContext::new().await;
    ctx.seed_member_history().await;
    ctx.seed_active_subscription().await;
    ctx.seed_media().await;
    ctx.seed_hosted_session(
        ctx.member.account_id,
        Duration::days(1),
        SessionStatus::Active,
        &[(ctx.bystander.account_id, EnrollmentStatus::Paid)],
    )
    .await;

    let (status, body) = ctx.post_delete(&ctx.member.token).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["errorStage"], "eligibility");
    let message = body["errorMessage"].as_str().unwrap();
    assert!(message.contains("1 upcoming session"));
    assert_eq!(body["deleted"]["profile"], false);

    assert!(ctx.profile_exists(ctx.member.account_id).await);
    assert!(ctx.identity.knows_account(ctx.member.account_id));
    assert_eq!(ctx.identity.delete_calls(), 0);
    assert_eq!(ctx.billing.cancel_calls(), 0);
    assert_eq!(ctx.media_object_count().await, 3);
}
