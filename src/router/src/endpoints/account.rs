use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use common::auth::AccountContextExtractor;
use lifecycle::{DeletionStage, EligibilityResponse};
use serde_json::json;

use crate::RouterState;

/// Create account lifecycle routes
pub fn router<S: RouterState>() -> Router<S> {
    Router::new()
        .route(
            "/account/deletion-eligibility",
            get(deletion_eligibility::<S>),
        )
        .route("/account/delete", post(delete_account::<S>))
}

/// GET /account/deletion-eligibility
///
/// Read-only precheck the app calls before offering the destructive action.
#[tracing::instrument(skip_all, fields(account_id = %context.account_id))]
pub async fn deletion_eligibility<S: RouterState>(
    State(state): State<S>,
    AccountContextExtractor(context): AccountContextExtractor,
) -> impl IntoResponse {
    match state
        .orchestrator()
        .eligibility()
        .check(context.account_id)
        .await
    {
        Ok(decision) => (StatusCode::OK, Json(EligibilityResponse::from(decision))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Eligibility check failed",
                "message": e.to_string()
            })),
        )
            .into_response(),
    }
}

/// POST /account/delete
///
/// Deletes the calling account and answers with the structured result. The
/// work runs in a detached task so a client disconnect cannot abandon a
/// half-finished deletion.
#[tracing::instrument(skip_all, fields(account_id = %context.account_id))]
pub async fn delete_account<S: RouterState>(
    State(state): State<S>,
    AccountContextExtractor(context): AccountContextExtractor,
) -> impl IntoResponse {
    let orchestrator = state.orchestrator().clone();
    let account_id = context.account_id;

    let deletion = tokio::spawn(async move { orchestrator.run(account_id).await });

    match deletion.await {
        Ok(result) => {
            let status = if result.success {
                StatusCode::OK
            } else if result.error_stage == Some(DeletionStage::Eligibility) {
                StatusCode::CONFLICT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(result)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Deletion task did not complete");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Deletion did not complete",
                    "message": e.to_string()
                })),
            )
                .into_response()
        }
    }
}
