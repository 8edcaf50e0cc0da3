//! HTTP authentication middleware for Axum
//!
//! Extracts the bearer token from incoming requests, validates it through
//! the [`Authenticator`], and makes the resolved [`AccountContext`]
//! available to handlers via request extensions.

use super::{AccountContext, AuthError, Authenticator};
use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Pull the bearer token out of the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| AuthError::bad_request("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AuthError::bad_request("Invalid Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::bad_request("Authorization header must use Bearer scheme"))?;

    if token.is_empty() {
        return Err(AuthError::bad_request("Empty bearer token"));
    }

    Ok(token.to_string())
}

/// Axum middleware function for bearer-token authentication
///
/// Returns 400 for malformed credentials and 401 for rejected ones; on
/// success the request continues with an [`AccountContext`] extension.
pub async fn auth_middleware(
    authenticator: Arc<Authenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match extract_bearer_token(request.headers()) {
        Ok(token) => token,
        Err(err) => {
            return (
                StatusCode::from_u16(err.status_code).unwrap_or(StatusCode::BAD_REQUEST),
                err.message,
            )
                .into_response();
        }
    };

    let account_context = match authenticator.authenticate(&token).await {
        Ok(ctx) => ctx,
        Err(err) => {
            log::warn!("Authentication failed: {}", err.message);
            return (
                StatusCode::from_u16(err.status_code).unwrap_or(StatusCode::UNAUTHORIZED),
                err.message,
            )
                .into_response();
        }
    };

    log::debug!(
        "Authenticated request for account '{}' (source: {})",
        account_context.account_id,
        account_context.source
    );

    request.extensions_mut().insert(account_context);

    next.run(request).await
}

/// Axum extractor for AccountContext from request extensions
///
/// Use this in handler functions behind the auth middleware:
///
/// ```ignore
/// async fn handler(account: AccountContextExtractor) -> Response {
///     let account_id = account.0.account_id;
///     // ... act on behalf of the account
/// }
/// ```
pub struct AccountContextExtractor(pub AccountContext);

#[async_trait]
impl<S> axum::extract::FromRequestParts<S> for AccountContextExtractor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccountContext>()
            .cloned()
            .map(AccountContextExtractor)
            .ok_or_else(|| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AccountContext not found in request extensions".to_string(),
                )
            })
    }
}
