use axum::{Router, http::StatusCode, middleware, response::IntoResponse, routing::get};
use common::Store;
use common::auth::{Authenticator, auth_middleware};
use common::billing::BillingProvider;
use common::config::Configuration;
use common::identity::IdentityProvider;
use lifecycle::{DeletionOrchestrator, RetryPolicy};
use object_store::ObjectStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod endpoints;

pub trait RouterState: std::fmt::Debug + Clone + Send + Sync + 'static {
    fn orchestrator(&self) -> &Arc<DeletionOrchestrator>;
    fn authenticator(&self) -> &Arc<Authenticator>;
}

/// AppState holds any shared state that needs to be accessed by route handlers
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<DeletionOrchestrator>,
    authenticator: Arc<Authenticator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &"DeletionOrchestrator")
            .field("authenticator", &"Authenticator")
            .finish()
    }
}

impl AppState {
    /// Wires the orchestrator and authenticator from the four backends and
    /// the loaded configuration.
    pub fn new(
        store: Store,
        object_store: Arc<dyn ObjectStore>,
        billing: Arc<dyn BillingProvider>,
        identity: Arc<dyn IdentityProvider>,
        config: &Configuration,
    ) -> Self {
        let authenticator = Arc::new(Authenticator::new(config.auth.clone(), identity.clone()));

        let billing_retry =
            RetryPolicy::new(config.billing.max_attempts, config.billing.retry_base_delay);
        let identity_retry =
            RetryPolicy::new(config.identity.max_attempts, config.identity.retry_base_delay);
        let orchestrator = Arc::new(DeletionOrchestrator::with_retry_policies(
            store,
            object_store,
            billing,
            identity,
            billing_retry,
            identity_retry,
        ));

        Self {
            orchestrator,
            authenticator,
        }
    }
}

impl RouterState for AppState {
    fn orchestrator(&self) -> &Arc<DeletionOrchestrator> {
        &self.orchestrator
    }

    fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }
}

/// Create a new router instance with all routes configured
pub fn create_router<S: RouterState>(state: S) -> Router {
    // Create auth middleware layer
    let authenticator = state.authenticator().clone();
    let auth_layer =
        middleware::from_fn(move |req, next| auth_middleware(authenticator.clone(), req, next));

    Router::new()
        // Public health check endpoint (no authentication)
        .route("/health", get(health_check))
        // Account endpoints require the caller's own bearer credential
        .nest("/api/v1", endpoints::account::router().layer(auth_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
