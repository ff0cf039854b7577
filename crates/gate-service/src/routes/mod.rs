//! HTTP routes for the token gate.
//!
//! Defines the Axum router and application state.

use crate::auth::Authenticator;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{
    http_metrics_middleware, require_group, require_token, AuthState, GroupGuard,
};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Verifier pair holder shared by every request.
    pub authenticator: Arc<Authenticator>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/me` - Verified claims - requires a token
/// - `/api/v1/access` - Requires a token and membership in the configured group
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        authenticator: Arc::clone(&state.authenticator),
    });
    let group_guard = Arc::new(GroupGuard {
        authenticator: Arc::clone(&state.authenticator),
        group_id: state.config.api_authorized_group_id.clone(),
    });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Token only
    let token_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_token,
        ))
        .with_state(state.clone());

    // Token, then group. The last route_layer added runs first.
    let group_routes = Router::new()
        .route("/api/v1/access", get(handlers::get_access))
        .route_layer(middleware::from_fn_with_state(group_guard, require_group))
        .route_layer(middleware::from_fn_with_state(auth_state, require_token))
        .with_state(state);

    // Layer order, innermost first:
    // 1. TraceLayer - Log request details
    // 2. TimeoutLayer - Timeout the request, traced span included
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(token_routes)
        .merge(group_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
