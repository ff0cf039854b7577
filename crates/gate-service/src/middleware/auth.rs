//! Request gate middleware for protected routes.
//!
//! Provides two middleware functions:
//! - `require_token` - authenticates the bearer token and injects `Claims`
//! - `require_group` - requires the injected `Claims` to list a group
//!
//! `require_group` must be layered inside `require_token`; without claims in
//! the request it rejects with 403.

use crate::auth::{Authenticator, Claims};
use crate::errors::GateError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the token middleware.
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<Authenticator>,
}

/// State for the group middleware.
#[derive(Clone)]
pub struct GroupGuard {
    pub authenticator: Arc<Authenticator>,

    /// Group every request through this guard must belong to.
    pub group_id: String,
}

/// Token middleware.
///
/// # Response
///
/// - 400 if the `Authorization` header is missing or not `Bearer <token>`
/// - 403 if no verifier accepts the token
/// - Continues to next handler with `Claims` in extensions otherwise
#[instrument(skip_all, name = "gate.middleware.auth")]
pub async fn require_token(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GateError> {
    // A present but non-visible-ASCII value is malformed, not missing
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .map(|h| h.to_str().unwrap_or_default());

    let claims = state.authenticator.verify_token(authorization).await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Group middleware.
///
/// # Response
///
/// - 403 if the request carries no verified claims or lacks the group
/// - Continues to next handler otherwise, claims untouched
#[instrument(skip_all, name = "gate.middleware.group")]
pub async fn require_group(
    State(guard): State<Arc<GroupGuard>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, GateError> {
    let Some(claims) = req.claims() else {
        tracing::warn!(
            target: "gate.middleware.auth",
            "Group check reached without verified claims"
        );
        return Err(GateError::Forbidden);
    };

    guard
        .authenticator
        .verify_group_access(&guard.group_id, claims)?;

    Ok(next.run(req).await)
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the verified claims from request extensions.
    ///
    /// Returns `None` if `require_token` was not applied to this request.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}
