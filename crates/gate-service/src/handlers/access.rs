//! Group-guarded access probe.

use crate::routes::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

/// Response for `/api/v1/access`.
#[derive(Debug, Clone, Serialize)]
pub struct AccessResponse {
    pub authorized: bool,
    pub group: String,
}

/// Handler for GET /api/v1/access
///
/// Only reachable after both the token and the group middleware have
/// accepted the request, so the answer is always positive.
#[tracing::instrument(skip_all, name = "gate.handlers.access")]
pub async fn get_access(State(state): State<Arc<AppState>>) -> Json<AccessResponse> {
    Json(AccessResponse {
        authorized: true,
        group: state.config.api_authorized_group_id.clone(),
    })
}
