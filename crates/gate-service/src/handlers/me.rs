//! Current identity handler.
//!
//! Echoes the consumed claims of the verified token.

use crate::auth::Claims;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Object identifier of the subject, if the issuer sent one.
    pub oid: Option<String>,

    pub aud: Vec<String>,

    pub iss: Option<String>,

    pub exp: Option<i64>,

    /// Group memberships; `null` when the claim is absent or not a list of
    /// strings.
    pub groups: Option<Vec<String>>,
}

impl From<&Claims> for MeResponse {
    fn from(claims: &Claims) -> Self {
        Self {
            oid: claims.oid().map(str::to_string),
            aud: claims.audiences().into_iter().map(str::to_string).collect(),
            iss: claims.issuer().map(str::to_string),
            exp: claims.exp(),
            groups: claims
                .groups()
                .map(|groups| groups.into_iter().map(str::to_string).collect()),
        }
    }
}

/// Handler for GET /api/v1/me
///
/// Requires the token middleware.
///
/// ## Response
///
/// ```json
/// {
///   "oid": "00000000-0000-0000-0000-000000000000",
///   "aud": ["oidc-client-id"],
///   "iss": "https://login.example.com/tenant/v2.0",
///   "exp": 1234567890,
///   "groups": ["G1", "G2"]
/// }
/// ```
#[instrument(skip_all, name = "gate.handlers.me")]
pub async fn get_me(Extension(claims): Extension<Claims>) -> Json<MeResponse> {
    tracing::debug!(target: "gate.handlers.me", "Returning token claims");
    Json(MeResponse::from(&claims))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_me_response_from_claims() {
        let claims: Claims = serde_json::from_value(json!({
            "iss": "https://issuer.example.com",
            "aud": "oidc-client-id",
            "exp": 1234567890,
            "oid": "user-oid",
            "groups": ["G1", "G2"],
            "ipd": "ignored",
        }))
        .unwrap();

        let json = serde_json::to_value(MeResponse::from(&claims)).unwrap();

        assert_eq!(
            json,
            json!({
                "oid": "user-oid",
                "aud": ["oidc-client-id"],
                "iss": "https://issuer.example.com",
                "exp": 1234567890,
                "groups": ["G1", "G2"],
            })
        );
    }

    #[test]
    fn test_me_response_without_groups() {
        let claims: Claims = serde_json::from_value(json!({ "aud": ["a", "b"] })).unwrap();
        let response = MeResponse::from(&claims);

        assert_eq!(response.aud, vec!["a", "b"]);
        assert!(response.groups.is_none());
        assert!(response.oid.is_none());
    }
}
