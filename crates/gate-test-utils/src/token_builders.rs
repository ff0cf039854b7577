//! Builder patterns for test claims
//!
//! Provides a fluent API for OIDC access-token claims. Defaults produce a
//! token any correctly configured verifier accepts.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Default primary client id used by the test harness.
pub const TEST_CLIENT_ID: &str = "oidc-client-id";

/// Default group required by the test harness.
pub const TEST_GROUP_ID: &str = "G1";

/// Builder for test token claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new(&issuer.issuer(), "oidc-client-id")
///     .with_groups(&["G1", "G2"])
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Claims for `audience` from `issuer`, valid for an hour.
    pub fn new(issuer: &str, audience: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(issuer));
        claims.insert("aud".to_string(), json!(audience));
        claims.insert("oid".to_string(), json!("00000000-0000-0000-0000-000000000001"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        Self { claims }
    }

    /// Set `aud` to an arbitrary value (string or array).
    pub fn with_audience(self, audience: Value) -> Self {
        self.with_claim("aud", audience)
    }

    pub fn with_oid(self, oid: &str) -> Self {
        self.with_claim("oid", json!(oid))
    }

    pub fn with_groups(self, groups: &[&str]) -> Self {
        self.with_claim("groups", json!(groups))
    }

    /// Set expiration in seconds from now (negative for expired tokens)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set issued-at in seconds from now
    pub fn issued_in(self, seconds: i64) -> Self {
        let iat = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("iat", json!(iat))
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("nbf", json!(nbf))
    }

    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}
