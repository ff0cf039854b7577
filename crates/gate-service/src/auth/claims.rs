//! Verified token claims.
//!
//! A `Claims` value is only ever produced by successful verification and is
//! never mutated afterwards. It keeps every claim the issuer sent; typed
//! accessors cover the ones the gate consumes. Subject identifiers are
//! redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Claim carrying the subject's object identifier.
pub const OID_CLAIM: &str = "oid";

/// Claim carrying group memberships.
pub const GROUPS_CLAIM: &str = "groups";

/// Immutable claim set of a verified token.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims {
    inner: Map<String, Value>,
}

impl From<Map<String, Value>> for Claims {
    fn from(inner: Map<String, Value>) -> Self {
        Self { inner }
    }
}

impl Claims {
    /// Raw value of a claim.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    /// Issuer (`iss`).
    pub fn issuer(&self) -> Option<&str> {
        self.get("iss").and_then(Value::as_str)
    }

    /// Audiences (`aud`). A single-string `aud` yields one element.
    pub fn audiences(&self) -> Vec<&str> {
        match self.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Object identifier (`oid`) of the subject.
    pub fn oid(&self) -> Option<&str> {
        self.get(OID_CLAIM).and_then(Value::as_str)
    }

    /// Expiration timestamp (`exp`, Unix epoch seconds).
    pub fn exp(&self) -> Option<i64> {
        self.get("exp").and_then(Value::as_i64)
    }

    /// Issued-at timestamp (`iat`, Unix epoch seconds).
    pub fn iat(&self) -> Option<i64> {
        self.get("iat").and_then(Value::as_i64)
    }

    /// Not-before timestamp (`nbf`, Unix epoch seconds).
    pub fn nbf(&self) -> Option<i64> {
        self.get("nbf").and_then(Value::as_i64)
    }

    /// Group memberships.
    ///
    /// Returns `None` unless the claim is present and is an array made up
    /// entirely of strings.
    pub fn groups(&self) -> Option<Vec<&str>> {
        self.get(GROUPS_CLAIM)?
            .as_array()?
            .iter()
            .map(Value::as_str)
            .collect()
    }

    /// Exact, order-independent membership test on the `groups` claim.
    pub fn is_member_of(&self, group_id: &str) -> bool {
        self.groups()
            .is_some_and(|groups| groups.iter().any(|g| *g == group_id))
    }
}

/// Custom Debug implementation that redacts subject identifiers.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("iss", &self.issuer())
            .field("aud", &self.audiences())
            .field("exp", &self.exp())
            .field("oid", &self.oid().map(|_| "[REDACTED]"))
            .field("groups", &self.groups().map(|g| g.len()))
            .finish_non_exhaustive()
    }
}
