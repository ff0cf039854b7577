//! Signing key sources.
//!
//! A [`KeySet`] resolves the public key that should verify a token, given
//! the `kid` from its header. Verifiers hold a key set behind an `Arc` so
//! both verifiers of a pair share one cache.

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use thiserror::Error;

/// Errors from key resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySetError {
    /// No key with the requested `kid`.
    #[error("Signing key not found")]
    KeyNotFound,

    /// Token carried no `kid` and the set holds more than one key.
    #[error("Token kid is required when multiple keys are present")]
    AmbiguousKey,

    /// Keys could not be fetched or parsed.
    #[error("Key set unavailable: {0}")]
    Unavailable(String),
}

impl KeySetError {
    /// Bounded label for metrics and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            KeySetError::KeyNotFound => "key_not_found",
            KeySetError::AmbiguousKey => "ambiguous_key",
            KeySetError::Unavailable(_) => "key_set_unavailable",
        }
    }
}

/// Source of token verification keys.
#[async_trait]
pub trait KeySet: Send + Sync {
    /// Resolve the key for a token header's `kid`.
    async fn key_for(&self, kid: Option<&str>) -> Result<Jwk, KeySetError>;
}

/// Pick a key by `kid`, or the only key when `kid` is absent.
pub(crate) fn select_key(keys: &[Jwk], kid: Option<&str>) -> Result<Jwk, KeySetError> {
    match kid {
        Some(kid) => keys
            .iter()
            .find(|key| key.common.key_id.as_deref() == Some(kid))
            .cloned()
            .ok_or(KeySetError::KeyNotFound),
        None => match keys {
            [only] => Ok(only.clone()),
            [] => Err(KeySetError::KeyNotFound),
            _ => Err(KeySetError::AmbiguousKey),
        },
    }
}

/// Fixed, in-memory key set.
///
/// Used when keys are provisioned out of band and when substituting the
/// issuer's keys during rotation drills or tests.
#[derive(Debug, Clone, Default)]
pub struct StaticKeySet {
    keys: Vec<Jwk>,
}

impl StaticKeySet {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl From<JwkSet> for StaticKeySet {
    fn from(set: JwkSet) -> Self {
        Self::new(set.keys)
    }
}

#[async_trait]
impl KeySet for StaticKeySet {
    async fn key_for(&self, kid: Option<&str>) -> Result<Jwk, KeySetError> {
        select_key(&self.keys, kid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn jwk(kid: &str) -> Jwk {
        serde_json::from_value(serde_json::json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo",
            "kid": kid,
            "alg": "EdDSA",
            "use": "sig"
        }))
        .unwrap()
    }

    #[test]
    fn test_select_key_by_kid() {
        let keys = vec![jwk("key-1"), jwk("key-2")];

        let key = select_key(&keys, Some("key-2")).unwrap();
        assert_eq!(key.common.key_id.as_deref(), Some("key-2"));
    }

    #[test]
    fn test_select_key_unknown_kid() {
        let keys = vec![jwk("key-1")];
        assert!(matches!(select_key(&keys, Some("key-9")), Err(KeySetError::KeyNotFound)));
    }

    #[test]
    fn test_select_sole_key_without_kid() {
        let keys = vec![jwk("key-1")];
        let key = select_key(&keys, None).unwrap();
        assert_eq!(key.common.key_id.as_deref(), Some("key-1"));
    }

    #[test]
    fn test_select_without_kid_is_ambiguous_with_many_keys() {
        let keys = vec![jwk("key-1"), jwk("key-2")];
        assert!(matches!(select_key(&keys, None), Err(KeySetError::AmbiguousKey)));
    }

    #[test]
    fn test_select_from_empty_set() {
        assert!(matches!(select_key(&[], None), Err(KeySetError::KeyNotFound)));
    }

    #[tokio::test]
    async fn test_static_key_set_from_jwk_set() {
        let set = JwkSet {
            keys: vec![jwk("key-1"), jwk("key-2")],
        };
        let key_set = StaticKeySet::from(set);

        assert_eq!(key_set.len(), 2);
        let key = key_set.key_for(Some("key-1")).await.unwrap();
        assert_eq!(key.common.key_id.as_deref(), Some("key-1"));
    }
}
