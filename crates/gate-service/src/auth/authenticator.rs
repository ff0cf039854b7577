//! Request authentication and group authorization.
//!
//! The [`Authenticator`] holds the current [`VerifierPair`] behind an
//! `ArcSwap`. Each call to [`Authenticator::verify_token`] loads one snapshot
//! of the pair and uses only that snapshot, so a concurrent
//! [`Authenticator::replace_verifiers`] never produces a half-updated view.
//!
//! All verifier rejections collapse to [`GateError::Unauthenticated`]; the
//! individual reasons go to debug logs and metrics.

use crate::auth::claims::Claims;
use crate::auth::jwks::JwksClient;
use crate::auth::verifier::VerifierPair;
use crate::config::Config;
use crate::errors::GateError;
use crate::observability::metrics::{
    record_group_access, record_token_verification, record_verifier_rejection,
};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Authentication scheme accepted in the `Authorization` header.
const BEARER_PREFIX: &str = "Bearer ";

/// Owns the verifier pair and answers authentication questions.
pub struct Authenticator {
    verifiers: ArcSwap<VerifierPair>,
}

impl Authenticator {
    pub fn new(pair: VerifierPair) -> Self {
        Self {
            verifiers: ArcSwap::from_pointee(pair),
        }
    }

    /// Discover the issuer's signing keys and build both verifiers.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Configuration` if discovery or the initial key
    /// fetch fails. The service must not start in that case.
    #[instrument(skip_all, fields(issuer = %config.oidc_issuer_url))]
    pub async fn from_config(config: &Config) -> Result<Self, GateError> {
        let ttl = Duration::from_secs(config.jwks_cache_ttl_seconds);
        let jwks = JwksClient::discover(&config.oidc_issuer_url, ttl)
            .await
            .map_err(|e| {
                tracing::error!(target: "gate.auth", error = %e, "OIDC discovery failed");
                GateError::Configuration(e.to_string())
            })?;

        tracing::info!(
            target: "gate.auth",
            jwks_url = %jwks.jwks_url(),
            client_id = %config.oidc_client_id,
            "Token verifiers ready"
        );

        Ok(Self::new(VerifierPair::from_config(config, Arc::new(jwks))))
    }

    /// Current verifier pair.
    pub fn verifiers(&self) -> Arc<VerifierPair> {
        self.verifiers.load_full()
    }

    /// Atomically install a new verifier pair.
    ///
    /// Verifications already in progress finish with the pair they started
    /// with.
    pub fn replace_verifiers(&self, pair: VerifierPair) {
        self.verifiers.store(Arc::new(pair));
        tracing::info!(target: "gate.auth", "Verifier pair replaced");
    }

    /// Authenticate the value of an `Authorization` header.
    ///
    /// # Errors
    ///
    /// - `GateError::MalformedRequest` if the header is absent or not
    ///   `Bearer <token>`
    /// - `GateError::Unauthenticated` if neither verifier accepts the token
    #[instrument(skip_all)]
    pub async fn verify_token(&self, authorization: Option<&str>) -> Result<Claims, GateError> {
        let start = Instant::now();

        let token = match parse_bearer(authorization) {
            Ok(token) => token,
            Err(e) => {
                record_token_verification("malformed", "none", start.elapsed());
                return Err(e);
            }
        };

        let pair = self.verifiers.load_full();

        for (label, verifier) in pair.ordered() {
            match verifier.verify(token).await {
                Ok(claims) => {
                    tracing::debug!(target: "gate.auth", verifier = label, "Token accepted");
                    record_token_verification("accepted", label, start.elapsed());
                    return Ok(claims);
                }
                Err(e) => {
                    tracing::debug!(
                        target: "gate.auth",
                        verifier = label,
                        reason = e.as_label(),
                        error = %e,
                        "Verifier rejected token"
                    );
                    record_verifier_rejection(label, e.as_label());
                }
            }
        }

        record_token_verification("rejected", "none", start.elapsed());
        Err(GateError::Unauthenticated)
    }

    /// Check that verified claims list `required_group` in `groups`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Forbidden` if the claim is absent, is not a list of
    /// strings, or does not contain the group.
    pub fn verify_group_access(
        &self,
        required_group: &str,
        claims: &Claims,
    ) -> Result<(), GateError> {
        let granted = claims.is_member_of(required_group);
        record_group_access(granted);

        if granted {
            Ok(())
        } else {
            tracing::debug!(
                target: "gate.auth",
                group_count = claims.groups().map(|g| g.len()),
                "Group membership missing"
            );
            Err(GateError::Forbidden)
        }
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is case-sensitive and must be followed by exactly one space and
/// a non-empty token.
pub fn parse_bearer(authorization: Option<&str>) -> Result<&str, GateError> {
    let value = authorization.ok_or_else(|| {
        tracing::debug!(target: "gate.auth", "Missing Authorization header");
        GateError::MalformedRequest("Missing Authorization header".to_string())
    })?;

    match value.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.is_empty() && !token.starts_with(' ') => Ok(token),
        _ => {
            tracing::debug!(target: "gate.auth", "Invalid Authorization header format");
            Err(GateError::MalformedRequest(
                "Invalid Authorization header format".to_string(),
            ))
        }
    }
}
