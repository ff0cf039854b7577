//! Per-audience token verification.
//!
//! A [`Verifier`] accepts a token only if it is signed by a key from its key
//! set, names the configured issuer, and carries the verifier's client id in
//! `aud`. Two verifiers, differing only in audience, make up a
//! [`VerifierPair`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only asymmetric algorithms are accepted; symmetric JWKs are refused
//! - `exp` is checked with zero leeway; `iat`/`nbf` get the clock skew
//! - Rejection reasons are labels for logs and metrics, never response text

use crate::auth::claims::Claims;
use crate::auth::keys::{KeySet, KeySetError};
use crate::config::Config;
use common::jwt::{peek_header, validate_iat, validate_nbf, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Why a single verifier rejected a token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("token exceeds maximum size")]
    TooLarge,

    #[error("token is not a well-formed JWS")]
    Malformed,

    #[error("token algorithm is not accepted")]
    UnsupportedAlgorithm,

    #[error("no usable verification key: {0}")]
    Key(#[from] KeySetError),

    #[error("verification key cannot be used for this token")]
    KeyMismatch,

    #[error("signature is invalid")]
    BadSignature,

    #[error("token is expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token issued in the future")]
    IssuedInFuture,

    #[error("issuer mismatch")]
    IssuerMismatch,

    #[error("audience mismatch")]
    AudienceMismatch,

    #[error("required claim missing: {0}")]
    MissingClaim(String),
}

impl VerifyError {
    /// Bounded label for metrics and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            VerifyError::TooLarge => "too_large",
            VerifyError::Malformed => "malformed",
            VerifyError::UnsupportedAlgorithm => "unsupported_algorithm",
            VerifyError::Key(e) => e.as_label(),
            VerifyError::KeyMismatch => "key_mismatch",
            VerifyError::BadSignature => "bad_signature",
            VerifyError::Expired => "expired",
            VerifyError::NotYetValid => "not_yet_valid",
            VerifyError::IssuedInFuture => "issued_in_future",
            VerifyError::IssuerMismatch => "issuer_mismatch",
            VerifyError::AudienceMismatch => "audience_mismatch",
            VerifyError::MissingClaim(_) => "missing_claim",
        }
    }
}

impl From<JwtValidationError> for VerifyError {
    fn from(e: JwtValidationError) -> Self {
        match e {
            JwtValidationError::TokenTooLarge => VerifyError::TooLarge,
            JwtValidationError::MalformedToken => VerifyError::Malformed,
            JwtValidationError::UnsupportedAlgorithm => VerifyError::UnsupportedAlgorithm,
            JwtValidationError::IatTooFarInFuture => VerifyError::IssuedInFuture,
            JwtValidationError::NotYetValid => VerifyError::NotYetValid,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => VerifyError::BadSignature,
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            ErrorKind::ImmatureSignature => VerifyError::NotYetValid,
            ErrorKind::InvalidIssuer => VerifyError::IssuerMismatch,
            ErrorKind::InvalidAudience => VerifyError::AudienceMismatch,
            ErrorKind::MissingRequiredClaim(claim) => VerifyError::MissingClaim(claim.clone()),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                VerifyError::UnsupportedAlgorithm
            }
            ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::MissingAlgorithm => VerifyError::KeyMismatch,
            _ => VerifyError::Malformed,
        }
    }
}

/// Verifies tokens for one audience.
pub struct Verifier {
    issuer: String,
    client_id: String,
    key_set: Arc<dyn KeySet>,
    clock_skew: Duration,
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        key_set: Arc<dyn KeySet>,
        clock_skew: Duration,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            key_set,
            clock_skew,
        }
    }

    /// Audience this verifier accepts.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify a raw token and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and header decode (via `common::jwt::peek_header`)
    /// 2. Key lookup by `kid`
    /// 3. Key/algorithm compatibility
    /// 4. Signature, `exp` (zero leeway), `iss`, `aud`
    /// 5. `nbf` and `iat` with clock skew tolerance
    ///
    /// # Errors
    ///
    /// Returns the first check that failed as a [`VerifyError`].
    #[instrument(skip_all, fields(aud = %self.client_id))]
    pub async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let header = peek_header(token)?;

        let jwk = self.key_set.key_for(header.kid.as_deref()).await?;
        check_key_usable(&jwk, header.alg)?;

        let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            tracing::debug!(target: "gate.auth.verifier", error = %e, "JWK cannot be used as a decoding key");
            VerifyError::KeyMismatch
        })?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.client_id.as_str()]);

        let claims = decode::<Claims>(token, &decoding_key, &validation)?.claims;

        if let Some(nbf) = claims.nbf() {
            validate_nbf(nbf, self.clock_skew)?;
        }
        if let Some(iat) = claims.iat() {
            validate_iat(iat, self.clock_skew)?;
        }

        tracing::debug!(target: "gate.auth.verifier", "Token verified");
        Ok(claims)
    }
}

/// Refuse keys that cannot legitimately verify a token signed with `alg`.
fn check_key_usable(jwk: &Jwk, alg: Algorithm) -> Result<(), VerifyError> {
    if matches!(jwk.algorithm, AlgorithmParameters::OctetKey(_)) {
        tracing::warn!(target: "gate.auth.verifier", "Symmetric JWK in key set refused");
        return Err(VerifyError::KeyMismatch);
    }

    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        tracing::debug!(target: "gate.auth.verifier", "Encryption JWK cannot verify signatures");
        return Err(VerifyError::KeyMismatch);
    }

    if let Some(key_alg) = &jwk.common.key_algorithm {
        if signing_algorithm(key_alg) != Some(alg) {
            tracing::debug!(
                target: "gate.auth.verifier",
                key_alg = ?key_alg,
                token_alg = ?alg,
                "JWK algorithm does not match token algorithm"
            );
            return Err(VerifyError::KeyMismatch);
        }
    }

    Ok(())
}

fn signing_algorithm(key_alg: &KeyAlgorithm) -> Option<Algorithm> {
    match key_alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// The primary and service-principal verifiers, tried in that order.
#[derive(Debug)]
pub struct VerifierPair {
    pub primary: Verifier,
    pub spn: Verifier,
}

impl VerifierPair {
    pub fn new(primary: Verifier, spn: Verifier) -> Self {
        Self { primary, spn }
    }

    /// Build both verifiers for `config` over one shared key set.
    pub fn from_config(config: &Config, key_set: Arc<dyn KeySet>) -> Self {
        let clock_skew = Duration::from_secs(config.jwt_clock_skew_seconds);
        Self {
            primary: Verifier::new(
                config.oidc_issuer_url.clone(),
                config.oidc_client_id.clone(),
                Arc::clone(&key_set),
                clock_skew,
            ),
            spn: Verifier::new(
                config.oidc_issuer_url.clone(),
                config.spn_client_id(),
                key_set,
                clock_skew,
            ),
        }
    }

    /// Verifiers in evaluation order, with their metric labels.
    pub fn ordered(&self) -> [(&'static str, &Verifier); 2] {
        [("primary", &self.primary), ("spn", &self.spn)]
    }
}
