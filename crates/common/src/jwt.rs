//! JWT utilities shared across token-gate services.
//!
//! This module provides the checks that run before any signature
//! verification:
//! - Size limits for DoS prevention
//! - Header peek (algorithm and key ID) with an asymmetric-only allowlist
//! - Clock skew constants and `iat`/`nbf` validation
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - HMAC and `none` algorithms are never accepted, so a public key can never
//!   be used as a shared secret
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{peek_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! // Size check, header decode and algorithm allowlist
//! let header = peek_header(token)?;
//!
//! // Use header.kid to look up the signing key, verify, then:
//! validate_iat(claims_iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use jsonwebtoken::{decode_header, Algorithm};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// - Typical identity-provider tokens are 1-2KB (RS256 signature plus group
///   claims)
/// - 8KB leaves room for large `groups` arrays while bounding decode work
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Applied to `iat` and `nbf`. Expiry (`exp`) is never extended by this
/// tolerance.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Upper bound for configuration validation.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Signature algorithms accepted for identity tokens.
///
/// Only asymmetric algorithms are listed. `HS*` is excluded because the
/// verifying keys are published, and `none` cannot be represented.
pub const ACCEPTED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT pre-validation.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWS compact structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header names an algorithm outside [`ACCEPTED_ALGORITHMS`].
    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,

    /// Token `nbf` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    NotYetValid,
}

/// The parts of a JWS header needed to select a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Signature algorithm from the `alg` header.
    pub alg: Algorithm,

    /// Key ID from the `kid` header, if present.
    pub kid: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Decode the JWS header of a token without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The `kid` value must only be used for key lookup in a trusted key set
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong segment count, bad base64, invalid header JSON,
///   unknown algorithm name, or an empty `kid`
/// - `UnsupportedAlgorithm` - Algorithm is recognized but not asymmetric
pub fn peek_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWS compact format: header.payload.signature
    let parts = token.split('.').count();
    if parts != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts,
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header = decode_header(token).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header");
        JwtValidationError::MalformedToken
    })?;

    if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
        tracing::debug!(
            target: "common.jwt",
            alg = ?header.alg,
            "Token rejected: algorithm not accepted"
        );
        return Err(JwtValidationError::UnsupportedAlgorithm);
    }

    if header.kid.as_deref() == Some("") {
        tracing::debug!(target: "common.jwt", "Token rejected: empty kid");
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(TokenHeader {
        alg: header.alg,
        kid: header.kid,
    })
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which could indicate
/// token pre-generation or clock synchronization issues.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// Prefer [`validate_iat`] in production code. This variant exists so that
/// boundary conditions can be unit-tested without wall-clock dependence.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let max_iat = now.saturating_add(skew_secs(clock_skew));

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Validate the `nbf` (not-before) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::NotYetValid` if `nbf` is more than
/// `clock_skew` in the future.
pub fn validate_nbf(nbf: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_nbf_at(nbf, clock_skew, now)
}

pub(crate) fn validate_nbf_at(
    nbf: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    if nbf > now.saturating_add(skew_secs(clock_skew)) {
        tracing::debug!(
            target: "common.jwt",
            nbf = nbf,
            now = now,
            "Token rejected: not yet valid"
        );
        return Err(JwtValidationError::NotYetValid);
    }

    Ok(())
}

fn skew_secs(clock_skew: Duration) -> i64 {
    i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.payload.signature")
    }

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_is_5_minutes() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
    }

    #[test]
    fn test_accepted_algorithms_exclude_hmac() {
        assert!(!ACCEPTED_ALGORITHMS.contains(&Algorithm::HS256));
        assert!(!ACCEPTED_ALGORITHMS.contains(&Algorithm::HS384));
        assert!(!ACCEPTED_ALGORITHMS.contains(&Algorithm::HS512));
    }

    // -------------------------------------------------------------------------
    // peek_header Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_peek_header_rs256_with_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"key-01"}"#);

        let header = peek_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("key-01"));
    }

    #[test]
    fn test_peek_header_without_kid() {
        let token = token_with_header(r#"{"alg":"EdDSA","typ":"JWT"}"#);

        let header = peek_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::EdDSA);
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_peek_header_rejects_hs256() {
        let token = token_with_header(r#"{"alg":"HS256","typ":"JWT","kid":"key-01"}"#);
        assert_eq!(
            peek_header(&token),
            Err(JwtValidationError::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn test_peek_header_rejects_alg_none() {
        let token = token_with_header(r#"{"alg":"none","typ":"JWT"}"#);
        assert_eq!(peek_header(&token), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_peek_header_rejects_empty_kid() {
        let token = token_with_header(r#"{"alg":"RS256","kid":""}"#);
        assert_eq!(peek_header(&token), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_peek_header_rejects_numeric_kid() {
        let token = token_with_header(r#"{"alg":"RS256","kid":12345}"#);
        assert_eq!(peek_header(&token), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_peek_header_malformed_token() {
        assert_eq!(
            peek_header("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(peek_header(""), Err(JwtValidationError::MalformedToken));
        assert_eq!(
            peek_header("only.two"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            peek_header("!!!invalid!!!.payload.signature"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_peek_header_invalid_json() {
        let token = token_with_header("not-json");
        assert_eq!(peek_header(&token), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_peek_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            peek_header(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_peek_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256","kid":"key"}"#);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let payload_len = remaining / 2;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(remaining - payload_len)
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        let header = peek_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("key"));
    }

    // -------------------------------------------------------------------------
    // iat / nbf Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_time() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_past_time() {
        let past = chrono::Utc::now().timestamp() - 3600;
        assert!(validate_iat(past, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        assert_eq!(
            validate_iat(far_future, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        // iat == now + skew is the last accepted value
        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());

        assert_eq!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_nbf_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        assert!(validate_nbf_at(now - 10, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert!(validate_nbf_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert_eq!(
            validate_nbf_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::NotYetValid)
        );
    }

    #[test]
    fn test_validate_nbf_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        assert_eq!(
            validate_nbf(far_future, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::NotYetValid)
        );
    }
}
