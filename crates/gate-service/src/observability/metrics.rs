//! Metrics definitions for the token gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gate_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: 5 values (known routes plus `/other`)
//! - `outcome`/`status`: bounded by code
//! - `verifier`: `primary`, `spn`
//! - `reason`: bounded by `VerifyError::as_label`
//!
//! Recording never fails; without an installed recorder it is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // HTTP request buckets aligned with 200ms p95 target
        .set_buckets_for_metric(
            Matcher::Prefix("gate_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Verification is CPU-bound except on key refresh
        .set_buckets_for_metric(
            Matcher::Prefix("gate_token_verification".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set token verification buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gate_jwks_refresh".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gate_http_requests_total`, `gate_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gate_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gate_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path to its route, or `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        "/api/v1/access" => "/api/v1/access",
        _ => "/other",
    }
}

// ============================================================================
// Token Verification Metrics
// ============================================================================

/// Record the outcome of one `verify_token` call.
///
/// Metric: `gate_token_verifications_total`, `gate_token_verification_duration_seconds`
/// Labels: `outcome` (`accepted`, `rejected`, `malformed`), `verifier`
/// (`primary`, `spn`, `none`)
pub fn record_token_verification(outcome: &'static str, verifier: &'static str, duration: Duration) {
    histogram!("gate_token_verification_duration_seconds",
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());

    counter!("gate_token_verifications_total",
        "outcome" => outcome,
        "verifier" => verifier
    )
    .increment(1);
}

/// Record a single verifier declining a token.
///
/// Metric: `gate_verifier_rejections_total`
/// Labels: `verifier`, `reason`
pub fn record_verifier_rejection(verifier: &'static str, reason: &'static str) {
    counter!("gate_verifier_rejections_total",
        "verifier" => verifier,
        "reason" => reason
    )
    .increment(1);
}

/// Record a group access decision.
///
/// Metric: `gate_group_access_checks_total`
/// Labels: `result` (`granted`, `denied`)
pub fn record_group_access(granted: bool) {
    let result = if granted { "granted" } else { "denied" };
    counter!("gate_group_access_checks_total", "result" => result).increment(1);
}

// ============================================================================
// Key Set Metrics
// ============================================================================

/// Record a JWKS fetch.
///
/// Metric: `gate_jwks_refresh_total`, `gate_jwks_refresh_duration_seconds`
/// Labels: `status` (`success`, `error`)
pub fn record_jwks_refresh(status: &'static str, duration: Duration) {
    histogram!("gate_jwks_refresh_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
    counter!("gate_jwks_refresh_total", "status" => status).increment(1);
}
