//! Liveness handler.
//!
//! `/health` reports that the process is serving. It does not touch the
//! identity provider; key availability was established at startup.

/// Liveness probe handler.
///
/// Returns a simple "OK" response to indicate the process is running.
pub async fn health_check() -> &'static str {
    "OK"
}
