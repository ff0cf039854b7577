//! Token gate configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! is immutable afterwards.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Prefix that turns the primary client id into the service-principal
/// audience.
pub const SPN_PREFIX: &str = "spn:";

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default time to keep serving in-flight requests after a shutdown signal.
pub const DEFAULT_SHUTDOWN_DRAIN_SECONDS: u64 = 30;

/// Token gate configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// OIDC issuer URL. Tokens must carry exactly this `iss`.
    pub oidc_issuer_url: String,

    /// Primary client identifier (expected `aud` for interactive clients).
    pub oidc_client_id: String,

    /// Group identifier required on group-guarded routes.
    pub api_authorized_group_id: String,

    /// Clock skew tolerance in seconds for `iat`/`nbf` validation.
    pub jwt_clock_skew_seconds: u64,

    /// How long fetched signing keys are cached before refresh.
    pub jwks_cache_ttl_seconds: u64,

    /// Drain period after SIGTERM/SIGINT; 0 stops immediately.
    pub shutdown_drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("oidc_issuer_url", &self.oidc_issuer_url)
            .field("oidc_client_id", &self.oidc_client_id)
            .field("api_authorized_group_id", &self.api_authorized_group_id)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("shutdown_drain_seconds", &self.shutdown_drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid OIDC issuer URL: {0}")]
    InvalidIssuerUrl(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidJwksCacheTtl(String),

    #[error("Invalid shutdown drain period: {0}")]
    InvalidDrainPeriod(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let oidc_issuer_url = required(vars, "OIDC_ISSUER_URL")?;
        if !(oidc_issuer_url.starts_with("https://") || oidc_issuer_url.starts_with("http://")) {
            return Err(ConfigError::InvalidIssuerUrl(format!(
                "OIDC_ISSUER_URL must be an http(s) URL, got '{}'",
                oidc_issuer_url
            )));
        }

        let oidc_client_id = required(vars, "OIDC_CLIENT_ID")?;
        let api_authorized_group_id = required(vars, "API_AUTHORIZED_GROUP_ID")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwtClockSkew(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got 0".to_string(),
                ));
            }

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        let jwks_cache_ttl_seconds = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwksCacheTtl(
                    "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_JWKS_CACHE_TTL_SECONDS
        };

        let shutdown_drain_seconds = match vars.get("GATE_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainPeriod(format!(
                    "GATE_DRAIN_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_SHUTDOWN_DRAIN_SECONDS,
        };

        Ok(Config {
            bind_address,
            oidc_issuer_url,
            oidc_client_id,
            api_authorized_group_id,
            jwt_clock_skew_seconds,
            jwks_cache_ttl_seconds,
            shutdown_drain_seconds,
        })
    }

    /// Audience expected on service-principal tokens.
    pub fn spn_client_id(&self) -> String {
        format!("{}{}", SPN_PREFIX, self.oidc_client_id)
    }
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}
