//! JWKS client for the OIDC issuer's published signing keys.
//!
//! The issuer's discovery document (`/.well-known/openid-configuration`)
//! names the `jwks_uri`. Keys fetched from there are cached with a
//! configurable TTL and shared by both verifiers of a pair.
//!
//! # Security
//!
//! - The discovery document's `issuer` must equal the configured issuer
//!   exactly, since every token's `iss` is later compared to the configured
//!   value
//! - Keys are cached to reduce load on the identity provider
//! - Cache is invalidated on TTL expiry to pick up key rotations
//! - An unknown `kid` against a fresh cache does NOT trigger a refetch, so
//!   forged headers cannot drive traffic to the provider
//! - Refreshes are serialized: callers that queue behind an in-flight
//!   refresh reuse its outcome instead of fetching again

use crate::auth::keys::{select_key, KeySet, KeySetError};
use crate::observability::metrics::record_jwks_refresh;
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Path of the OIDC discovery document, relative to the issuer.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Fields of the OIDC discovery document used by the gate.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    /// Issuer identifier the provider asserts for itself.
    pub issuer: String,

    /// Location of the provider's JWKS.
    pub jwks_uri: String,
}

/// Cached JWKS data with expiry time.
struct CachedJwks {
    keys: Vec<Jwk>,
    expires_at: Instant,
}

/// JWKS client for fetching and caching public keys.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached JWKS data.
    cache: Arc<RwLock<Option<CachedJwks>>>,

    /// Cache TTL duration.
    cache_ttl: Duration,

    /// Held for the duration of a fetch.
    refresh_lock: Mutex<()>,

    /// Completed fetch attempts, successful or not.
    refresh_attempts: AtomicU64,
}

impl JwksClient {
    /// Create a JWKS client for a known JWKS URL.
    pub fn new(jwks_url: String) -> Self {
        Self::with_ttl(jwks_url, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    /// Create a JWKS client with custom cache TTL.
    pub fn with_ttl(jwks_url: String, cache_ttl: Duration) -> Self {
        Self::with_http_client(jwks_url, cache_ttl, build_http_client())
    }

    fn with_http_client(jwks_url: String, cache_ttl: Duration, http_client: reqwest::Client) -> Self {
        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
            refresh_lock: Mutex::new(()),
            refresh_attempts: AtomicU64::new(0),
        }
    }

    /// Resolve the issuer's JWKS location via discovery and fetch its keys
    /// once.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::Unavailable` if the discovery document cannot be
    /// fetched or parsed, or the initial key fetch fails. Also returned when
    /// the advertised issuer differs from `issuer_url` in any way, trailing
    /// slash included. Callers treat this as a startup failure.
    #[instrument(skip_all, fields(issuer = %issuer_url))]
    pub async fn discover(issuer_url: &str, cache_ttl: Duration) -> Result<Self, KeySetError> {
        let http_client = build_http_client();
        let url = format!("{}{}", issuer_url.trim_end_matches('/'), DISCOVERY_PATH);

        tracing::debug!(target: "gate.auth.jwks", url = %url, "Fetching OIDC discovery document");

        let response = http_client.get(&url).send().await.map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to fetch discovery document");
            KeySetError::Unavailable(format!("GET {} failed: {}", url, e))
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gate.auth.jwks",
                status = %response.status(),
                "Discovery endpoint returned error"
            );
            return Err(KeySetError::Unavailable(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        let document: DiscoveryDocument = response.json().await.map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to parse discovery document");
            KeySetError::Unavailable(format!("invalid discovery document: {}", e))
        })?;

        if document.issuer != issuer_url {
            tracing::error!(
                target: "gate.auth.jwks",
                advertised = %document.issuer,
                "Discovery document issuer does not match configured issuer"
            );
            return Err(KeySetError::Unavailable(format!(
                "issuer mismatch: expected {}, discovery document says {}",
                issuer_url, document.issuer
            )));
        }

        if document.jwks_uri.trim().is_empty() {
            return Err(KeySetError::Unavailable(
                "discovery document has empty jwks_uri".to_string(),
            ));
        }

        let client = Self::with_http_client(document.jwks_uri, cache_ttl, http_client);
        client.refresh_cache().await?;

        Ok(client)
    }

    /// URL the keys are fetched from.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Get a JWK by key ID.
    ///
    /// Returns the JWK from cache, or fetches from the provider if the cache
    /// is expired or empty.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::Unavailable` if the JWKS cannot be fetched.
    /// Returns `KeySetError::KeyNotFound`/`AmbiguousKey` if no single key
    /// matches.
    #[instrument(skip(self))]
    pub async fn get_key(&self, kid: Option<&str>) -> Result<Jwk, KeySetError> {
        // Read before the cache check so a refresh finishing in between is seen
        let observed = self.refresh_attempts.load(Ordering::Acquire);

        // Check cache first
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.expires_at > Instant::now()) {
                let result = select_key(&cached.keys, kid);
                match &result {
                    Ok(_) => tracing::debug!(target: "gate.auth.jwks", "JWKS cache hit"),
                    Err(e) => {
                        tracing::debug!(target: "gate.auth.jwks", error = %e, "Key not resolved from JWKS cache")
                    }
                }
                return result;
            }
        }

        // Cache miss or expired - fetch fresh JWKS
        self.refresh_once(observed).await?;

        let cache = self.cache.read().await;
        let keys = cache.as_ref().map(|c| c.keys.as_slice()).unwrap_or_default();
        select_key(keys, kid).inspect_err(|e| {
            tracing::warn!(target: "gate.auth.jwks", error = %e, "Key not resolved after JWKS refresh");
        })
    }

    /// Refresh unless another caller completed a fetch after `observed` was
    /// read, in which case that fetch's outcome is reused.
    async fn refresh_once(&self, observed: u64) -> Result<(), KeySetError> {
        let _guard = self.refresh_lock.lock().await;

        if self.refresh_attempts.load(Ordering::Acquire) == observed {
            return self.refresh_cache().await;
        }

        let fresh = self
            .cache
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.expires_at > Instant::now());
        if fresh {
            tracing::debug!(target: "gate.auth.jwks", "Reusing concurrent JWKS refresh");
            Ok(())
        } else {
            Err(KeySetError::Unavailable(format!(
                "concurrent refresh of {} failed",
                self.jwks_url
            )))
        }
    }

    /// Refresh the JWKS cache by fetching from the provider.
    ///
    /// Callers other than `discover` must hold `refresh_lock`.
    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), KeySetError> {
        let start = Instant::now();
        let result = self.fetch_keys().await;
        record_jwks_refresh(
            if result.is_ok() { "success" } else { "error" },
            start.elapsed(),
        );

        // Counted only once the cache reflects the attempt
        let outcome = match result {
            Ok(keys) => {
                tracing::info!(
                    target: "gate.auth.jwks",
                    key_count = keys.len(),
                    "JWKS cache refreshed"
                );
                let mut cache = self.cache.write().await;
                *cache = Some(CachedJwks {
                    keys,
                    expires_at: Instant::now() + self.cache_ttl,
                });
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.refresh_attempts.fetch_add(1, Ordering::AcqRel);

        outcome
    }

    async fn fetch_keys(&self) -> Result<Vec<Jwk>, KeySetError> {
        tracing::debug!(target: "gate.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to fetch JWKS");
                KeySetError::Unavailable(format!("GET {} failed: {}", self.jwks_url, e))
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gate.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(KeySetError::Unavailable(format!(
                "GET {} returned {}",
                self.jwks_url,
                response.status()
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to parse JWKS response");
            KeySetError::Unavailable(format!("invalid JWKS: {}", e))
        })?;

        Ok(jwks.keys)
    }

    /// Force refresh the cache.
    pub async fn force_refresh(&self) -> Result<(), KeySetError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_cache().await
    }
}

#[async_trait]
impl KeySet for JwksClient {
    async fn key_for(&self, kid: Option<&str>) -> Result<Jwk, KeySetError> {
        self.get_key(kid).await
    }
}

fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(target: "gate.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
            reqwest::Client::new()
        })
}
