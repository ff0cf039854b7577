//! Mock OIDC issuer
//!
//! Serves a discovery document and a JWKS from a wiremock server. The
//! issuer identifier is the server's base URI.

use crate::crypto_fixtures::{jwks_json, TestKeypair};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Discovery document path.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Path the JWKS is published under.
pub const JWKS_PATH: &str = "/discovery/v2.0/keys";

/// OIDC issuer backed by wiremock.
pub struct MockIssuer {
    server: MockServer,
}

impl MockIssuer {
    /// Start an issuer publishing `keys`.
    pub async fn start(keys: &[&TestKeypair]) -> Self {
        let issuer = Self::bare().await;
        issuer.mount_discovery(&issuer.issuer()).await;
        issuer.mount_jwks(keys).await;
        issuer
    }

    /// Start a server with nothing mounted.
    pub async fn bare() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer identifier tokens must carry in `iss`.
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve a discovery document claiming `advertised_issuer`.
    pub async fn mount_discovery(&self, advertised_issuer: &str) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": advertised_issuer,
                "jwks_uri": self.jwks_url(),
                "id_token_signing_alg_values_supported": ["EdDSA"],
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_jwks(&self, keys: &[&TestKeypair]) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&self.server)
            .await;
    }

    /// Replace the published keys. Discovery keeps working.
    pub async fn rotate_keys(&self, keys: &[&TestKeypair]) {
        self.server.reset().await;
        self.mount_discovery(&self.issuer()).await;
        self.mount_jwks(keys).await;
    }

    /// Number of JWKS fetches received so far.
    pub async fn jwks_fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == JWKS_PATH)
            .count()
    }
}
