//! Test server harness for E2E testing
//!
//! Provides `TestGateServer` for spawning real token gate instances in tests.

use crate::mock_issuer::MockIssuer;
use crate::token_builders::{TEST_CLIENT_ID, TEST_GROUP_ID};
use gate_service::auth::Authenticator;
use gate_service::config::Config;
use gate_service::observability::metrics::init_metrics_recorder;
use gate_service::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics handle shared by every server in the test process.
///
/// The Prometheus recorder can only be installed once per process.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Configuration variables pointing at `issuer` with the default client id
/// and group.
pub fn test_config_vars(issuer: &MockIssuer) -> HashMap<String, String> {
    HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("OIDC_ISSUER_URL".to_string(), issuer.issuer()),
        ("OIDC_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
        (
            "API_AUTHORIZED_GROUP_ID".to_string(),
            TEST_GROUP_ID.to_string(),
        ),
    ])
}

/// Test harness for spawning the token gate in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let issuer = MockIssuer::start(&[&keypair]).await;
/// let server = TestGateServer::spawn(&issuer).await?;
/// let response = reqwest::get(format!("{}/health", server.url())).await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestGateServer {
    addr: SocketAddr,
    config: Config,
    authenticator: Arc<Authenticator>,
    _handle: JoinHandle<()>,
}

impl TestGateServer {
    /// Spawn a server trusting `issuer`, with the default client id and group.
    pub async fn spawn(issuer: &MockIssuer) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(&test_config_vars(issuer)).await
    }

    /// Spawn a server from explicit configuration variables.
    ///
    /// Runs the same startup sequence as the binary: configuration,
    /// discovery, router. Binds to a random available port.
    pub async fn spawn_with_vars(vars: &HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let authenticator = Arc::new(
            Authenticator::from_config(&config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize authenticator: {}", e))?,
        );

        let state = Arc::new(AppState {
            config: config.clone(),
            authenticator: Arc::clone(&authenticator),
        });

        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            authenticator,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Authenticator serving this instance, for swapping verifiers mid-test.
    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }
}

impl Drop for TestGateServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_fixtures::TestKeypair;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let keypair = TestKeypair::new(1, "key-1");
        let issuer = MockIssuer::start(&[&keypair]).await;
        let server = TestGateServer::spawn(&issuer).await?;

        assert!(server.addr().ip().is_loopback());
        assert_eq!(server.config().oidc_client_id, TEST_CLIENT_ID);

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }
}
