//! Token gate
//!
//! Verifies OIDC bearer tokens in front of the protected API.

use gate_service::auth::Authenticator;
use gate_service::config::Config;
use gate_service::observability::metrics::init_metrics_recorder;
use gate_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gate_service=info,gate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting token gate");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        issuer = %config.oidc_issuer_url,
        client_id = %config.oidc_client_id,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        jwks_cache_ttl_seconds = config.jwks_cache_ttl_seconds,
        shutdown_drain_seconds = config.shutdown_drain_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Startup is refused if the issuer's keys cannot be resolved
    let authenticator = Authenticator::from_config(&config).await.map_err(|e| {
        error!("Failed to initialize token verifiers: {}", e);
        e
    })?;

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let drain = Duration::from_secs(config.shutdown_drain_seconds);

    let state = Arc::new(AppState {
        config,
        authenticator: Arc::new(authenticator),
    });

    let app = routes::build_routes(state, metrics_handle);

    info!("Token gate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain))
    .await?;

    info!("Token gate shutdown complete");

    Ok(())
}

/// Resolves once the process is asked to stop and the drain period has
/// elapsed. The listener keeps answering gate decisions until then.
async fn shutdown_signal(drain: Duration) {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Cannot watch for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Cannot watch for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };

    if drain.is_zero() {
        info!(signal = received, "Stopping token gate without drain");
        return;
    }

    warn!(
        signal = received,
        drain_seconds = drain.as_secs(),
        "Stopping token gate after drain"
    );
    tokio::time::sleep(drain).await;
    info!("Drain complete");
}
