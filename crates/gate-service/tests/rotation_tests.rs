//! Verifier pair replacement and concurrency tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use async_trait::async_trait;
use gate_service::auth::{
    Authenticator, KeySet, KeySetError, StaticKeySet, Verifier, VerifierPair,
};
use gate_service::errors::GateError;
use gate_test_utils::{MockIssuer, TestGateServer, TestKeypair, TestTokenBuilder, TEST_CLIENT_ID};
use jsonwebtoken::jwk::Jwk;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const ISSUER: &str = "https://issuer.example.com";

fn jwks(keys: &[&TestKeypair]) -> StaticKeySet {
    StaticKeySet::new(
        keys.iter()
            .map(|k| serde_json::from_value::<Jwk>(k.jwk_json()).unwrap())
            .collect(),
    )
}

fn pair_over(key_set: Arc<dyn KeySet>) -> VerifierPair {
    let skew = Duration::from_secs(300);
    VerifierPair::new(
        Verifier::new(ISSUER, TEST_CLIENT_ID, Arc::clone(&key_set), skew),
        Verifier::new(ISSUER, format!("spn:{TEST_CLIENT_ID}"), key_set, skew),
    )
}

fn token(keypair: &TestKeypair) -> String {
    keypair.sign(&TestTokenBuilder::new(ISSUER, TEST_CLIENT_ID).build())
}

/// Key set that parks every lookup until released.
struct GatedKeySet {
    inner: StaticKeySet,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl KeySet for GatedKeySet {
    async fn key_for(&self, kid: Option<&str>) -> Result<Jwk, KeySetError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.key_for(kid).await
    }
}

#[tokio::test]
async fn test_in_flight_verification_keeps_prior_pair() -> Result<()> {
    let old_key = TestKeypair::new(1, "old");
    let new_key = TestKeypair::new(2, "new");

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let gated = GatedKeySet {
        inner: jwks(&[&old_key]),
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    };
    let auth = Arc::new(Authenticator::new(pair_over(Arc::new(gated))));

    let old_token = token(&old_key);
    let in_flight = {
        let auth = Arc::clone(&auth);
        let header = format!("Bearer {old_token}");
        tokio::spawn(async move { auth.verify_token(Some(&header)).await })
    };

    // Swap while the first verification is parked inside the old key set
    entered.notified().await;
    auth.replace_verifiers(pair_over(Arc::new(jwks(&[&new_key]))));
    release.notify_one();

    assert!(in_flight.await?.is_ok(), "in-flight call must finish on the old pair");

    // Everything after the swap sees only the new pair
    let after = auth.verify_token(Some(&format!("Bearer {old_token}"))).await;
    assert!(matches!(after, Err(GateError::Unauthenticated)));
    let fresh = auth
        .verify_token(Some(&format!("Bearer {}", token(&new_key))))
        .await;
    assert!(fresh.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_concurrent_verification_during_swaps() -> Result<()> {
    let shared_key = TestKeypair::new(1, "shared");
    let extra_key = TestKeypair::new(2, "extra");

    let auth = Arc::new(Authenticator::new(pair_over(Arc::new(jwks(&[&shared_key])))));
    let header = format!("Bearer {}", token(&shared_key));

    let verifications = (0..64).map(|_| {
        let auth = Arc::clone(&auth);
        let header = header.clone();
        tokio::spawn(async move { auth.verify_token(Some(&header)).await })
    });
    let swaps = (0..16).map(|i| {
        let auth = Arc::clone(&auth);
        let keys = if i % 2 == 0 {
            jwks(&[&shared_key, &extra_key])
        } else {
            jwks(&[&extra_key, &shared_key])
        };
        tokio::spawn(async move { auth.replace_verifiers(pair_over(Arc::new(keys))) })
    });

    let swap_handles: Vec<_> = swaps.collect();
    let results = futures::future::join_all(verifications).await;
    futures::future::join_all(swap_handles).await;

    // Every pair ever installed trusts the shared key
    for result in results {
        assert!(result?.is_ok());
    }

    Ok(())
}

#[tokio::test]
async fn test_verification_is_idempotent() -> Result<()> {
    let keypair = TestKeypair::new(1, "key-1");
    let auth = Authenticator::new(pair_over(Arc::new(jwks(&[&keypair]))));
    let header = format!(
        "Bearer {}",
        keypair.sign(
            &TestTokenBuilder::new(ISSUER, TEST_CLIENT_ID)
                .with_groups(&["G1", "G2"])
                .build()
        )
    );

    let first = auth.verify_token(Some(&header)).await?;
    let second = auth.verify_token(Some(&header)).await?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_live_server_uses_replaced_pair() -> Result<()> {
    let old_key = TestKeypair::new(1, "old");
    let new_key = TestKeypair::new(2, "new");
    let issuer = MockIssuer::start(&[&old_key]).await;
    let server = TestGateServer::spawn(&issuer).await?;

    let claims = TestTokenBuilder::new(&issuer.issuer(), TEST_CLIENT_ID).build();
    let old_token = old_key.sign(&claims);
    let new_token = new_key.sign(&claims);

    let client = reqwest::Client::new();
    let me = format!("{}/api/v1/me", server.url());

    let response = client.get(&me).bearer_auth(&old_token).send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    server.authenticator().replace_verifiers(VerifierPair::from_config(
        server.config(),
        Arc::new(jwks(&[&new_key])),
    ));

    let response = client.get(&me).bearer_auth(&old_token).send().await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client.get(&me).bearer_auth(&new_token).send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
