//! # Gate Test Utilities
//!
//! Shared test utilities for the token gate.
//!
//! This crate provides:
//! - Deterministic Ed25519 keypairs that sign tokens and publish JWKs
//! - A claims builder with valid defaults
//! - A mock OIDC issuer (discovery document + JWKS) on wiremock
//! - A server harness that runs the real router on a random port
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let keypair = TestKeypair::new(1, "key-1");
//!     let issuer = MockIssuer::start(&[&keypair]).await;
//!     let server = TestGateServer::spawn(&issuer).await?;
//!
//!     let token = keypair.sign(&TestTokenBuilder::new(&issuer.issuer(), TEST_CLIENT_ID).build());
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/me", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_issuer;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_issuer::*;
pub use server_harness::*;
pub use token_builders::*;
