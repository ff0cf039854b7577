//! Token gate service library.
//!
//! An HTTP request gate in front of protected APIs. Every protected request
//! must present an OIDC bearer token accepted by one of two verifiers:
//!
//! - primary: `aud` equals the configured client id
//! - service principal: `aud` equals `spn:` + client id
//!
//! Group-guarded routes additionally require the configured group id in the
//! token's `groups` claim.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/authenticator.rs -> auth/verifier.rs -> auth/jwks.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Verifiers, key sources, and the authenticator
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Token and group gates, HTTP metrics
//! - `observability` - Metrics definitions
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
