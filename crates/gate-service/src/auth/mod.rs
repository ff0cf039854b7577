//! Authentication module for the token gate.
//!
//! # Components
//!
//! - `keys` - key source trait and a static implementation
//! - `jwks` - OIDC discovery and cached JWKS client
//! - `verifier` - per-audience token verification and the verifier pair
//! - `authenticator` - swappable pair, header parsing, group checks
//! - `claims` - immutable claim set of a verified token

pub mod authenticator;
pub mod claims;
pub mod jwks;
pub mod keys;
pub mod verifier;

pub use authenticator::Authenticator;
pub use claims::Claims;
pub use jwks::JwksClient;
pub use keys::{KeySet, KeySetError, StaticKeySet};
pub use verifier::{Verifier, VerifierPair, VerifyError};
