//! Middleware for the token gate.
//!
//! # Components
//!
//! - `auth` - Token and group middleware for protected routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_group, require_token, AuthState, ClaimsExt, GroupGuard};
pub use http_metrics::http_metrics_middleware;
