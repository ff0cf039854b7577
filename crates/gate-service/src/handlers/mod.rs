//! HTTP request handlers for the token gate.

pub mod access;
pub mod health;
pub mod me;
pub mod metrics;

pub use access::get_access;
pub use health::health_check;
pub use me::get_me;
pub use metrics::metrics_handler;
