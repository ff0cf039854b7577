//! Observability for the token gate.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
