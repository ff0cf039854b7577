//! Common utilities shared across token-gate components.

#![warn(clippy::pedantic)]

/// Module for JWT pre-parse utilities (size limits, header peek, clock skew)
pub mod jwt;
