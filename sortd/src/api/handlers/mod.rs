//! HTTP request handlers.
//!
//! - [`classify`]: image upload and classification
//! - [`health`]: liveness probe
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to the matching HTTP status code and
//! an `{"error": ...}` body.

pub mod classify;
pub mod health;
