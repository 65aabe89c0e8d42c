//! Shared test utilities for shieldgate
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique stack names
//! - [`jwt`]: RSA-signed identity tokens and the matching key set
//! - [`secrets`]: In-memory secret sources that count their calls

pub mod aws;
pub mod jwt;
pub mod secrets;

// Re-export commonly used items
pub use aws::{get_test_region, test_stack_name};
pub use jwt::{TestIdentity, sign_token};
pub use secrets::{FailingSecretSource, StaticSecretSource};
