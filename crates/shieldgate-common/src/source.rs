//! Secret source abstraction
//!
//! The runtime handlers fetch the shared secret through this trait so they can
//! be exercised against in-memory sources in tests.

use anyhow::Result;
use std::future::Future;

/// Trait for fetching a secret string by id (name or ARN).
pub trait SecretSource: Send + Sync {
    /// Fetch the current secret string for `secret_id`
    fn get_secret_string(&self, secret_id: &str) -> impl Future<Output = Result<String>> + Send;
}
