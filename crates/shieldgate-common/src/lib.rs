//! shieldgate-common - Shared types and utilities
//!
//! This crate provides the pieces shared by the synthesis library and the
//! runtime handlers, without any AWS SDK dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`cache`]: Single-slot TTL cache for the shared secret
//! - [`defaults`]: Default configuration values
//! - [`headers`]: CloudFront header map and header injection
//! - [`params`]: Parameter-store key contract between the two trees
//! - [`resource_kind`]: CloudFormation resource types and stateful marking
//! - [`secret`]: Shared-secret payload shape
//! - [`source`]: Secret source trait implemented by the runtime

pub mod cache;
pub mod defaults;
pub mod headers;
pub mod params;
pub mod resource_kind;
pub mod secret;
pub mod source;

// Re-export commonly used types
pub use cache::{CacheEntry, SecretCache, create_cache_entry, is_cache_valid};
pub use headers::{HeaderEntry, Headers, inject_header};
pub use params::ParameterKey;
pub use resource_kind::ResourceKind;
pub use secret::SecretPayload;
pub use source::SecretSource;

/// Get the current timestamp in milliseconds since UNIX epoch.
///
/// Returns 0 if system time is before the epoch (should never happen in practice).
#[inline]
pub fn timestamp_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
