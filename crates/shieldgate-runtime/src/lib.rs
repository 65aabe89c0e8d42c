//! shieldgate-runtime - Lambda handlers deployed by the shieldgate stacks
//!
//! Each handler is a library type with its AWS calls behind a trait, so the
//! request logic runs in tests without AWS. The binaries under `src/bin/`
//! only wire the AWS implementations into `lambda_runtime`.
//!
//! ## Modules
//!
//! - [`edge`]: CloudFront origin-request handler that stamps the shared secret
//! - [`authorizer`]: API Gateway REQUEST authorizer
//! - [`jwt`]: User pool token verification and key set caching
//! - [`secrets`]: Secrets Manager fetcher and the TTL-cached secret value
//! - [`rotation`]: Four-step secret rotation
//! - [`purge`]: Custom resource that empties a bucket before deletion
//! - [`config`]: Handler settings from the environment or build constants

pub mod authorizer;
pub mod config;
pub mod edge;
pub mod error;
pub mod jwt;
pub mod purge;
pub mod rotation;
pub mod secrets;

pub use error::{ConfigError, RuntimeError};

/// Initialize logging for a handler.
///
/// The Lambda log sink timestamps each line and does not render colours, so
/// both are left out.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();
}
