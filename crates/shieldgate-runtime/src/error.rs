//! Runtime handler errors
//!
//! Handlers never surface these to callers: the edge function turns them
//! into a 403 and the authorizer into a Deny. They exist so the logs say
//! which check failed.

use shieldgate_common::secret::SecretPayloadError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to fetch secret {secret_id}")]
    SecretFetch {
        secret_id: String,
        #[source]
        source: BoxError,
    },

    #[error("secret {secret_id} has an unusable payload")]
    SecretPayload {
        secret_id: String,
        #[source]
        source: SecretPayloadError,
    },

    #[error("request has no {name} header")]
    MissingHeader { name: String },

    #[error("{name} header does not match the current secret")]
    HeaderMismatch { name: String },

    #[error("request has no bearer token")]
    MissingToken,

    #[error("token rejected: {0}")]
    InvalidToken(String),

    #[error("no signing key with id '{kid}'")]
    UnknownKey { kid: String },

    #[error("failed to load signing keys from {url}: {message}")]
    KeyFetch { url: String, message: String },

    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

impl RuntimeError {
    pub fn secret_fetch(secret_id: &str, source: anyhow::Error) -> Self {
        RuntimeError::SecretFetch {
            secret_id: secret_id.to_string(),
            source: source.into(),
        }
    }

    pub fn invalid_token(reason: impl Into<String>) -> Self {
        RuntimeError::InvalidToken(reason.into())
    }
}

impl From<jsonwebtoken::errors::Error> for RuntimeError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        RuntimeError::InvalidToken(e.to_string())
    }
}

/// Handler configuration errors, raised at cold start
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} is not set")]
    Missing { name: &'static str },

    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{first} and {second} must be set together")]
    PartialPair {
        first: &'static str,
        second: &'static str,
    },

    #[error("no check configured: set {secret} or {pool}")]
    NoChecks {
        secret: &'static str,
        pool: &'static str,
    },

    #[error("invalid configuration: {0}")]
    Validation(#[from] garde::Report),
}
