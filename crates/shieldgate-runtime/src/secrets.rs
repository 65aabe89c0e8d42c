//! Shared-secret retrieval
//!
//! [`SecretsManagerFetcher`] reads the secret string from Secrets Manager in
//! the region the secret lives in. [`CachedSecret`] puts a TTL cache in
//! front of any [`SecretSource`] and decodes the payload down to the value
//! the handlers compare or inject.

use crate::error::RuntimeError;
use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use shieldgate_common::{SecretCache, SecretPayload, SecretSource, create_cache_entry};
use tracing::debug;

/// Region segment of an ARN (`arn:aws:secretsmanager:<region>:...`)
pub fn region_from_arn(arn: &str) -> Option<&str> {
    let mut parts = arn.split(':');
    (parts.next() == Some("arn"))
        .then(|| parts.nth(2))
        .flatten()
        .filter(|region| !region.is_empty())
}

/// Secrets Manager client for one region
pub struct SecretsManagerFetcher {
    client: aws_sdk_secretsmanager::Client,
}

impl SecretsManagerFetcher {
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::from_client(aws_sdk_secretsmanager::Client::new(&config))
    }

    /// Client for the region `secret_id` names, or `fallback_region` when it
    /// is a plain name rather than an ARN
    pub async fn for_secret(secret_id: &str, fallback_region: &str) -> Self {
        Self::new(region_from_arn(secret_id).unwrap_or(fallback_region)).await
    }

    pub fn from_client(client: aws_sdk_secretsmanager::Client) -> Self {
        Self { client }
    }
}

impl SecretSource for SecretsManagerFetcher {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .with_context(|| format!("GetSecretValue failed for {secret_id}"))?;

        output
            .secret_string()
            .map(str::to_string)
            .with_context(|| format!("secret {secret_id} has no string value"))
    }
}

/// TTL-cached shared-secret value.
///
/// A fetch failure is returned as-is and leaves the cache untouched: an
/// expired entry is never served in its place.
pub struct CachedSecret<S> {
    source: S,
    secret_id: String,
    ttl_secs: u64,
    cache: SecretCache,
}

impl<S: SecretSource> CachedSecret<S> {
    pub fn new(source: S, secret_id: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            source,
            secret_id: secret_id.into(),
            ttl_secs,
            cache: SecretCache::new(),
        }
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current secret value at `now` (ms since epoch)
    pub async fn current(&self, now: i64) -> Result<String, RuntimeError> {
        if let Some(value) = self.cache.get(now) {
            return Ok(value);
        }

        debug!(secret_id = %self.secret_id, "Secret cache miss, fetching");
        let secret_string = self
            .source
            .get_secret_string(&self.secret_id)
            .await
            .map_err(|e| RuntimeError::secret_fetch(&self.secret_id, e))?;
        let payload =
            SecretPayload::parse(&secret_string).map_err(|source| RuntimeError::SecretPayload {
                secret_id: self.secret_id.clone(),
                source,
            })?;

        self.cache
            .set(create_cache_entry(payload.value.clone(), self.ttl_secs, now));
        Ok(payload.value)
    }

    /// Forget the cached value so the next call fetches
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shieldgate_test_utils::{FailingSecretSource, StaticSecretSource};

    const SECRET_ID: &str = "arn:aws:secretsmanager:us-east-1:123456789012:secret:origin-AbCdEf";

    #[test]
    fn test_region_from_arn() {
        assert_eq!(region_from_arn(SECRET_ID), Some("us-east-1"));
        assert_eq!(region_from_arn("origin-verify"), None);
        assert_eq!(region_from_arn("arn:aws:iam::123:role/x"), None);
    }

    #[tokio::test]
    async fn test_fetches_once_within_ttl() {
        let source = StaticSecretSource::new("x-origin-verify", "s3cret");
        let cached = CachedSecret::new(source, SECRET_ID, 300);

        assert_eq!(cached.current(1_000).await.unwrap(), "s3cret");
        assert_eq!(cached.current(200_000).await.unwrap(), "s3cret");
        assert_eq!(cached.source().calls(), 1);
    }

    #[tokio::test]
    async fn test_refetches_after_expiry() {
        let source = StaticSecretSource::new("x-origin-verify", "old");
        let cached = CachedSecret::new(source, SECRET_ID, 300);
        assert_eq!(cached.current(0).await.unwrap(), "old");

        cached.source().rotate("new");
        assert_eq!(cached.current(299_999).await.unwrap(), "old");
        assert_eq!(cached.current(300_000).await.unwrap(), "new");
        assert_eq!(cached.source().calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_fetches() {
        let cached = CachedSecret::new(StaticSecretSource::new("h", "v"), SECRET_ID, 0);
        cached.current(5).await.unwrap();
        cached.current(5).await.unwrap();
        assert_eq!(cached.source().calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cached = CachedSecret::new(FailingSecretSource::new(), SECRET_ID, 300);
        let err = cached.current(0).await.unwrap_err();
        assert!(matches!(err, RuntimeError::SecretFetch { .. }));
        assert!(cached.current(1).await.is_err());
        assert_eq!(cached.source().calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let cached = CachedSecret::new(StaticSecretSource::new("h", "v"), SECRET_ID, 300);
        cached.current(0).await.unwrap();
        cached.invalidate();
        cached.current(1).await.unwrap();
        assert_eq!(cached.source().calls(), 2);
    }

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_fetch_missing_secret_fails() {
        let region = shieldgate_test_utils::get_test_region();
        let fetcher = SecretsManagerFetcher::new(&region).await;
        let id = shieldgate_test_utils::test_stack_name("missing-secret");
        assert!(fetcher.get_secret_string(&id).await.is_err());
    }
}
