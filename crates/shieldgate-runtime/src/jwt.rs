//! Identity token verification
//!
//! Tokens are RS256 JWTs issued by the user pool. Signing keys come from the
//! pool's published key set, cached by key id and refetched when a token
//! names a key the cache has not seen (the pool rotates keys by adding one).

use crate::error::RuntimeError;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How long a fetched key set is trusted before a refetch
const KEY_SET_TTL: Duration = Duration::from_secs(3600);

/// Minimum gap between refetches triggered by unknown key ids
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(30);

/// A JSON Web Key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub use_: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

impl Jwk {
    pub fn is_signing_key(&self) -> bool {
        self.use_.as_deref() != Some("enc")
    }

    pub fn is_rsa(&self) -> bool {
        self.kty == "RSA" && self.n.is_some() && self.e.is_some()
    }
}

/// JSON Web Key Set
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Usable RS256 verification keys by key id.
    ///
    /// Keys without an id, encryption keys and non-RSA keys are skipped.
    pub fn decoding_keys(&self) -> HashMap<String, DecodingKey> {
        self.keys
            .iter()
            .filter(|k| k.is_signing_key() && k.is_rsa())
            .filter(|k| k.alg.as_deref().is_none_or(|alg| alg == "RS256"))
            .filter_map(|k| {
                let kid = k.kid.clone()?;
                let key = DecodingKey::from_rsa_components(k.n.as_deref()?, k.e.as_deref()?).ok()?;
                Some((kid, key))
            })
            .collect()
    }
}

/// Source of token verification keys
pub trait KeyProvider: Send + Sync {
    fn key(&self, kid: &str) -> impl Future<Output = Result<DecodingKey, RuntimeError>> + Send;
}

/// Fixed key set, for tests and pre-fetched keys
pub struct StaticKeyProvider {
    keys: HashMap<String, DecodingKey>,
}

impl StaticKeyProvider {
    pub fn from_jwks(json: &str) -> Result<Self, RuntimeError> {
        let set: JwkSet = serde_json::from_str(json)
            .map_err(|e| RuntimeError::KeyFetch {
                url: "inline".to_string(),
                message: format!("invalid JSON: {e}"),
            })?;
        Ok(Self {
            keys: set.decoding_keys(),
        })
    }
}

impl KeyProvider for StaticKeyProvider {
    async fn key(&self, kid: &str) -> Result<DecodingKey, RuntimeError> {
        self.keys.get(kid).cloned().ok_or_else(|| RuntimeError::UnknownKey {
            kid: kid.to_string(),
        })
    }
}

struct CachedKeys {
    by_kid: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < KEY_SET_TTL
    }

    fn may_refetch(&self) -> bool {
        self.fetched_at.elapsed() >= MIN_REFETCH_INTERVAL
    }
}

/// Key set fetched over HTTPS and cached per cold start
pub struct JwksKeyProvider {
    url: String,
    client: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksKeyProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, RuntimeError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RuntimeError::KeyFetch {
                url: url.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(url, client))
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            cache: RwLock::new(None),
        }
    }

    fn cached(&self, kid: &str) -> (Option<DecodingKey>, bool) {
        let cache = self.cache.read();
        match cache.as_ref() {
            Some(cached) if cached.is_fresh() => {
                let key = cached.by_kid.get(kid).cloned();
                let refetch = key.is_none() && cached.may_refetch();
                (key, refetch)
            }
            _ => (None, true),
        }
    }

    async fn refresh(&self) -> Result<(), RuntimeError> {
        debug!(url = %self.url, "Fetching signing keys");
        let fetch_err = |message: String| RuntimeError::KeyFetch {
            url: self.url.clone(),
            message,
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| fetch_err(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }
        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| fetch_err(format!("invalid JSON: {e}")))?;

        let by_kid = set.decoding_keys();
        info!(url = %self.url, key_count = by_kid.len(), "Signing keys fetched");
        *self.cache.write() = Some(CachedKeys {
            by_kid,
            fetched_at: Instant::now(),
        });
        Ok(())
    }
}

impl KeyProvider for JwksKeyProvider {
    async fn key(&self, kid: &str) -> Result<DecodingKey, RuntimeError> {
        let (key, refetch) = self.cached(kid);
        if let Some(key) = key {
            return Ok(key);
        }
        if refetch {
            self.refresh().await?;
        }
        self.cached(kid).0.ok_or_else(|| RuntimeError::UnknownKey {
            kid: kid.to_string(),
        })
    }
}

/// `aud` is a string or a list of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::Single(s) => s == aud,
            Audience::Multiple(v) => v.iter().any(|a| a == aud),
        }
    }
}

/// Claims the verifier reads
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    #[serde(default)]
    pub token_use: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Accepted token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    Id,
    Access,
}

/// A token that passed every check
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub subject: String,
    pub token_use: TokenUse,
}

/// Verifies tokens against one issuer and one app client
pub struct TokenVerifier<K> {
    keys: K,
    issuer: String,
    client_id: String,
}

impl<K: KeyProvider> TokenVerifier<K> {
    pub fn new(keys: K, issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            client_id: client_id.into(),
        }
    }

    /// Check signature, issuer, expiry, token use and client.
    ///
    /// Id tokens name the client in `aud`; access tokens in `client_id`.
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, RuntimeError> {
        let header = decode_header(token)?;
        if header.alg != Algorithm::RS256 {
            return Err(RuntimeError::invalid_token(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| RuntimeError::invalid_token("token header has no kid"))?;
        let key = self.keys.key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;

        let claims = decode::<Claims>(token, &key, &validation)?.claims;

        let token_use = match claims.token_use.as_deref() {
            Some("id") => TokenUse::Id,
            Some("access") => TokenUse::Access,
            other => {
                return Err(RuntimeError::invalid_token(format!(
                    "unexpected token_use {other:?}"
                )));
            }
        };
        let client_matches = match token_use {
            TokenUse::Id => claims
                .aud
                .as_ref()
                .is_some_and(|aud| aud.contains(&self.client_id)),
            TokenUse::Access => claims.client_id.as_deref() == Some(self.client_id.as_str()),
        };
        if !client_matches {
            return Err(RuntimeError::invalid_token("token was issued to another client"));
        }

        Ok(VerifiedToken {
            subject: claims.sub,
            token_use,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shieldgate_test_utils::jwt::{JWKS_JSON, TEST_CLIENT_ID, TEST_KID, issuer};
    use shieldgate_test_utils::TestIdentity;

    fn verifier() -> TokenVerifier<StaticKeyProvider> {
        let keys = StaticKeyProvider::from_jwks(JWKS_JSON).unwrap();
        TokenVerifier::new(keys, issuer(), TEST_CLIENT_ID)
    }

    #[test]
    fn test_key_set_filters_unusable_keys() {
        let set: JwkSet = serde_json::from_value(serde_json::json!({
            "keys": [
                {"kty": "RSA", "use": "enc", "kid": "enc", "n": "AQAB", "e": "AQAB"},
                {"kty": "EC", "kid": "ec", "x": "a", "y": "b"},
                {"kty": "RSA", "n": "AQAB", "e": "AQAB"}
            ]
        }))
        .unwrap();
        assert!(set.decoding_keys().is_empty());

        let fixture: JwkSet = serde_json::from_str(JWKS_JSON).unwrap();
        assert!(fixture.decoding_keys().contains_key(TEST_KID));
    }

    #[test]
    fn test_audience_forms() {
        assert!(Audience::Single("a".into()).contains("a"));
        assert!(Audience::Multiple(vec!["b".into(), "a".into()]).contains("a"));
        assert!(!Audience::Multiple(vec![]).contains("a"));
    }

    #[tokio::test]
    async fn test_accepts_id_and_access_tokens() {
        let v = verifier();
        let id = v.verify(&TestIdentity::id_token("alice").sign()).await.unwrap();
        assert_eq!(id.subject, "alice");
        assert_eq!(id.token_use, TokenUse::Id);

        let access = v
            .verify(&TestIdentity::access_token("bob").sign())
            .await
            .unwrap();
        assert_eq!(access.token_use, TokenUse::Access);
    }

    #[tokio::test]
    async fn test_rejects_bad_tokens() {
        let v = verifier();
        let cases = [
            TestIdentity::id_token("u").expired().sign(),
            TestIdentity::id_token("u").with_issuer("https://evil.example").sign(),
            TestIdentity::id_token("u").with_client_id("other").sign(),
            TestIdentity::access_token("u").with_client_id("other").sign(),
            TestIdentity::id_token("u").with_token_use("refresh").sign(),
            TestIdentity::id_token("u").sign_with_rogue_key(),
            "not-a-jwt".to_string(),
        ];
        for token in cases {
            assert!(v.verify(&token).await.is_err(), "accepted {token}");
        }
    }

    #[tokio::test]
    async fn test_unknown_or_missing_kid() {
        let v = verifier();
        let err = v
            .verify(&TestIdentity::id_token("u").with_kid(Some("rotated-away")).sign())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownKey { .. }));

        let err = v
            .verify(&TestIdentity::id_token("u").with_kid(None).sign())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_unreachable_key_set_fails_closed() {
        let keys = JwksKeyProvider::new("http://127.0.0.1:9/.well-known/jwks.json").unwrap();
        let err = keys.key(TEST_KID).await.err().unwrap();
        assert!(matches!(err, RuntimeError::KeyFetch { .. }));
    }
}
