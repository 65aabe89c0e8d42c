//! API Gateway REQUEST authorizer
//!
//! Up to two checks run per request: the origin-verification header must
//! equal the current shared secret, and the bearer token must verify against
//! the user pool. Every configured check must pass. Anything else, including
//! a failure to fetch the secret or the signing keys, is a Deny.

use crate::error::RuntimeError;
use crate::jwt::{KeyProvider, TokenVerifier};
use crate::secrets::CachedSecret;
use serde::{Deserialize, Serialize};
use shieldgate_common::SecretSource;
use shieldgate_common::defaults::ANONYMOUS_PRINCIPAL;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The parts of a REQUEST authorizer event this handler reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerEvent {
    #[serde(default)]
    pub method_arn: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

impl AuthorizerEvent {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Token from `Authorization: Bearer <token>`; a bare token is accepted
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.header("authorization")?.trim();
        let token = match value.split_once(' ') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            Some(_) => return None,
            None => value,
        };
        (!token.is_empty()).then_some(token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Effect")]
    pub effect: String,
    #[serde(rename = "Resource")]
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<Statement>,
}

/// Authorizer output as API Gateway expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
}

impl AuthorizerResponse {
    pub fn is_allow(&self) -> bool {
        self.policy_document
            .statement
            .iter()
            .all(|s| s.effect == "Allow")
    }
}

/// Outcome of the checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { principal: String },
    Deny,
}

impl Decision {
    /// Policy scoped to the invoked method only
    pub fn into_response(self, method_arn: &str) -> AuthorizerResponse {
        let (principal, effect) = match self {
            Decision::Allow { principal } => (principal, "Allow"),
            Decision::Deny => (ANONYMOUS_PRINCIPAL.to_string(), "Deny"),
        };
        AuthorizerResponse {
            principal_id: principal,
            policy_document: PolicyDocument {
                version: "2012-10-17".to_string(),
                statement: vec![Statement {
                    action: "execute-api:Invoke".to_string(),
                    effect: effect.to_string(),
                    resource: method_arn.to_string(),
                }],
            },
        }
    }
}

/// Header comparison whose time depends only on the lengths
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

struct HeaderCheck<S> {
    header_name: String,
    secret: CachedSecret<S>,
}

pub struct Authorizer<S, K> {
    header_check: Option<HeaderCheck<S>>,
    token_check: Option<TokenVerifier<K>>,
}

impl<S: SecretSource, K: KeyProvider> Authorizer<S, K> {
    pub fn new() -> Self {
        Self {
            header_check: None,
            token_check: None,
        }
    }

    pub fn with_header_check(
        mut self,
        header_name: impl Into<String>,
        secret: CachedSecret<S>,
    ) -> Self {
        self.header_check = Some(HeaderCheck {
            header_name: header_name.into(),
            secret,
        });
        self
    }

    pub fn with_token_check(mut self, verifier: TokenVerifier<K>) -> Self {
        self.token_check = Some(verifier);
        self
    }

    /// Secret behind the header check, if configured
    pub fn secret(&self) -> Option<&CachedSecret<S>> {
        self.header_check.as_ref().map(|c| &c.secret)
    }

    /// Run the configured checks at `now` (ms since epoch)
    pub async fn decide(
        &self,
        event: &AuthorizerEvent,
        now: i64,
    ) -> Result<Decision, RuntimeError> {
        if self.header_check.is_none() && self.token_check.is_none() {
            return Err(RuntimeError::MalformedEvent("no checks configured".to_string()));
        }

        if let Some(check) = &self.header_check {
            let presented = event
                .header(&check.header_name)
                .ok_or_else(|| RuntimeError::MissingHeader {
                    name: check.header_name.clone(),
                })?;
            let current = check.secret.current(now).await?;
            if !constant_time_eq(presented.as_bytes(), current.as_bytes()) {
                return Err(RuntimeError::HeaderMismatch {
                    name: check.header_name.clone(),
                });
            }
        }

        let principal = match &self.token_check {
            Some(verifier) => {
                let token = event.bearer_token().ok_or(RuntimeError::MissingToken)?;
                verifier.verify(token).await?.subject
            }
            None => ANONYMOUS_PRINCIPAL.to_string(),
        };

        Ok(Decision::Allow { principal })
    }

    /// Decide and render the policy; errors become a logged Deny
    pub async fn handle(&self, event: &AuthorizerEvent, now: i64) -> AuthorizerResponse {
        let decision = match self.decide(event, now).await {
            Ok(decision) => {
                debug!(method_arn = %event.method_arn, "Request allowed");
                decision
            }
            Err(e) => {
                warn!(method_arn = %event.method_arn, error = %e, "Request denied");
                Decision::Deny
            }
        };
        decision.into_response(&event.method_arn)
    }
}

impl<S: SecretSource, K: KeyProvider> Default for Authorizer<S, K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::StaticKeyProvider;
    use shieldgate_test_utils::jwt::{JWKS_JSON, TEST_CLIENT_ID, issuer};
    use shieldgate_test_utils::{FailingSecretSource, StaticSecretSource, TestIdentity};

    const ARN: &str = "arn:aws:execute-api:eu-west-1:123456789012:abc123/prod/GET/items";

    fn event(headers: &[(&str, &str)]) -> AuthorizerEvent {
        AuthorizerEvent {
            method_arn: ARN.to_string(),
            headers: Some(
                headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
        }
    }

    fn header_only() -> Authorizer<StaticSecretSource, StaticKeyProvider> {
        Authorizer::new().with_header_check(
            "x-origin-verify",
            CachedSecret::new(StaticSecretSource::new("x-origin-verify", "s3cret"), "sid", 300),
        )
    }

    fn verifier() -> TokenVerifier<StaticKeyProvider> {
        TokenVerifier::new(
            StaticKeyProvider::from_jwks(JWKS_JSON).unwrap(),
            issuer(),
            TEST_CLIENT_ID,
        )
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(event(&[("Authorization", "Bearer abc")]).bearer_token(), Some("abc"));
        assert_eq!(event(&[("authorization", "bearer  abc ")]).bearer_token(), Some("abc"));
        assert_eq!(event(&[("Authorization", "abc")]).bearer_token(), Some("abc"));
        assert_eq!(event(&[("Authorization", "Basic abc")]).bearer_token(), None);
        assert_eq!(event(&[("Authorization", "Bearer ")]).bearer_token(), None);
        assert_eq!(AuthorizerEvent::default().bearer_token(), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn test_response_shape() {
        let json = serde_json::to_value(Decision::Deny.into_response(ARN)).unwrap();
        assert_eq!(json["principalId"], ANONYMOUS_PRINCIPAL);
        assert_eq!(json["policyDocument"]["Version"], "2012-10-17");
        assert_eq!(json["policyDocument"]["Statement"][0]["Effect"], "Deny");
        assert_eq!(json["policyDocument"]["Statement"][0]["Resource"], ARN);
    }

    #[tokio::test]
    async fn test_header_check() {
        let auth = header_only();
        let allowed = auth.handle(&event(&[("X-Origin-Verify", "s3cret")]), 0).await;
        assert!(allowed.is_allow());
        assert_eq!(allowed.principal_id, ANONYMOUS_PRINCIPAL);

        assert!(!auth.handle(&event(&[("x-origin-verify", "wrong")]), 0).await.is_allow());
        assert!(!auth.handle(&event(&[]), 0).await.is_allow());
        assert!(!auth.handle(&AuthorizerEvent::default(), 0).await.is_allow());
    }

    #[tokio::test]
    async fn test_rotated_secret_denies_old_value_after_ttl() {
        let auth = header_only();
        assert!(auth.handle(&event(&[("x-origin-verify", "s3cret")]), 0).await.is_allow());

        auth.secret().unwrap().source().rotate("n3w");
        let old = event(&[("x-origin-verify", "s3cret")]);
        assert!(auth.handle(&old, 1_000).await.is_allow());
        assert!(!auth.handle(&old, 300_000).await.is_allow());
        assert!(auth.handle(&event(&[("x-origin-verify", "n3w")]), 300_001).await.is_allow());
    }

    #[tokio::test]
    async fn test_secret_fetch_failure_denies() {
        let auth: Authorizer<_, StaticKeyProvider> = Authorizer::new().with_header_check(
            "x-origin-verify",
            CachedSecret::new(FailingSecretSource::new(), "sid", 300),
        );
        let response = auth.handle(&event(&[("x-origin-verify", "anything")]), 0).await;
        assert!(!response.is_allow());
    }

    #[tokio::test]
    async fn test_token_principal() {
        let auth = header_only().with_token_check(verifier());
        let token = TestIdentity::id_token("user-42").sign();
        let bearer = format!("Bearer {token}");

        let response = auth
            .handle(&event(&[("x-origin-verify", "s3cret"), ("Authorization", &bearer)]), 0)
            .await;
        assert!(response.is_allow());
        assert_eq!(response.principal_id, "user-42");

        let no_token = auth.handle(&event(&[("x-origin-verify", "s3cret")]), 0).await;
        assert!(!no_token.is_allow());
        let wrong_header = auth
            .handle(&event(&[("x-origin-verify", "nope"), ("Authorization", &bearer)]), 0)
            .await;
        assert!(!wrong_header.is_allow());
    }

    #[tokio::test]
    async fn test_unconfigured_authorizer_denies() {
        let auth: Authorizer<StaticSecretSource, StaticKeyProvider> = Authorizer::new();
        assert!(matches!(
            auth.decide(&event(&[]), 0).await,
            Err(RuntimeError::MalformedEvent(_))
        ));
    }
}
