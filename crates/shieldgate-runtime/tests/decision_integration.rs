//! Authorization decisions across check configurations, driven through the
//! JSON shapes API Gateway and CloudFront actually send.

use serde_json::json;
use shieldgate_common::defaults::ANONYMOUS_PRINCIPAL;
use shieldgate_runtime::authorizer::{Authorizer, AuthorizerEvent, AuthorizerResponse};
use shieldgate_runtime::config::{AuthorizerConfig, env};
use shieldgate_runtime::edge::{EdgeEvent, EdgeResult, OriginHeaderInjector};
use shieldgate_runtime::jwt::{StaticKeyProvider, TokenVerifier};
use shieldgate_runtime::secrets::CachedSecret;
use shieldgate_test_utils::jwt::{JWKS_JSON, TEST_CLIENT_ID, TEST_USER_POOL_ID, issuer};
use shieldgate_test_utils::{StaticSecretSource, TestIdentity};
use std::collections::HashMap;

const SECRET: &str = "rotating-value-1";
const METHOD_ARN: &str = "arn:aws:execute-api:eu-west-1:123456789012:abc123/prod/POST/api/items";

type TestAuthorizer = Authorizer<StaticSecretSource, StaticKeyProvider>;

fn secret() -> CachedSecret<StaticSecretSource> {
    CachedSecret::new(StaticSecretSource::new("x-origin-verify", SECRET), "origin-secret", 300)
}

fn verifier() -> TokenVerifier<StaticKeyProvider> {
    TokenVerifier::new(
        StaticKeyProvider::from_jwks(JWKS_JSON).unwrap(),
        issuer(),
        TEST_CLIENT_ID,
    )
}

fn request(header: Option<&str>, token: Option<&str>) -> AuthorizerEvent {
    let mut headers = json!({"Host": "abc123.execute-api.eu-west-1.amazonaws.com"});
    if let Some(value) = header {
        headers["X-Origin-Verify"] = json!(value);
    }
    if let Some(token) = token {
        headers["Authorization"] = json!(format!("Bearer {token}"));
    }
    serde_json::from_value(json!({
        "type": "REQUEST",
        "methodArn": METHOD_ARN,
        "resource": "/api/items",
        "path": "/api/items",
        "httpMethod": "POST",
        "headers": headers,
        "requestContext": {"stage": "prod"}
    }))
    .unwrap()
}

async fn decide(
    auth: &TestAuthorizer,
    header: Option<&str>,
    token: Option<&str>,
) -> AuthorizerResponse {
    auth.handle(&request(header, token), 0).await
}

#[tokio::test]
async fn test_header_and_token_both_required() {
    let auth = TestAuthorizer::new()
        .with_header_check("x-origin-verify", secret())
        .with_token_check(verifier());
    let good = TestIdentity::access_token("user-7").sign();
    let expired = TestIdentity::access_token("user-7").expired().sign();
    let forged = TestIdentity::access_token("user-7").sign_with_rogue_key();

    let allowed = decide(&auth, Some(SECRET), Some(&good)).await;
    assert!(allowed.is_allow());
    assert_eq!(allowed.principal_id, "user-7");

    let denials = [
        (None, Some(good.as_str())),
        (Some("stale-value"), Some(good.as_str())),
        (Some(SECRET), None),
        (Some(SECRET), Some(expired.as_str())),
        (Some(SECRET), Some(forged.as_str())),
        (Some(SECRET), Some("garbage")),
    ];
    for (header, token) in denials {
        let response = decide(&auth, header, token).await;
        assert!(!response.is_allow(), "allowed header={header:?} token={token:?}");
        assert_eq!(response.principal_id, ANONYMOUS_PRINCIPAL);
    }
}

#[tokio::test]
async fn test_header_only_ignores_token() {
    let auth = TestAuthorizer::new().with_header_check("x-origin-verify", secret());
    let response = decide(&auth, Some(SECRET), Some("garbage")).await;
    assert!(response.is_allow());
    assert_eq!(response.principal_id, ANONYMOUS_PRINCIPAL);
}

#[tokio::test]
async fn test_token_only() {
    let auth = TestAuthorizer::new().with_token_check(verifier());
    let token = TestIdentity::id_token("user-9").sign();
    assert!(decide(&auth, None, Some(&token)).await.is_allow());
    assert!(!decide(&auth, Some(SECRET), None).await.is_allow());
}

#[tokio::test]
async fn test_policy_json_shape() {
    let auth = TestAuthorizer::new().with_header_check("x-origin-verify", secret());
    let response = serde_json::to_value(decide(&auth, Some(SECRET), None).await).unwrap();
    assert_eq!(
        response,
        json!({
            "principalId": ANONYMOUS_PRINCIPAL,
            "policyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Action": "execute-api:Invoke",
                    "Effect": "Allow",
                    "Resource": METHOD_ARN
                }]
            }
        })
    );
}

#[tokio::test]
async fn test_edge_output_passes_authorizer() {
    let injector = OriginHeaderInjector::new("x-origin-verify", secret());
    let auth = TestAuthorizer::new().with_header_check("x-origin-verify", secret());

    let event: EdgeEvent = serde_json::from_value(json!({
        "Records": [{"cf": {"request": {
            "method": "GET",
            "uri": "/api/items",
            "headers": {"host": [{"key": "Host", "value": "d111.cloudfront.net"}]}
        }}}]
    }))
    .unwrap();
    let EdgeResult::Request(forwarded) = injector.handle(event, 0).await else {
        panic!("expected a forwarded request");
    };

    // API Gateway flattens the CloudFront header lists into single values
    let headers: HashMap<String, String> = forwarded
        .headers
        .iter()
        .filter_map(|(name, entries)| Some((name.clone(), entries.first()?.value.clone())))
        .collect();
    let event = AuthorizerEvent {
        method_arn: METHOD_ARN.to_string(),
        headers: Some(headers),
    };
    assert!(auth.handle(&event, 0).await.is_allow());
}

#[test]
fn test_config_matches_fixture_pool() {
    let vars = HashMap::from([
        (env::AWS_REGION, "eu-west-1"),
        (env::USER_POOL_ID, TEST_USER_POOL_ID),
        (env::USER_POOL_CLIENT_ID, TEST_CLIENT_ID),
    ]);
    let config =
        AuthorizerConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
    assert_eq!(config.issuer(), Some(issuer()));
}
