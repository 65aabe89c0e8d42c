//! Identity token fixtures
//!
//! Tokens are signed with a checked-in RSA key whose public half is
//! published in [`JWKS_JSON`] under [`TEST_KID`]. The rogue key is not in
//! the key set and stands in for a forged token.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};

pub const TEST_KID: &str = "test-key-1";
pub const TEST_REGION: &str = "us-east-1";
pub const TEST_USER_POOL_ID: &str = "us-east-1_TestPool1";
pub const TEST_CLIENT_ID: &str = "3example4client5id";

pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
pub const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");
/// Key set containing the public half of [`SIGNING_KEY_PEM`]
pub const JWKS_JSON: &str = include_str!("../fixtures/jwks.json");

/// Issuer URL of the test user pool
pub fn issuer() -> String {
    format!("https://cognito-idp.{TEST_REGION}.amazonaws.com/{TEST_USER_POOL_ID}")
}

/// Claims for a test token, defaulting to a valid id token
#[derive(Debug, Clone)]
pub struct TestIdentity {
    pub sub: String,
    pub token_use: String,
    pub issuer: String,
    pub client_id: String,
    /// Seconds from now; negative for an expired token
    pub expires_in: i64,
    pub kid: Option<String>,
}

impl TestIdentity {
    pub fn id_token(sub: &str) -> Self {
        Self {
            sub: sub.to_string(),
            token_use: "id".to_string(),
            issuer: issuer(),
            client_id: TEST_CLIENT_ID.to_string(),
            expires_in: 3600,
            kid: Some(TEST_KID.to_string()),
        }
    }

    pub fn access_token(sub: &str) -> Self {
        Self {
            token_use: "access".to_string(),
            ..Self::id_token(sub)
        }
    }

    pub fn expired(mut self) -> Self {
        self.expires_in = -600;
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.issuer = issuer.to_string();
        self
    }

    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.client_id = client_id.to_string();
        self
    }

    pub fn with_token_use(mut self, token_use: &str) -> Self {
        self.token_use = token_use.to_string();
        self
    }

    pub fn with_kid(mut self, kid: Option<&str>) -> Self {
        self.kid = kid.map(str::to_string);
        self
    }

    /// Claim set in the shape the identity provider issues: id tokens carry
    /// the client in `aud`, access tokens in `client_id`.
    pub fn claims(&self) -> Value {
        let now = Utc::now().timestamp();
        let mut claims = json!({
            "sub": self.sub,
            "iss": self.issuer,
            "token_use": self.token_use,
            "iat": now,
            "exp": now + self.expires_in,
        });
        let client_claim = if self.token_use == "id" { "aud" } else { "client_id" };
        claims[client_claim] = json!(self.client_id);
        claims
    }

    pub fn sign(&self) -> String {
        sign_token(&self.claims(), self.kid.as_deref(), SIGNING_KEY_PEM)
    }

    pub fn sign_with_rogue_key(&self) -> String {
        sign_token(&self.claims(), self.kid.as_deref(), ROGUE_KEY_PEM)
    }
}

/// Sign `claims` with RS256
pub fn sign_token(claims: &Value, kid: Option<&str>, pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key should parse");
    encode(&header, claims, &key).expect("fixture token should sign")
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::decode_header;

    #[test]
    fn test_token_header_carries_kid() {
        let token = TestIdentity::id_token("user-1").sign();
        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some(TEST_KID));
    }

    #[test]
    fn test_client_claim_depends_on_token_use() {
        let id = TestIdentity::id_token("u").claims();
        assert_eq!(id["aud"], TEST_CLIENT_ID);
        assert!(id.get("client_id").is_none());

        let access = TestIdentity::access_token("u").claims();
        assert_eq!(access["client_id"], TEST_CLIENT_ID);
        assert!(access.get("aud").is_none());
    }

    #[test]
    fn test_key_set_lists_signing_key() {
        let jwks: Value = serde_json::from_str(JWKS_JSON).unwrap();
        assert_eq!(jwks["keys"][0]["kid"], TEST_KID);
        assert_eq!(jwks["keys"][0]["e"], "AQAB");
    }
}
