//! Shared-secret payload shape
//!
//! The secret string is a small JSON document: the header name (kept for the
//! rotation handler's own bookkeeping) and the rotating value. Consumers only
//! ever read `value`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON key holding the rotating value
pub const VALUE_KEY: &str = "value";

/// JSON key holding the header name
pub const HEADER_NAME_KEY: &str = "headerName";

/// Errors decoding a secret string
#[derive(Debug, Error)]
pub enum SecretPayloadError {
    #[error("secret payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("secret payload has an empty value")]
    EmptyValue,
}

/// Decoded shared-secret payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPayload {
    #[serde(rename = "headerName", default)]
    pub header_name: String,
    pub value: String,
}

impl SecretPayload {
    pub fn new(header_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
            value: value.into(),
        }
    }

    /// Parse a secret string, rejecting payloads without a usable value
    pub fn parse(secret_string: &str) -> Result<Self, SecretPayloadError> {
        let payload: SecretPayload = serde_json::from_str(secret_string)?;
        if payload.value.is_empty() {
            return Err(SecretPayloadError::EmptyValue);
        }
        Ok(payload)
    }

    /// Serialize back to the secret string stored in Secrets Manager
    pub fn to_secret_string(&self) -> String {
        serde_json::json!({
            HEADER_NAME_KEY: self.header_name,
            VALUE_KEY: self.value,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        let payload =
            SecretPayload::parse(r#"{"headerName":"x-origin-verify","value":"s3cr3t"}"#).unwrap();
        assert_eq!(payload.header_name, "x-origin-verify");
        assert_eq!(payload.value, "s3cr3t");
    }

    #[test]
    fn test_header_name_optional() {
        let payload = SecretPayload::parse(r#"{"value":"abc"}"#).unwrap();
        assert_eq!(payload.header_name, "");
    }

    #[test]
    fn test_rejects_empty_or_missing_value() {
        assert!(matches!(
            SecretPayload::parse(r#"{"headerName":"h","value":""}"#),
            Err(SecretPayloadError::EmptyValue)
        ));
        assert!(matches!(
            SecretPayload::parse(r#"{"headerName":"h"}"#),
            Err(SecretPayloadError::Malformed(_))
        ));
        assert!(SecretPayload::parse("plain-text").is_err());
    }

    #[test]
    fn test_secret_string_uses_wire_keys() {
        let s = SecretPayload::new("x-h", "v").to_secret_string();
        let json: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(json["headerName"], "x-h");
        assert_eq!(json["value"], "v");
    }
}
