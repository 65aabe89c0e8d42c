//! Parameter-store key contract between the two trees
//!
//! The edge security tree publishes its identifiers under one shared prefix
//! and the application tree, synthesized later in another region, reads them
//! back by name.
//!
//! ## Key Schema
//!
//! | Key suffix | Value | Required |
//! |------------|-------|----------|
//! | `waf-acl-arn` | WAF web ACL ARN | no |
//! | `header-name` | Shared-secret header name | yes |
//! | `secret-arn` | Shared-secret ARN | yes |
//! | `edge-function-version-arn` | Edge function version ARN | yes |
//! | `certificate-arn` | CloudFront certificate ARN | no |
//! | `secret-rotated-at` | Last rotation time, written by the rotation handler | no |

/// Keys published under the shared parameter-store prefix
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum ParameterKey {
    #[strum(serialize = "waf-acl-arn")]
    WafAclArn,
    #[strum(serialize = "header-name")]
    HeaderName,
    #[strum(serialize = "secret-arn")]
    SecretArn,
    #[strum(serialize = "edge-function-version-arn")]
    EdgeFunctionVersionArn,
    #[strum(serialize = "certificate-arn")]
    CertificateArn,
    #[strum(serialize = "secret-rotated-at")]
    SecretRotatedAt,
}

impl ParameterKey {
    /// Keys whose absence must fail a consumer read
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Self::HeaderName | Self::SecretArn | Self::EdgeFunctionVersionArn
        )
    }

    /// Full parameter name under `prefix`
    pub fn under(self, prefix: &str) -> String {
        format!("{}{}", normalize_prefix(prefix), self.as_ref())
    }
}

/// Normalize a parameter-store prefix to start and end with `/`.
///
/// An empty prefix becomes `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}
