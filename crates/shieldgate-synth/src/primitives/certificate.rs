//! ACM certificates for CloudFront

use crate::error::{Result, SynthError};
use crate::template::{Resource, Stack, Token};
use serde_json::json;
use shieldgate_common::ResourceKind;
use shieldgate_common::defaults::REQUIRED_EDGE_REGION;

#[derive(Debug, Clone, Default)]
pub struct CertificateProps {
    pub domain_name: String,
    pub alternate_names: Vec<String>,
    /// Zone for DNS validation records; without it validation is manual
    pub hosted_zone_id: Option<String>,
}

/// Handle to a DNS-validated certificate
#[derive(Debug, Clone)]
pub struct Certificate {
    pub logical_id: String,
    pub certificate_arn: Token,
    pub domain_name: String,
}

impl Certificate {
    /// Mint a certificate usable by CloudFront.
    ///
    /// CloudFront only accepts certificates from us-east-1, so the stack
    /// must deploy there.
    pub fn new(stack: &mut Stack, id: &str, props: CertificateProps) -> Result<Self> {
        if props.domain_name.is_empty() {
            return Err(SynthError::invalid("domain_name", "must not be empty"));
        }
        stack.require_region(REQUIRED_EDGE_REGION, "CloudFront certificate")?;

        let validation: Option<Vec<_>> = props.hosted_zone_id.as_ref().map(|zone| {
            std::iter::once(&props.domain_name)
                .chain(&props.alternate_names)
                .map(|d| json!({ "DomainName": d, "HostedZoneId": zone }))
                .collect()
        });

        let logical_id = stack.add(
            id,
            Resource::new(ResourceKind::Certificate).with_properties(json!({
                "DomainName": props.domain_name,
                "SubjectAlternativeNames": (!props.alternate_names.is_empty())
                    .then_some(&props.alternate_names),
                "ValidationMethod": "DNS",
                "DomainValidationOptions": validation,
            })),
        )?;
        Ok(Self {
            certificate_arn: Token::reference(&logical_id),
            logical_id,
            domain_name: props.domain_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StackEnv;

    fn props() -> CertificateProps {
        CertificateProps {
            domain_name: "app.example.com".into(),
            alternate_names: vec!["www.example.com".into()],
            hosted_zone_id: Some("Z123".into()),
        }
    }

    #[test]
    fn test_validation_options_per_name() {
        let mut stack = Stack::new("s", StackEnv::region("us-east-1"));
        let cert = Certificate::new(&mut stack, "Cert", props()).unwrap();
        let r = stack.resource(&cert.logical_id).unwrap();
        assert_eq!(r.prop("ValidationMethod"), Some(&json!("DNS")));
        assert_eq!(r.prop("DomainValidationOptions").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_wrong_region() {
        let mut stack = Stack::new("s", StackEnv::region("eu-central-1"));
        let err = Certificate::new(&mut stack, "Cert", props()).unwrap_err();
        assert!(err.to_string().contains("us-east-1"));
    }
}
