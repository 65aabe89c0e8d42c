//! Edge security tree
//!
//! Everything CloudFront needs from us-east-1: the web ACL, the rotating
//! origin secret, the edge function that stamps it onto API requests and,
//! optionally, the certificate. Identifiers are published to the parameter
//! store so the app stack, deployed elsewhere, can find them.

use crate::error::Result;
use crate::primitives::{
    Certificate, CertificateProps, EdgeFunction, EdgeFunctionProps, Firewall, FirewallProps,
    FunctionProps, OriginSecret, RotatingSecret, RotatingSecretProps, StringParameter,
    StringParameterProps,
};
use crate::primitives::secret::validate_header_name;
use crate::template::{Setting, Stack, Token, sanitize_logical_id};
use shieldgate_common::ParameterKey;
use shieldgate_common::defaults::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_HEADER_NAME, DEFAULT_SSM_PREFIX, REQUIRED_EDGE_REGION,
};
use shieldgate_common::params::normalize_prefix;
use std::collections::BTreeMap;
use tracing::info;

/// Build constant names the edge function is compiled with
pub mod build_constants {
    pub const SECRET_NAME: &str = "SECRET_NAME";
    pub const SECRET_REGION: &str = "SECRET_REGION";
    pub const HEADER_NAME: &str = "HEADER_NAME";
    pub const CACHE_TTL_SECONDS: &str = "CACHE_TTL_SECONDS";
}

/// Where the origin secret comes from
#[derive(Debug, Clone)]
pub enum SecretChoice {
    /// Create a rotating secret
    Create(RotatingSecretProps),
    /// Use a secret managed elsewhere; its name must be a literal
    Existing {
        secret_name: String,
        secret_arn: Token,
    },
}

impl Default for SecretChoice {
    fn default() -> Self {
        SecretChoice::Create(RotatingSecretProps::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgeSecurityProps {
    /// Default: `/shieldgate/security/`
    pub ssm_prefix: Option<String>,
    /// Default: `x-origin-verify`
    pub header_name: Option<String>,
    /// Unset: firewall with defaults; `Absent`: no firewall
    pub firewall: Setting<FirewallProps>,
    pub secret: SecretChoice,
    pub edge_function: FunctionProps,
    /// How long the edge function caches the secret. Default: 300 seconds
    pub cache_ttl_secs: Option<u64>,
    pub certificate: Option<CertificateProps>,
    /// Regions the secret replicates to, typically the app region
    pub replica_regions: Vec<String>,
}

/// Handle to the synthesized edge tree
#[derive(Debug, Clone)]
pub struct EdgeSecurityTree {
    pub ssm_prefix: String,
    pub firewall: Option<Firewall>,
    pub secret: Option<RotatingSecret>,
    pub origin_secret: OriginSecret,
    pub edge_function: EdgeFunction,
    pub certificate: Option<Certificate>,
    pub parameters: Vec<StringParameter>,
}

impl EdgeSecurityTree {
    pub fn new(stack: &mut Stack, id: &str, props: EdgeSecurityProps) -> Result<Self> {
        let base = sanitize_logical_id(id)?;
        stack.require_region(REQUIRED_EDGE_REGION, &format!("EdgeSecurityTree '{base}'"))?;

        let ssm_prefix =
            normalize_prefix(props.ssm_prefix.as_deref().unwrap_or(DEFAULT_SSM_PREFIX));
        let header_name = props
            .header_name
            .unwrap_or_else(|| DEFAULT_HEADER_NAME.to_string());
        validate_header_name(&header_name)?;

        let firewall = props
            .firewall
            .resolve_or_else(|| Some(FirewallProps::default()))
            .map(|fw| Firewall::new(stack, &format!("{base}Firewall"), fw))
            .transpose()?;

        let (secret, secret_name, origin_secret) = match props.secret {
            SecretChoice::Create(mut secret_props) => {
                secret_props.header_name.get_or_insert_with(|| header_name.clone());
                secret_props.ssm_prefix.get_or_insert_with(|| ssm_prefix.clone());
                secret_props.replica_regions.extend(props.replica_regions);
                let secret =
                    RotatingSecret::new(stack, &format!("{base}OriginSecret"), secret_props)?;
                let origin = secret.origin_secret();
                let name = secret.secret_name.clone();
                (Some(secret), name, origin)
            }
            SecretChoice::Existing {
                secret_name,
                secret_arn,
            } => {
                let origin = OriginSecret {
                    header_name: header_name.clone(),
                    secret_arn,
                    secret_name: Some(secret_name.clone()),
                };
                (None, secret_name, origin)
            }
        };

        // The edge function is compiled with the secret's name, never its ARN
        let constants: BTreeMap<String, Token> = [
            (build_constants::SECRET_NAME, Token::literal(&secret_name)),
            (build_constants::SECRET_REGION, Token::literal(REQUIRED_EDGE_REGION)),
            (build_constants::HEADER_NAME, Token::literal(&origin_secret.header_name)),
            (
                build_constants::CACHE_TTL_SECONDS,
                Token::literal(
                    props
                        .cache_ttl_secs
                        .unwrap_or(DEFAULT_CACHE_TTL_SECS)
                        .to_string(),
                ),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let edge_function = EdgeFunction::new(
            stack,
            &format!("{base}OriginHeaderInjector"),
            EdgeFunctionProps {
                function: props.edge_function,
                build_constants: constants,
            },
        )?;
        origin_secret.grant_read(stack, &edge_function.function)?;

        let certificate = props
            .certificate
            .map(|cert| Certificate::new(stack, &format!("{base}Certificate"), cert))
            .transpose()?;

        let mut published = Vec::new();
        if let Some(fw) = &firewall {
            published.push((ParameterKey::WafAclArn, fw.web_acl_arn.clone()));
        }
        published.push((ParameterKey::HeaderName, Token::literal(&origin_secret.header_name)));
        published.push((ParameterKey::SecretArn, origin_secret.secret_arn.clone()));
        published.push((
            ParameterKey::EdgeFunctionVersionArn,
            edge_function.version_arn.clone(),
        ));
        if let Some(cert) = &certificate {
            published.push((ParameterKey::CertificateArn, cert.certificate_arn.clone()));
        }

        let mut parameters = Vec::with_capacity(published.len());
        for (key, value) in published {
            let param = StringParameter::new(
                stack,
                &format!("{base}{key:?}Parameter"),
                StringParameterProps {
                    name: key.under(&ssm_prefix),
                    value: value.clone(),
                    description: Some(format!("Published by the edge stack: {key}")),
                    tier: None,
                },
            )?;
            stack.add_output(&format!("{base}{key:?}"), value, key.to_string())?;
            parameters.push(param);
        }

        info!(
            stack = %stack.name(),
            prefix = %ssm_prefix,
            firewall = firewall.is_some(),
            parameters = parameters.len(),
            "Synthesized edge security tree"
        );

        Ok(Self {
            ssm_prefix,
            firewall,
            secret,
            origin_secret,
            edge_function,
            certificate,
            parameters,
        })
    }

    /// The parameter published for `key`, if any
    pub fn parameter(&self, key: ParameterKey) -> Option<&StringParameter> {
        let name = key.under(&self.ssm_prefix);
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthError;
    use crate::template::StackEnv;
    use shieldgate_common::ResourceKind;

    fn synth(props: EdgeSecurityProps) -> Result<(Stack, EdgeSecurityTree)> {
        let mut stack = Stack::new("edge", StackEnv::region("us-east-1"));
        let tree = EdgeSecurityTree::new(&mut stack, "Edge", props)?;
        Ok((stack, tree))
    }

    #[test]
    fn test_defaults() {
        let (stack, tree) = synth(EdgeSecurityProps::default()).unwrap();
        assert_eq!(tree.ssm_prefix, "/shieldgate/security/");
        assert_eq!(tree.firewall.as_ref().unwrap().rate_limit, 2000);
        assert_eq!(tree.secret.as_ref().unwrap().schedule_expression, "rate(7 days)");
        assert_eq!(tree.origin_secret.header_name, "x-origin-verify");
        assert_eq!(tree.parameters.len(), 4);
        assert!(tree.parameter(ParameterKey::CertificateArn).is_none());
        assert_eq!(stack.count_of(ResourceKind::WebAcl), 1);
        assert_eq!(stack.count_of(ResourceKind::SsmParameter), 4);
    }

    #[test]
    fn test_edge_function_gets_secret_name() {
        let (_, tree) = synth(EdgeSecurityProps::default()).unwrap();
        let constants = &tree.edge_function.build_constants;
        assert_eq!(constants[build_constants::SECRET_NAME], "edge-origin-verify");
        assert_eq!(constants[build_constants::SECRET_REGION], "us-east-1");
        assert_eq!(constants[build_constants::HEADER_NAME], "x-origin-verify");
        assert_eq!(constants[build_constants::CACHE_TTL_SECONDS], "300");
    }

    #[test]
    fn test_firewall_absent() {
        let (stack, tree) = synth(EdgeSecurityProps {
            firewall: Setting::Absent,
            ..Default::default()
        })
        .unwrap();
        assert!(tree.firewall.is_none());
        assert!(tree.parameter(ParameterKey::WafAclArn).is_none());
        assert_eq!(stack.count_of(ResourceKind::WebAcl), 0);
    }

    #[test]
    fn test_existing_secret() {
        let (stack, tree) = synth(EdgeSecurityProps {
            secret: SecretChoice::Existing {
                secret_name: "shared-origin".into(),
                secret_arn: Token::literal(
                    "arn:aws:secretsmanager:us-east-1:1:secret:shared-origin-AbC",
                ),
            },
            ..Default::default()
        })
        .unwrap();
        assert!(tree.secret.is_none());
        assert_eq!(stack.count_of(ResourceKind::Secret), 0);
        assert_eq!(
            tree.edge_function.build_constants[build_constants::SECRET_NAME],
            "shared-origin"
        );
    }

    #[test]
    fn test_header_name_flows_everywhere() {
        let (_, tree) = synth(EdgeSecurityProps {
            header_name: Some("x-edge-secret".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(tree.secret.as_ref().unwrap().header_name, "x-edge-secret");
        assert_eq!(
            tree.edge_function.build_constants[build_constants::HEADER_NAME],
            "x-edge-secret"
        );
        assert_eq!(
            tree.parameter(ParameterKey::HeaderName).unwrap().value,
            Token::literal("x-edge-secret")
        );
    }

    #[test]
    fn test_certificate_published() {
        let (_, tree) = synth(EdgeSecurityProps {
            certificate: Some(CertificateProps {
                domain_name: "app.example.com".into(),
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap();
        assert!(tree.parameter(ParameterKey::CertificateArn).is_some());
    }

    #[test]
    fn test_region_mismatch_names_required_region() {
        let mut stack = Stack::new("edge", StackEnv::region("ap-southeast-2"));
        let err =
            EdgeSecurityTree::new(&mut stack, "Edge", EdgeSecurityProps::default()).unwrap_err();
        assert!(matches!(err, SynthError::RegionMismatch { .. }));
        assert!(err.to_string().contains("us-east-1"));
    }
}
