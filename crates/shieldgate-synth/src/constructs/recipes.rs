//! Preset configurations for the two trees
//!
//! `minimal` recipes are meant for development stacks and delete their
//! data with the stack. Every other recipe retains stateful resources.

use super::app::{AppTree, AppTreeProps};
use super::edge::{EdgeSecurityProps, EdgeSecurityTree, SecretChoice};
use crate::error::{Result, SynthError};
use crate::params::EdgeParameters;
use crate::primitives::{CertificateProps, FirewallProps, RotatingSecretProps, SiteProps};
use crate::template::{RemovalPolicy, Setting, Stack, Token};
use shieldgate_common::ParameterKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

/// A custom domain for the site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomDomain {
    pub domain_name: String,
    pub alternate_domain_names: Vec<String>,
    pub certificate_arn: Option<String>,
    pub hosted_zone: Option<HostedZone>,
}

impl CustomDomain {
    pub fn new(domain_name: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn apply(&self, site: &mut SiteProps) {
        site.domain_name = Some(self.domain_name.clone());
        site.alternate_domain_names = self.alternate_domain_names.clone();
        site.certificate_arn = self.certificate_arn.as_deref().map(Token::literal);
        site.hosted_zone_id = self.hosted_zone.as_ref().map(|z| z.id.clone());
        site.hosted_zone_name = self.hosted_zone.as_ref().map(|z| z.name.clone());
    }
}

/// Knobs the edge recipes expose
#[derive(Debug, Clone, Default)]
pub struct EdgeOptions {
    pub ssm_prefix: Option<String>,
    pub header_name: Option<String>,
    /// Default 2000; 0 keeps the firewall but drops the rate rule
    pub rate_limit: Option<u32>,
    /// Default 7
    pub rotation_days: Option<u32>,
    pub replica_regions: Vec<String>,
}

impl EdgeOptions {
    fn into_props(self, firewall: bool) -> EdgeSecurityProps {
        EdgeSecurityProps {
            ssm_prefix: self.ssm_prefix,
            header_name: self.header_name,
            firewall: if firewall {
                Setting::Set(FirewallProps {
                    rate_limit: self.rate_limit,
                    ..Default::default()
                })
            } else {
                Setting::Absent
            },
            secret: SecretChoice::Create(RotatingSecretProps {
                rotation_days: self.rotation_days,
                ..Default::default()
            }),
            replica_regions: self.replica_regions,
            ..Default::default()
        }
    }
}

impl AppTree {
    /// Development stack: generated secret, no custom domain, everything
    /// destroyed with the stack
    pub fn minimal(stack: &mut Stack, id: &str) -> Result<Self> {
        Self::new(
            stack,
            id,
            AppTreeProps {
                removal_policy: Some(RemovalPolicy::Destroy),
                ..Default::default()
            },
        )
    }

    pub fn with_custom_domain(stack: &mut Stack, id: &str, domain: &CustomDomain) -> Result<Self> {
        let mut props = AppTreeProps {
            removal_policy: Some(RemovalPolicy::Retain),
            ..Default::default()
        };
        domain.apply(&mut props.site);
        Self::new(stack, id, props)
    }

    /// Behind the edge stack's web ACL; the published ACL ARN is required
    pub fn with_firewall(stack: &mut Stack, id: &str, edge: EdgeParameters) -> Result<Self> {
        require_firewall(&edge)?;
        Self::new(
            stack,
            id,
            AppTreeProps {
                removal_policy: Some(RemovalPolicy::Retain),
                edge: Some(edge),
                ..Default::default()
            },
        )
    }

    pub fn with_custom_domain_and_firewall(
        stack: &mut Stack,
        id: &str,
        domain: &CustomDomain,
        edge: EdgeParameters,
    ) -> Result<Self> {
        require_firewall(&edge)?;
        let mut props = AppTreeProps {
            removal_policy: Some(RemovalPolicy::Retain),
            edge: Some(edge),
            ..Default::default()
        };
        domain.apply(&mut props.site);
        Self::new(stack, id, props)
    }
}

fn require_firewall(edge: &EdgeParameters) -> Result<()> {
    match edge.waf_acl_arn {
        Some(_) => Ok(()),
        None => Err(SynthError::MissingParameter {
            name: ParameterKey::WafAclArn.under(&edge.prefix),
        }),
    }
}

impl EdgeSecurityTree {
    /// Rotating secret and edge function only, no firewall
    pub fn minimal(stack: &mut Stack, id: &str, options: EdgeOptions) -> Result<Self> {
        Self::new(stack, id, options.into_props(false))
    }

    pub fn with_firewall(stack: &mut Stack, id: &str, options: EdgeOptions) -> Result<Self> {
        Self::new(stack, id, options.into_props(true))
    }

    /// Firewall plus a certificate for the app's custom domain
    pub fn with_custom_domain(
        stack: &mut Stack,
        id: &str,
        options: EdgeOptions,
        domain: &CustomDomain,
    ) -> Result<Self> {
        let mut props = options.into_props(true);
        if domain.certificate_arn.is_none() {
            props.certificate = Some(CertificateProps {
                domain_name: domain.domain_name.clone(),
                alternate_names: domain.alternate_domain_names.clone(),
                hosted_zone_id: domain.hosted_zone.as_ref().map(|z| z.id.clone()),
            });
        }
        Self::new(stack, id, props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StackEnv;
    use shieldgate_common::ResourceKind;

    #[test]
    fn test_minimal_app_is_disposable() {
        let mut stack = Stack::new("dev", StackEnv::region("eu-west-1"));
        let tree = AppTree::minimal(&mut stack, "App").unwrap();
        assert_eq!(tree.table.removal_policy, RemovalPolicy::Destroy);
        assert_eq!(stack.count_of(ResourceKind::S3AutoDeleteObjects), 1);
    }

    #[test]
    fn test_custom_domain_requires_certificate() {
        let mut stack = Stack::new("prod", StackEnv::region("eu-west-1"));
        let domain = CustomDomain::new("app.example.com");
        let err = AppTree::with_custom_domain(&mut stack, "App", &domain).unwrap_err();
        assert!(err.to_string().contains("certificate"));
    }

    #[test]
    fn test_custom_domain_retains() {
        let mut stack = Stack::new("prod", StackEnv::region("eu-west-1"));
        let domain = CustomDomain {
            certificate_arn: Some("arn:aws:acm:us-east-1:1:certificate/abc".into()),
            ..CustomDomain::new("app.example.com")
        };
        let tree = AppTree::with_custom_domain(&mut stack, "App", &domain).unwrap();
        assert_eq!(tree.site.removal_policy, RemovalPolicy::Retain);
        assert!(!tree.site.auto_delete_objects);
        assert_eq!(tree.site.domain_names, vec!["app.example.com".to_string()]);
    }

    #[test]
    fn test_with_firewall_needs_published_acl() {
        let mut stack = Stack::new("prod", StackEnv::region("eu-west-1"));
        let edge = EdgeParameters {
            prefix: "/app/security/".into(),
            header_name: "x-origin-verify".into(),
            secret_arn: "arn:s".into(),
            edge_function_version_arn: "arn:v".into(),
            waf_acl_arn: None,
            certificate_arn: None,
        };
        let err = AppTree::with_firewall(&mut stack, "App", edge).unwrap_err();
        assert!(err.to_string().contains("/app/security/waf-acl-arn"));
    }

    #[test]
    fn test_edge_recipes() {
        let mut stack = Stack::new("edge", StackEnv::region("us-east-1"));
        let minimal = EdgeSecurityTree::minimal(&mut stack, "Min", EdgeOptions::default()).unwrap();
        assert!(minimal.firewall.is_none());

        let domain = CustomDomain {
            hosted_zone: Some(HostedZone {
                id: "Z1".into(),
                name: "example.com".into(),
            }),
            ..CustomDomain::new("app.example.com")
        };
        let full = EdgeSecurityTree::with_custom_domain(
            &mut stack,
            "Full",
            EdgeOptions {
                ssm_prefix: Some("/full/".into()),
                ..Default::default()
            },
            &domain,
        )
        .unwrap();
        assert!(full.firewall.is_some());
        assert!(full.certificate.is_some());
        assert!(full.parameter(ParameterKey::CertificateArn).is_some());
    }
}
