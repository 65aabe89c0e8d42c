//! Configuration types for the synthesizer

use crate::constructs::{CustomDomain, EdgeOptions, HostedZone};
use crate::error::ConfigError;
use shieldgate_common::defaults::{
    DEFAULT_RATE_LIMIT, DEFAULT_ROTATION_DAYS, DEFAULT_SSM_PREFIX, MIN_RATE_LIMIT,
    REQUIRED_EDGE_REGION,
};
use std::path::PathBuf;

/// Stack naming and placement
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Output directory for templates and the manifest
    pub out_dir: PathBuf,
    /// Prefix for both stack names
    pub stack_prefix: String,
    /// Region of the edge stack; anything but us-east-1 fails synthesis
    pub edge_region: String,
    /// Region of the app stack; `None` synthesizes an environment-agnostic stack
    pub app_region: Option<String>,
    /// Pinned account, set by `--resolve-account`
    pub account: Option<String>,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

/// Custom domain settings
#[derive(Debug, Clone, Default)]
pub struct DomainConfig {
    pub domain_name: Option<String>,
    pub alternate_domain_names: Vec<String>,
    pub hosted_zone_id: Option<String>,
    pub hosted_zone_name: Option<String>,
    pub certificate_arn: Option<String>,
}

/// Edge security settings
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Parameter-store prefix shared by both stacks
    pub ssm_prefix: String,
    /// Requests per IP per 5 minutes; 0 disables the rate rule
    pub waf_rate_limit: u32,
    pub rotation_days: u32,
    /// Skip the web ACL entirely
    pub no_firewall: bool,
}

/// Synthesis behavior flags
#[derive(Debug, Clone, Default)]
pub struct SynthFlags {
    /// Destroy stateful resources with the stack instead of retaining them
    pub destroy_on_delete: bool,
    /// Look up the caller's account and pin it in the stack environment
    pub resolve_account: bool,
    /// Read edge parameters from a JSON file instead of SSM
    pub params_file: Option<PathBuf>,
    /// Register simulated edge outputs instead of reading deployed ones
    pub offline: bool,
}

/// Configuration for a synthesis run
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub stacks: StackConfig,
    pub domain: DomainConfig,
    pub security: SecurityConfig,
    pub flags: SynthFlags,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            stacks: StackConfig {
                out_dir: PathBuf::from("cdk.out"),
                stack_prefix: "shieldgate".to_string(),
                edge_region: REQUIRED_EDGE_REGION.to_string(),
                app_region: None,
                account: None,
                aws_profile: None,
            },
            domain: DomainConfig::default(),
            security: SecurityConfig {
                ssm_prefix: DEFAULT_SSM_PREFIX.to_string(),
                waf_rate_limit: DEFAULT_RATE_LIMIT,
                rotation_days: DEFAULT_ROTATION_DAYS,
                no_firewall: false,
            },
            flags: SynthFlags::default(),
        }
    }
}

impl SynthConfig {
    /// Check option combinations that clap cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let domain = &self.domain;
        if domain.hosted_zone_id.is_some() != domain.hosted_zone_name.is_some() {
            return Err(ConfigError::PartialPair {
                first: "hosted-zone-id",
                second: "hosted-zone-name",
            });
        }
        if domain.domain_name.is_none() {
            if !domain.alternate_domain_names.is_empty() {
                return Err(ConfigError::DependentOption {
                    field: "alternate-domain-names",
                    requires: "domain-name",
                });
            }
            if domain.certificate_arn.is_some() {
                return Err(ConfigError::DependentOption {
                    field: "certificate-arn",
                    requires: "domain-name",
                });
            }
            if domain.hosted_zone_id.is_some() {
                return Err(ConfigError::DependentOption {
                    field: "hosted-zone-id",
                    requires: "domain-name",
                });
            }
        }

        let rate = self.security.waf_rate_limit;
        if rate != 0 && rate < MIN_RATE_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "--waf-rate-limit must be 0 or at least {MIN_RATE_LIMIT}, got {rate}"
            )));
        }
        if !(1..=1000).contains(&self.security.rotation_days) {
            return Err(ConfigError::Invalid(format!(
                "--rotation-days must be between 1 and 1000, got {}",
                self.security.rotation_days
            )));
        }
        if self.flags.offline && self.flags.params_file.is_some() {
            return Err(ConfigError::Invalid(
                "--offline and --params-file are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn edge_stack_name(&self) -> String {
        format!("{}-edge", self.stacks.stack_prefix)
    }

    pub fn app_stack_name(&self) -> String {
        format!("{}-app", self.stacks.stack_prefix)
    }

    pub fn custom_domain(&self) -> Option<CustomDomain> {
        let domain = &self.domain;
        let domain_name = domain.domain_name.clone()?;
        let hosted_zone = match (&domain.hosted_zone_id, &domain.hosted_zone_name) {
            (Some(id), Some(name)) => Some(HostedZone {
                id: id.clone(),
                name: name.clone(),
            }),
            _ => None,
        };
        Some(CustomDomain {
            domain_name,
            alternate_domain_names: domain.alternate_domain_names.clone(),
            certificate_arn: domain.certificate_arn.clone(),
            hosted_zone,
        })
    }

    /// Secret replicas follow the app stack when it lives elsewhere
    pub fn replica_regions(&self) -> Vec<String> {
        match &self.stacks.app_region {
            Some(region) if *region != self.stacks.edge_region => vec![region.clone()],
            _ => Vec::new(),
        }
    }

    pub fn edge_options(&self) -> EdgeOptions {
        EdgeOptions {
            ssm_prefix: Some(self.security.ssm_prefix.clone()),
            header_name: None,
            rate_limit: Some(self.security.waf_rate_limit),
            rotation_days: Some(self.security.rotation_days),
            replica_regions: self.replica_regions(),
        }
    }

    pub fn out_dir(&self) -> &std::path::Path {
        &self.stacks.out_dir
    }
    pub fn aws_profile(&self) -> Option<&str> {
        self.stacks.aws_profile.as_deref()
    }
    pub fn firewall(&self) -> bool {
        !self.security.no_firewall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SynthConfig::default();
        config.validate().unwrap();
        assert_eq!(config.edge_stack_name(), "shieldgate-edge");
        assert_eq!(config.app_stack_name(), "shieldgate-app");
        assert!(config.custom_domain().is_none());
        assert!(config.replica_regions().is_empty());
    }

    #[test]
    fn test_hosted_zone_pair() {
        let mut config = SynthConfig::default();
        config.domain.domain_name = Some("app.example.com".into());
        config.domain.hosted_zone_id = Some("Z123".into());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::PartialPair { .. }));
        assert!(err.to_string().contains("--hosted-zone-name"));

        config.domain.hosted_zone_name = Some("example.com".into());
        config.validate().unwrap();
        let domain = config.custom_domain().unwrap();
        assert_eq!(domain.hosted_zone.unwrap().id, "Z123");
    }

    #[test]
    fn test_domain_dependents() {
        let mut config = SynthConfig::default();
        config.domain.alternate_domain_names = vec!["www.example.com".into()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DependentOption { requires: "domain-name", .. })
        ));
    }

    #[test]
    fn test_rate_limit_and_rotation_bounds() {
        let mut config = SynthConfig::default();
        config.security.waf_rate_limit = 0;
        config.validate().unwrap();
        config.security.waf_rate_limit = 5;
        assert!(config.validate().is_err());
        config.security.waf_rate_limit = 10;
        config.security.rotation_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_replicas_follow_app_region() {
        let mut config = SynthConfig::default();
        config.stacks.app_region = Some("us-east-1".into());
        assert!(config.replica_regions().is_empty());
        config.stacks.app_region = Some("eu-west-1".into());
        assert_eq!(config.edge_options().replica_regions, vec!["eu-west-1".to_string()]);
    }
}
