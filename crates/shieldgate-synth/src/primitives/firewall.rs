//! WAFv2 web ACL for CloudFront

use crate::error::{Result, SynthError};
use crate::template::{PropertyOverrides, Resource, Stack, Token, sanitize_logical_id};
use serde_json::{Value, json};
use shieldgate_common::ResourceKind;
use shieldgate_common::defaults::{DEFAULT_RATE_LIMIT, MIN_RATE_LIMIT, REQUIRED_EDGE_REGION};

/// Provider-curated rule group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRuleGroup {
    pub vendor: String,
    pub name: String,
}

impl ManagedRuleGroup {
    pub fn aws(name: &str) -> Self {
        Self {
            vendor: "AWS".to_string(),
            name: name.to_string(),
        }
    }

    /// Generic web exploit signatures
    pub fn common_rule_set() -> Self {
        Self::aws("AWSManagedRulesCommonRuleSet")
    }

    /// SQL injection signatures
    pub fn sqli_rule_set() -> Self {
        Self::aws("AWSManagedRulesSQLiRuleSet")
    }
}

#[derive(Debug, Clone, Default)]
pub struct FirewallProps {
    pub name: Option<String>,
    /// Requests per 5 minutes per client IP. Default 2000; 0 drops the rate rule.
    pub rate_limit: Option<u32>,
    /// Default: common + SQLi rule sets
    pub managed_rule_groups: Option<Vec<ManagedRuleGroup>>,
    /// Default: the construct id
    pub metric_prefix: Option<String>,
    pub property_overrides: PropertyOverrides,
}

/// Handle to a synthesized web ACL
#[derive(Debug, Clone)]
pub struct Firewall {
    pub logical_id: String,
    pub web_acl_arn: Token,
    pub web_acl_id: Token,
    pub rate_limit: u32,
    pub rule_names: Vec<String>,
}

fn visibility(metric: &str) -> Value {
    json!({
        "SampledRequestsEnabled": true,
        "CloudWatchMetricsEnabled": true,
        "MetricName": metric,
    })
}

impl Firewall {
    pub fn new(stack: &mut Stack, id: &str, props: FirewallProps) -> Result<Self> {
        let base = sanitize_logical_id(id)?;
        stack.require_region(REQUIRED_EDGE_REGION, "CloudFront web ACL")?;

        let rate_limit = props.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT);
        if rate_limit != 0 && rate_limit < MIN_RATE_LIMIT {
            return Err(SynthError::invalid(
                "rate_limit",
                format!("{rate_limit} is below the minimum of {MIN_RATE_LIMIT}; use 0 to disable"),
            ));
        }
        let metric_prefix = props.metric_prefix.unwrap_or_else(|| base.clone());
        let groups = props.managed_rule_groups.unwrap_or_else(|| {
            vec![ManagedRuleGroup::common_rule_set(), ManagedRuleGroup::sqli_rule_set()]
        });

        let mut rules = Vec::new();
        let mut rule_names = Vec::new();
        if rate_limit > 0 {
            let name = "RateLimitPerIp".to_string();
            rules.push(json!({
                "Name": name,
                "Priority": 0,
                "Action": { "Block": {} },
                "Statement": {
                    "RateBasedStatement": {
                        "Limit": rate_limit,
                        "AggregateKeyType": "IP",
                        "EvaluationWindowSec": 300,
                    }
                },
                "VisibilityConfig": visibility(&format!("{metric_prefix}RateLimit")),
            }));
            rule_names.push(name);
        }
        for (i, group) in groups.iter().enumerate() {
            rules.push(json!({
                "Name": group.name,
                "Priority": i + 1,
                "OverrideAction": { "None": {} },
                "Statement": {
                    "ManagedRuleGroupStatement": {
                        "VendorName": group.vendor,
                        "Name": group.name,
                    }
                },
                "VisibilityConfig": visibility(&format!("{metric_prefix}{}", group.name)),
            }));
            rule_names.push(group.name.clone());
        }

        let logical_id = stack.add(
            &base,
            Resource::new(ResourceKind::WebAcl)
                .with_properties(json!({
                    "Name": props.name,
                    "Scope": "CLOUDFRONT",
                    "DefaultAction": { "Allow": {} },
                    "Rules": rules,
                    "VisibilityConfig": visibility(&metric_prefix),
                }))
                .with_overrides(&props.property_overrides),
        )?;

        Ok(Self {
            web_acl_arn: Token::get_att(&logical_id, "Arn"),
            web_acl_id: Token::get_att(&logical_id, "Id"),
            logical_id,
            rate_limit,
            rule_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StackEnv;

    fn synth(props: FirewallProps) -> Result<(Stack, Firewall)> {
        let mut stack = Stack::new("edge", StackEnv::region("us-east-1"));
        let fw = Firewall::new(&mut stack, "Firewall", props)?;
        Ok((stack, fw))
    }

    #[test]
    fn test_defaults() {
        let (stack, fw) = synth(FirewallProps::default()).unwrap();
        assert_eq!(fw.rate_limit, 2000);
        assert_eq!(
            fw.rule_names,
            vec![
                "RateLimitPerIp",
                "AWSManagedRulesCommonRuleSet",
                "AWSManagedRulesSQLiRuleSet"
            ]
        );
        let acl = stack.resource(&fw.logical_id).unwrap();
        assert_eq!(acl.prop("Scope"), Some(&json!("CLOUDFRONT")));
        assert_eq!(
            acl.prop("Rules").unwrap()[0]["Statement"]["RateBasedStatement"]["Limit"],
            2000
        );
    }

    #[test]
    fn test_zero_rate_limit_keeps_managed_groups() {
        let (_, fw) = synth(FirewallProps {
            rate_limit: Some(0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            fw.rule_names,
            vec!["AWSManagedRulesCommonRuleSet", "AWSManagedRulesSQLiRuleSet"]
        );
    }

    #[test]
    fn test_rate_limit_too_low() {
        let err = synth(FirewallProps {
            rate_limit: Some(5),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, SynthError::InvalidValue { field: "rate_limit", .. }));
    }

    #[test]
    fn test_wrong_region() {
        let mut stack = Stack::new("edge", StackEnv::region("us-west-2"));
        let err = Firewall::new(&mut stack, "Firewall", FirewallProps::default()).unwrap_err();
        assert!(matches!(err, SynthError::RegionMismatch { required: "us-east-1", .. }));
    }
}
