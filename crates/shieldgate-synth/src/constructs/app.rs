//! Application tree
//!
//! Table, user pool, REST API and the static site in front of it, wired
//! leaf-first: each primitive receives the handles it depends on. The origin
//! secret comes from the edge stack's published parameters when available,
//! otherwise a local secret is generated.

use crate::error::Result;
use crate::params::EdgeParameters;
use crate::primitives::{
    ApiDeps, ApiProps, DataTable, Identity, IdentityProps, OriginSecret, RestApi, SiteDeps,
    SiteProps, StaticSite, TableProps,
};
use crate::template::{RemovalPolicy, Setting, Stack, Token, sanitize_logical_id};
use shieldgate_common::defaults::DEFAULT_HEADER_NAME;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct AppTreeProps {
    pub table: TableProps,
    /// Unset: user pool with defaults; `Absent`: header-only authorization
    pub identity: Setting<IdentityProps>,
    pub api: ApiProps,
    pub site: SiteProps,
    /// Applied to every stateful primitive that does not set its own
    pub removal_policy: Option<RemovalPolicy>,
    /// Values published by a deployed edge stack
    pub edge: Option<EdgeParameters>,
    /// Header for the locally generated secret. Default: `x-origin-verify`
    pub header_name: Option<String>,
    /// Name for the locally generated secret
    pub secret_name: Option<String>,
}

/// Handle to the synthesized application tree
#[derive(Debug, Clone)]
pub struct AppTree {
    pub table: DataTable,
    pub identity: Option<Identity>,
    pub origin_secret: OriginSecret,
    pub api: RestApi,
    pub site: StaticSite,
    pub site_url: Token,
    pub api_url: Token,
    pub table_name: Token,
    pub distribution_id: Token,
    pub bucket_name: Token,
    pub user_pool_id: Option<Token>,
    pub user_pool_client_id: Option<Token>,
}

impl AppTree {
    pub fn new(stack: &mut Stack, id: &str, props: AppTreeProps) -> Result<Self> {
        let base = sanitize_logical_id(id)?;
        let AppTreeProps {
            mut table,
            identity,
            api,
            mut site,
            removal_policy,
            edge,
            header_name,
            secret_name,
        } = props;

        if let Some(policy) = removal_policy {
            table.removal_policy.get_or_insert(policy);
            site.removal_policy.get_or_insert(policy);
        }
        let identity = identity.resolve_or_else(|| Some(IdentityProps::default()));
        let identity = identity.map(|mut p| {
            if let Some(policy) = removal_policy {
                p.removal_policy.get_or_insert(policy);
            }
            p
        });

        let table = DataTable::new(stack, &format!("{base}Table"), table)?;
        let identity = identity
            .map(|p| Identity::new(stack, &format!("{base}Identity"), p))
            .transpose()?;

        let (origin_secret, edge_version_arn) = match &edge {
            Some(edge) => {
                if let Some(local) = header_name.as_deref().filter(|h| *h != edge.header_name) {
                    warn!(
                        local = %local,
                        published = %edge.header_name,
                        "Ignoring local header name, the edge stack's published one wins"
                    );
                }
                if site.web_acl_arn.is_none() {
                    site.web_acl_arn = edge.waf_acl_arn.as_deref().map(Token::literal);
                }
                if site.domain_name.is_some() && site.certificate_arn.is_none() {
                    site.certificate_arn = edge.certificate_arn.as_deref().map(Token::literal);
                }
                (
                    OriginSecret::imported(&edge.header_name, edge.secret_arn.as_str()),
                    Some(Token::literal(&edge.edge_function_version_arn)),
                )
            }
            None => {
                let secret = OriginSecret::generate(
                    stack,
                    &format!("{base}OriginSecret"),
                    secret_name,
                    header_name.as_deref().unwrap_or(DEFAULT_HEADER_NAME),
                    Some(removal_policy.unwrap_or(RemovalPolicy::Retain)),
                )?;
                (secret, None)
            }
        };

        let api = RestApi::new(
            stack,
            &format!("{base}Api"),
            api,
            ApiDeps {
                table: &table,
                identity: identity.as_ref(),
                origin_secret: &origin_secret,
            },
        )?;
        let site = StaticSite::new(
            stack,
            &format!("{base}Site"),
            site,
            SiteDeps {
                api: &api,
                origin_secret: &origin_secret,
                edge_function_version_arn: edge_version_arn.as_ref(),
            },
        )?;

        let tree = Self {
            site_url: site.url.clone(),
            api_url: api.url.clone(),
            table_name: table.table_name.clone(),
            distribution_id: site.distribution_id.clone(),
            bucket_name: site.bucket_name.clone(),
            user_pool_id: identity.as_ref().map(|i| i.user_pool_id.clone()),
            user_pool_client_id: identity.as_ref().map(|i| i.user_pool_client_id.clone()),
            table,
            identity,
            origin_secret,
            api,
            site,
        };
        tree.add_outputs(stack, &base)?;

        info!(
            stack = %stack.name(),
            edge = edge.is_some(),
            identity = tree.identity.is_some(),
            removal = ?tree.site.removal_policy,
            "Synthesized application tree"
        );
        Ok(tree)
    }

    fn add_outputs(&self, stack: &mut Stack, base: &str) -> Result<()> {
        let mut outputs = vec![
            ("SiteUrl", self.site_url.clone(), "Site URL"),
            ("ApiUrl", self.api_url.clone(), "REST API stage URL"),
            ("TableName", self.table_name.clone(), "DynamoDB table name"),
            ("DistributionId", self.distribution_id.clone(), "CloudFront distribution id"),
            ("BucketName", self.bucket_name.clone(), "Site bucket name"),
        ];
        if let (Some(pool), Some(client)) = (&self.user_pool_id, &self.user_pool_client_id) {
            outputs.push(("UserPoolId", pool.clone(), "Cognito user pool id"));
            outputs.push(("UserPoolClientId", client.clone(), "Cognito app client id"));
        }
        for (name, value, description) in outputs {
            stack.add_output(&format!("{base}{name}"), value, description)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StackEnv;
    use shieldgate_common::ResourceKind;

    fn edge_params() -> EdgeParameters {
        EdgeParameters {
            prefix: "/app/security/".into(),
            header_name: "x-origin-verify".into(),
            secret_arn: "arn:aws:secretsmanager:us-east-1:111111111111:secret:edge-origin-verify-AbCdEf"
                .into(),
            edge_function_version_arn: "arn:aws:lambda:us-east-1:111111111111:function:edge:4"
                .into(),
            waf_acl_arn: Some("arn:aws:wafv2:us-east-1:111111111111:global/webacl/edge/abc".into()),
            certificate_arn: None,
        }
    }

    fn synth(props: AppTreeProps) -> (Stack, AppTree) {
        let mut stack = Stack::new("app", StackEnv::region("eu-west-1"));
        let tree = AppTree::new(&mut stack, "App", props).unwrap();
        (stack, tree)
    }

    #[test]
    fn test_standalone_generates_secret() {
        let (stack, tree) = synth(AppTreeProps::default());
        assert_eq!(stack.count_of(ResourceKind::Secret), 1);
        assert_eq!(tree.origin_secret.secret_arn, Token::reference("AppOriginSecret"));
        assert!(tree.identity.is_some());
        assert!(stack.output("AppSiteUrl").is_some());
        assert!(stack.output("AppUserPoolClientId").is_some());
    }

    #[test]
    fn test_edge_parameters_wired() {
        let (stack, tree) = synth(AppTreeProps {
            edge: Some(edge_params()),
            ..Default::default()
        });
        assert_eq!(stack.count_of(ResourceKind::Secret), 0);
        let cfg = stack
            .resource(&tree.site.distribution_logical_id)
            .unwrap()
            .prop("DistributionConfig")
            .unwrap()
            .clone();
        assert_eq!(
            cfg["WebACLId"],
            "arn:aws:wafv2:us-east-1:111111111111:global/webacl/edge/abc"
        );
        assert_eq!(
            cfg["CacheBehaviors"][0]["LambdaFunctionAssociations"][0]["LambdaFunctionARN"],
            "arn:aws:lambda:us-east-1:111111111111:function:edge:4"
        );
        assert_eq!(
            tree.api.authorizer.environment_variable(&stack, "ORIGIN_SECRET_ID"),
            Some(&serde_json::json!(
                "arn:aws:secretsmanager:us-east-1:111111111111:secret:edge-origin-verify-AbCdEf"
            ))
        );
    }

    #[test]
    fn test_removal_policy_cascades() {
        let (stack, tree) = synth(AppTreeProps {
            removal_policy: Some(RemovalPolicy::Destroy),
            table: TableProps {
                removal_policy: Some(RemovalPolicy::Retain),
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(tree.table.removal_policy, RemovalPolicy::Retain);
        assert_eq!(tree.site.removal_policy, RemovalPolicy::Destroy);
        assert_eq!(tree.identity.as_ref().unwrap().removal_policy, RemovalPolicy::Destroy);
        assert!(tree.site.auto_delete_objects);
        assert_eq!(
            stack.resource("AppOriginSecret").unwrap().removal_policy,
            Some(RemovalPolicy::Destroy)
        );
    }

    #[test]
    fn test_identity_absent() {
        let (stack, tree) = synth(AppTreeProps {
            identity: Setting::Absent,
            ..Default::default()
        });
        assert!(tree.identity.is_none());
        assert_eq!(stack.count_of(ResourceKind::UserPool), 0);
        assert!(stack.output("AppUserPoolId").is_none());
    }
}
