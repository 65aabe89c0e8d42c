//! API Gateway REST API behind a REQUEST authorizer
//!
//! Everything under `/api` proxies to one handler function. Every method is
//! guarded by the authorizer, which checks the origin-verification header
//! and, when an identity pool is wired in, the bearer token.

use super::function::{FunctionCode, FunctionProps, LambdaFunction};
use super::identity::Identity;
use super::secret::OriginSecret;
use super::table::DataTable;
use crate::error::{Result, SynthError};
use crate::template::{PropertyOverrides, Resource, Stack, Token, sanitize_logical_id};
use serde_json::json;
use shieldgate_common::ResourceKind;
use shieldgate_common::defaults::{DEFAULT_CACHE_TTL_SECS, DEFAULT_STAGE_NAME};

pub const DEFAULT_THROTTLE_RATE_LIMIT: u32 = 1000;
pub const DEFAULT_THROTTLE_BURST_LIMIT: u32 = 2000;

const API_GATEWAY_SERVICE: &str = "apigateway.amazonaws.com";

#[derive(Debug, Clone, Default)]
pub struct ApiProps {
    pub api_name: Option<String>,
    /// Default: `prod`
    pub stage_name: Option<String>,
    pub handler: FunctionProps,
    pub authorizer: FunctionProps,
    /// Default: 0 (every request is authorized; required for rotation)
    pub authorizer_result_ttl_secs: Option<u32>,
    /// Default: 1000 requests per second
    pub throttle_rate_limit: Option<u32>,
    /// Default: 2000
    pub throttle_burst_limit: Option<u32>,
    /// How long the authorizer keeps the secret value. Default: 300 seconds
    pub secret_cache_ttl_secs: Option<u64>,
    /// Deep-merged over the RestApi properties
    pub property_overrides: PropertyOverrides,
}

/// What the API is wired to
#[derive(Debug, Clone, Copy)]
pub struct ApiDeps<'a> {
    pub table: &'a DataTable,
    pub identity: Option<&'a Identity>,
    pub origin_secret: &'a OriginSecret,
}

/// Handle to a synthesized REST API
#[derive(Debug, Clone)]
pub struct RestApi {
    pub logical_id: String,
    pub api_id: Token,
    pub stage_name: String,
    /// `https://<id>.execute-api.<region>.amazonaws.com/<stage>/`
    pub url: Token,
    /// Bare execute-api host name, used as a CDN origin
    pub domain_name: Token,
    pub handler: LambdaFunction,
    pub authorizer: LambdaFunction,
    pub authorizer_logical_id: String,
    pub header_name: String,
}

impl RestApi {
    pub fn new(stack: &mut Stack, id: &str, props: ApiProps, deps: ApiDeps<'_>) -> Result<Self> {
        let base = sanitize_logical_id(id)?;
        let stage_name = props
            .stage_name
            .unwrap_or_else(|| DEFAULT_STAGE_NAME.to_string());
        let valid_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
        if stage_name.is_empty() || !stage_name.chars().all(valid_char) {
            return Err(SynthError::invalid(
                "stage_name",
                format!("'{stage_name}' must be non-empty and alphanumeric"),
            ));
        }
        let result_ttl = props.authorizer_result_ttl_secs.unwrap_or(0);
        if result_ttl > 3600 {
            return Err(SynthError::invalid(
                "authorizer_result_ttl_secs",
                format!("{result_ttl} exceeds 3600"),
            ));
        }
        let header_name = deps.origin_secret.header_name.clone();
        let api_name = props
            .api_name
            .unwrap_or_else(|| format!("{}-{base}", stack.name()));

        let api_logical_id = stack.add(
            &base,
            Resource::new(ResourceKind::RestApi)
                .with_properties(json!({
                    "Name": api_name,
                    "EndpointConfiguration": { "Types": ["REGIONAL"] },
                }))
                .with_overrides(&props.property_overrides),
        )?;
        let api_ref = Token::reference(&api_logical_id);

        // Handler: table access only
        let handler = LambdaFunction::new(
            stack,
            &format!("{base}Handler"),
            props
                .handler
                .or_code(FunctionCode::asset("api-handler"))
                .env("TABLE_NAME", deps.table.table_name.clone()),
        )?;
        deps.table.grant_read_write(stack, &handler)?;

        // Authorizer: secret read plus optional token verification
        let mut authorizer_props = props
            .authorizer
            .or_code(FunctionCode::asset("authorizer"))
            .env("ORIGIN_HEADER_NAME", header_name.as_str())
            .env("ORIGIN_SECRET_ID", deps.origin_secret.secret_arn.clone())
            .env(
                "SECRET_CACHE_TTL_SECONDS",
                props
                    .secret_cache_ttl_secs
                    .unwrap_or(DEFAULT_CACHE_TTL_SECS)
                    .to_string(),
            );
        if let Some(identity) = deps.identity {
            authorizer_props = authorizer_props
                .env("USER_POOL_ID", identity.user_pool_id.clone())
                .env("USER_POOL_CLIENT_ID", identity.user_pool_client_id.clone());
        }
        let authorizer =
            LambdaFunction::new(stack, &format!("{base}Authorizer"), authorizer_props)?;
        deps.origin_secret.grant_read(stack, &authorizer)?;

        let identity_source = match deps.identity {
            Some(_) => format!(
                "method.request.header.{header_name},method.request.header.Authorization"
            ),
            None => format!("method.request.header.{header_name}"),
        };
        let authorizer_logical_id = stack.add(
            &format!("{base}RequestAuthorizer"),
            Resource::new(ResourceKind::ApiAuthorizer).with_properties(json!({
                "Name": format!("{base}RequestAuthorizer"),
                "RestApiId": api_ref,
                "Type": "REQUEST",
                "IdentitySource": identity_source,
                "AuthorizerResultTtlInSeconds": result_ttl,
                "AuthorizerUri": lambda_integration_uri(&authorizer),
            })),
        )?;

        // /api and /api/{proxy+}
        let api_resource = stack.add(
            &format!("{base}ApiResource"),
            Resource::new(ResourceKind::ApiResource).with_properties(json!({
                "RestApiId": api_ref,
                "ParentId": Token::get_att(&api_logical_id, "RootResourceId"),
                "PathPart": "api",
            })),
        )?;
        let proxy_resource = stack.add(
            &format!("{base}ProxyResource"),
            Resource::new(ResourceKind::ApiResource).with_properties(json!({
                "RestApiId": api_ref,
                "ParentId": Token::reference(&api_resource),
                "PathPart": "{proxy+}",
            })),
        )?;

        let mut methods = Vec::new();
        for (suffix, resource_id) in [("ApiAny", &api_resource), ("ProxyAny", &proxy_resource)] {
            let method = stack.add(
                &format!("{base}{suffix}Method"),
                Resource::new(ResourceKind::ApiMethod).with_properties(json!({
                    "RestApiId": api_ref,
                    "ResourceId": Token::reference(resource_id),
                    "HttpMethod": "ANY",
                    "AuthorizationType": "CUSTOM",
                    "AuthorizerId": Token::reference(&authorizer_logical_id),
                    "Integration": {
                        "Type": "AWS_PROXY",
                        "IntegrationHttpMethod": "POST",
                        "Uri": lambda_integration_uri(&handler),
                    },
                })),
            )?;
            methods.push(method);
        }

        let mut deployment = Resource::new(ResourceKind::ApiDeployment).with_properties(json!({
            "RestApiId": api_ref,
            "Description": "Automatically created by shieldgate",
        }));
        for method in &methods {
            deployment = deployment.depends_on(method);
        }
        let deployment_id = stack.add(&format!("{base}Deployment"), deployment)?;

        let rate_limit = props.throttle_rate_limit.unwrap_or(DEFAULT_THROTTLE_RATE_LIMIT);
        let burst_limit = props.throttle_burst_limit.unwrap_or(DEFAULT_THROTTLE_BURST_LIMIT);
        let stage_id = stack.add(
            &format!("{base}DeploymentStage{stage_name}"),
            Resource::new(ResourceKind::ApiStage).with_properties(json!({
                "RestApiId": api_ref,
                "DeploymentId": Token::reference(&deployment_id),
                "StageName": stage_name,
                "MethodSettings": [{
                    "ResourcePath": "/*",
                    "HttpMethod": "*",
                    "ThrottlingRateLimit": rate_limit,
                    "ThrottlingBurstLimit": burst_limit,
                }],
            })),
        )?;

        handler.grant_invoke(
            stack,
            "ApiPermission",
            API_GATEWAY_SERVICE,
            Some(Token::sub(format!(
                "arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{api_logical_id}}}/*/*/*"
            ))),
        )?;
        authorizer.grant_invoke(
            stack,
            "ApiPermission",
            API_GATEWAY_SERVICE,
            Some(Token::sub(format!(
                "arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{api_logical_id}}}/authorizers/${{{authorizer_logical_id}}}"
            ))),
        )?;

        let domain_name = Token::sub(format!(
            "${{{api_logical_id}}}.execute-api.${{AWS::Region}}.${{AWS::URLSuffix}}"
        ));
        let url = Token::sub(format!(
            "https://${{{api_logical_id}}}.execute-api.${{AWS::Region}}.${{AWS::URLSuffix}}/${{{stage_id}}}/"
        ));

        Ok(Self {
            api_id: api_ref,
            logical_id: api_logical_id,
            stage_name,
            url,
            domain_name,
            handler,
            authorizer,
            authorizer_logical_id,
            header_name,
        })
    }

    /// Origin path on the execute-api host: the stage
    pub fn origin_path(&self) -> String {
        format!("/{}", self.stage_name)
    }
}

fn lambda_integration_uri(function: &LambdaFunction) -> Token {
    Token::sub(format!(
        "arn:${{AWS::Partition}}:apigateway:${{AWS::Region}}:lambda:path/2015-03-31/functions/${{{}.Arn}}/invocations",
        function.logical_id
    ))
}
