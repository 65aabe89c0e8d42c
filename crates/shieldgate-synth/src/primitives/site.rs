//! Private S3 bucket served through CloudFront
//!
//! The distribution has two origins: the bucket (default behavior, read
//! through an origin access control) and the REST API (`/api/*`). Requests
//! to the API origin carry the origin-verification header, stamped either
//! by an edge function or by a static origin custom header.

use super::api::RestApi;
use super::certificate::{Certificate, CertificateProps};
use super::function::{FunctionCode, FunctionProps, LambdaFunction};
use super::secret::OriginSecret;
use crate::error::{Result, SynthError};
use crate::template::{
    PolicyStatement, PropertyOverrides, RemovalPolicy, Resource, Stack, Token, policy_document,
    sanitize_logical_id,
};
use serde_json::{Value, json};
use shieldgate_common::ResourceKind;
use shieldgate_common::defaults::API_PATH_PATTERN;
use tracing::debug;

/// Managed cache policy: CachingOptimized
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";
/// Managed cache policy: CachingDisabled
pub const CACHING_DISABLED_POLICY_ID: &str = "4135ea2d-6df8-44a3-9df3-4b5a84be39ad";
/// Managed origin request policy: AllViewerExceptHostHeader
pub const ALL_VIEWER_EXCEPT_HOST_POLICY_ID: &str = "b689b0a8-53d0-40ab-baf2-68738e2966ac";
/// Hosted zone id of every CloudFront distribution, for alias records
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

const CLOUDFRONT_SERVICE: &str = "cloudfront.amazonaws.com";
const S3_ORIGIN_ID: &str = "site-bucket";
const API_ORIGIN_ID: &str = "rest-api";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum PriceClass {
    #[default]
    #[strum(serialize = "PriceClass_100")]
    PriceClass100,
    #[strum(serialize = "PriceClass_200")]
    PriceClass200,
    #[strum(serialize = "PriceClass_All")]
    PriceClassAll,
}

#[derive(Debug, Clone, Default)]
pub struct SiteProps {
    pub bucket_name: Option<String>,
    pub domain_name: Option<String>,
    /// Requires `domain_name`
    pub alternate_domain_names: Vec<String>,
    /// Existing us-east-1 certificate; otherwise one is minted from the
    /// hosted zone
    pub certificate_arn: Option<Token>,
    /// Must be supplied together with `hosted_zone_name`
    pub hosted_zone_id: Option<String>,
    pub hosted_zone_name: Option<String>,
    /// Default: `PriceClass_100`
    pub price_class: Option<PriceClass>,
    /// Default: `index.html`
    pub default_root_object: Option<String>,
    /// Serve the root object for unknown paths. Default: true
    pub spa_fallback: Option<bool>,
    pub web_acl_arn: Option<Token>,
    /// Default: `Retain`
    pub removal_policy: Option<RemovalPolicy>,
    /// Empty the bucket before deletion. Default: on when the removal
    /// policy is `Destroy`
    pub auto_delete_objects: Option<bool>,
    /// Deep-merged over the distribution properties
    pub property_overrides: PropertyOverrides,
}

#[derive(Debug, Clone, Copy)]
pub struct SiteDeps<'a> {
    pub api: &'a RestApi,
    pub origin_secret: &'a OriginSecret,
    /// When set, this edge function stamps the secret header on `/api/*`
    pub edge_function_version_arn: Option<&'a Token>,
}

/// Handle to a synthesized site
#[derive(Debug, Clone)]
pub struct StaticSite {
    pub bucket_logical_id: String,
    pub distribution_logical_id: String,
    pub bucket_name: Token,
    pub bucket_arn: Token,
    pub distribution_id: Token,
    pub distribution_domain_name: Token,
    pub url: Token,
    pub domain_names: Vec<String>,
    pub certificate: Option<Certificate>,
    pub removal_policy: RemovalPolicy,
    pub auto_delete_objects: bool,
}

struct DomainPlan {
    names: Vec<String>,
    certificate_arn: Token,
    minted: Option<CertificateProps>,
}

/// Check the domain-related props and decide where the certificate comes from
fn plan_domain(props: &SiteProps) -> Result<Option<DomainPlan>> {
    let zone = match (&props.hosted_zone_id, &props.hosted_zone_name) {
        (Some(id), Some(name)) => Some((id, name)),
        (None, None) => None,
        _ => {
            return Err(SynthError::PartialPair {
                first: "hosted_zone_id",
                second: "hosted_zone_name",
            });
        }
    };

    let Some(domain_name) = &props.domain_name else {
        if !props.alternate_domain_names.is_empty() {
            return Err(SynthError::DependentField {
                field: "alternate_domain_names",
                requires: "domain_name",
            });
        }
        if props.certificate_arn.is_some() {
            return Err(SynthError::DependentField {
                field: "certificate_arn",
                requires: "domain_name",
            });
        }
        if zone.is_some() {
            return Err(SynthError::DependentField {
                field: "hosted_zone_id",
                requires: "domain_name",
            });
        }
        return Ok(None);
    };

    let names: Vec<String> = std::iter::once(domain_name.clone())
        .chain(props.alternate_domain_names.iter().cloned())
        .collect();

    if let Some((_, zone_name)) = zone {
        let zone_name = zone_name.trim_end_matches('.');
        if let Some(outside) = names
            .iter()
            .find(|n| *n != zone_name && !n.ends_with(&format!(".{zone_name}")))
        {
            return Err(SynthError::invalid(
                "domain_name",
                format!("'{outside}' is not inside hosted zone '{zone_name}'"),
            ));
        }
    }

    match (&props.certificate_arn, zone) {
        (Some(arn), _) => Ok(Some(DomainPlan {
            names,
            certificate_arn: arn.clone(),
            minted: None,
        })),
        (None, Some((zone_id, _))) => Ok(Some(DomainPlan {
            minted: Some(CertificateProps {
                domain_name: domain_name.clone(),
                alternate_names: props.alternate_domain_names.clone(),
                hosted_zone_id: Some(zone_id.clone()),
            }),
            names,
            certificate_arn: Token::literal(""),
        })),
        (None, None) => Err(SynthError::MissingCertificate {
            domain_name: domain_name.clone(),
        }),
    }
}

impl StaticSite {
    pub fn new(stack: &mut Stack, id: &str, props: SiteProps, deps: SiteDeps<'_>) -> Result<Self> {
        let base = sanitize_logical_id(id)?;
        let domain = plan_domain(&props)?;
        let removal_policy = props.removal_policy.unwrap_or(RemovalPolicy::Retain);
        let auto_delete_objects = props
            .auto_delete_objects
            .unwrap_or(removal_policy == RemovalPolicy::Destroy);

        let mut certificate = None;
        let domain = match domain {
            Some(mut plan) => {
                if let Some(cert_props) = plan.minted.take() {
                    let cert = Certificate::new(stack, &format!("{base}Certificate"), cert_props)?;
                    plan.certificate_arn = cert.certificate_arn.clone();
                    certificate = Some(cert);
                }
                Some(plan)
            }
            None => None,
        };

        let bucket_logical_id = stack.add(
            &format!("{base}Bucket"),
            Resource::new(ResourceKind::S3Bucket)
                .with_properties(json!({
                    "BucketName": props.bucket_name,
                    "BucketEncryption": {
                        "ServerSideEncryptionConfiguration": [{
                            "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                        }]
                    },
                    "PublicAccessBlockConfiguration": {
                        "BlockPublicAcls": true,
                        "BlockPublicPolicy": true,
                        "IgnorePublicAcls": true,
                        "RestrictPublicBuckets": true,
                    },
                    "OwnershipControls": {
                        "Rules": [{ "ObjectOwnership": "BucketOwnerEnforced" }]
                    },
                }))
                .with_removal_policy(Some(removal_policy)),
        )?;
        let bucket_arn = Token::get_att(&bucket_logical_id, "Arn");

        let oac_logical_id = stack.add(
            &format!("{base}OriginAccessControl"),
            Resource::new(ResourceKind::OriginAccessControl).with_properties(json!({
                "OriginAccessControlConfig": {
                    "Name": Token::sub(format!("${{AWS::StackName}}-{base}-oac")),
                    "OriginAccessControlOriginType": "s3",
                    "SigningBehavior": "always",
                    "SigningProtocol": "sigv4",
                }
            })),
        )?;

        let mut api_origin = json!({
            "Id": API_ORIGIN_ID,
            "DomainName": deps.api.domain_name,
            "OriginPath": deps.api.origin_path(),
            "CustomOriginConfig": {
                "OriginProtocolPolicy": "https-only",
                "OriginSSLProtocols": ["TLSv1.2"],
            },
        });
        let mut api_behavior = json!({
            "PathPattern": API_PATH_PATTERN,
            "TargetOriginId": API_ORIGIN_ID,
            "ViewerProtocolPolicy": "https-only",
            "AllowedMethods": ["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"],
            "CachedMethods": ["GET", "HEAD"],
            "CachePolicyId": CACHING_DISABLED_POLICY_ID,
            "OriginRequestPolicyId": ALL_VIEWER_EXCEPT_HOST_POLICY_ID,
            "Compress": true,
        });
        match deps.edge_function_version_arn {
            Some(version_arn) => {
                debug!(site = %base, "Origin header stamped by edge function");
                api_behavior["LambdaFunctionAssociations"] = json!([{
                    "EventType": "origin-request",
                    "LambdaFunctionARN": version_arn,
                    "IncludeBody": false,
                }]);
            }
            None => {
                debug!(site = %base, "Origin header set from secret dynamic reference");
                api_origin["OriginCustomHeaders"] = json!([{
                    "HeaderName": deps.origin_secret.header_name,
                    "HeaderValue": deps.origin_secret.dynamic_reference(),
                }]);
            }
        }

        let root_object = props
            .default_root_object
            .unwrap_or_else(|| "index.html".to_string());
        let error_responses = props.spa_fallback.unwrap_or(true).then(|| {
            json!([{
                "ErrorCode": 404,
                "ResponseCode": 200,
                "ResponsePagePath": format!("/{root_object}"),
                "ErrorCachingMinTTL": 10,
            }])
        });
        let viewer_certificate = match &domain {
            Some(plan) => json!({
                "AcmCertificateArn": plan.certificate_arn,
                "SslSupportMethod": "sni-only",
                "MinimumProtocolVersion": "TLSv1.2_2021",
            }),
            None => json!({ "CloudFrontDefaultCertificate": true }),
        };
        let domain_names = domain.as_ref().map(|d| d.names.clone()).unwrap_or_default();

        let mut distribution_config = json!({
            "Enabled": true,
            "Comment": Token::sub(format!("${{AWS::StackName}} {base}")),
            "Aliases": (!domain_names.is_empty()).then_some(&domain_names),
            "DefaultRootObject": root_object,
            "PriceClass": props.price_class.unwrap_or_default().to_string(),
            "HttpVersion": "http2and3",
            "IPV6Enabled": true,
            "Origins": [
                {
                    "Id": S3_ORIGIN_ID,
                    "DomainName": Token::get_att(&bucket_logical_id, "RegionalDomainName"),
                    "S3OriginConfig": { "OriginAccessIdentity": "" },
                    "OriginAccessControlId": Token::get_att(&oac_logical_id, "Id"),
                },
                api_origin,
            ],
            "DefaultCacheBehavior": {
                "TargetOriginId": S3_ORIGIN_ID,
                "ViewerProtocolPolicy": "redirect-to-https",
                "AllowedMethods": ["GET", "HEAD"],
                "CachePolicyId": CACHING_OPTIMIZED_POLICY_ID,
                "Compress": true,
            },
            "CacheBehaviors": [api_behavior],
            "CustomErrorResponses": error_responses,
            "ViewerCertificate": viewer_certificate,
            "WebACLId": props.web_acl_arn,
        });
        strip_nulls(&mut distribution_config);

        let distribution_logical_id = stack.add(
            &format!("{base}Distribution"),
            Resource::new(ResourceKind::Distribution)
                .with_properties(json!({ "DistributionConfig": distribution_config }))
                .with_overrides(&props.property_overrides),
        )?;
        let distribution_source_arn = Token::sub(format!(
            "arn:${{AWS::Partition}}:cloudfront::${{AWS::AccountId}}:distribution/${{{distribution_logical_id}}}"
        ));

        let read_statement = |actions: &[&str], resource: Token| {
            PolicyStatement::allow()
                .actions(actions.iter().copied())
                .resource(resource)
                .service_principal(CLOUDFRONT_SERVICE)
                .condition(json!({
                    "StringEquals": { "AWS:SourceArn": distribution_source_arn }
                }))
        };
        let policy_logical_id = stack.add(
            &format!("{base}BucketPolicy"),
            Resource::new(ResourceKind::S3BucketPolicy).with_properties(json!({
                "Bucket": Token::reference(&bucket_logical_id),
                "PolicyDocument": policy_document(&[
                    read_statement(
                        &["s3:GetObject"],
                        Token::join("", [bucket_arn.clone(), Token::literal("/*")]),
                    ),
                    // Lets missing keys surface as 404 instead of 403
                    read_statement(&["s3:ListBucket"], bucket_arn.clone()),
                ]),
            })),
        )?;

        if auto_delete_objects {
            add_auto_delete(stack, &base, &bucket_logical_id, &bucket_arn, &policy_logical_id)?;
        }

        if let (Some(zone_id), Some(plan)) = (&props.hosted_zone_id, &domain) {
            for (i, name) in plan.names.iter().enumerate() {
                for record_type in ["A", "AAAA"] {
                    stack.add(
                        &format!("{base}AliasRecord{i}{record_type}"),
                        Resource::new(ResourceKind::RecordSet).with_properties(json!({
                            "HostedZoneId": zone_id,
                            "Name": name,
                            "Type": record_type,
                            "AliasTarget": {
                                "DNSName": Token::get_att(&distribution_logical_id, "DomainName"),
                                "HostedZoneId": CLOUDFRONT_HOSTED_ZONE_ID,
                            },
                        })),
                    )?;
                }
            }
        }

        let distribution_domain_name = Token::get_att(&distribution_logical_id, "DomainName");
        let url = match domain_names.first() {
            Some(name) => Token::literal(format!("https://{name}")),
            None => Token::join("", [Token::literal("https://"), distribution_domain_name.clone()]),
        };

        Ok(Self {
            bucket_name: Token::reference(&bucket_logical_id),
            bucket_arn,
            distribution_id: Token::reference(&distribution_logical_id),
            distribution_domain_name,
            url,
            bucket_logical_id,
            distribution_logical_id,
            domain_names,
            certificate,
            removal_policy,
            auto_delete_objects,
        })
    }
}

/// Custom resource that empties the bucket when the stack deletes it
fn add_auto_delete(
    stack: &mut Stack,
    base: &str,
    bucket_logical_id: &str,
    bucket_arn: &Token,
    policy_logical_id: &str,
) -> Result<()> {
    let provider = LambdaFunction::new(
        stack,
        &format!("{base}AutoDeleteObjectsProvider"),
        FunctionProps {
            timeout_secs: Some(900),
            ..Default::default()
        }
        .or_code(FunctionCode::asset("purge")),
    )?;
    provider.grant(
        stack,
        PolicyStatement::allow()
            .actions(["s3:ListBucket"])
            .resource(bucket_arn.clone()),
    )?;
    provider.grant(
        stack,
        PolicyStatement::allow()
            .actions(["s3:DeleteObject"])
            .resource(Token::join("", [bucket_arn.clone(), Token::literal("/*")])),
    )?;
    stack.add(
        &format!("{base}AutoDeleteObjects"),
        Resource::new(ResourceKind::S3AutoDeleteObjects)
            .with_properties(json!({
                "ServiceToken": provider.function_arn,
                "BucketName": Token::reference(bucket_logical_id),
            }))
            .depends_on(policy_logical_id),
    )?;
    Ok(())
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
