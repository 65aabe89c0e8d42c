//! Lambda@Edge functions
//!
//! Edge functions cannot read environment variables, so configuration is
//! compiled in at bundle time. The constants are recorded on the function's
//! metadata and must be literals: a deploy-time token cannot be embedded
//! into a binary that is built before deployment.

use super::function::{FunctionCode, FunctionProps, LambdaFunction};
use crate::error::{Result, SynthError};
use crate::template::{Resource, Stack, Token, sanitize_logical_id};
use serde_json::json;
use shieldgate_common::ResourceKind;
use shieldgate_common::defaults::REQUIRED_EDGE_REGION;
use std::collections::BTreeMap;

/// Metadata key the bundler reads the build constants from
pub const BUILD_CONSTANTS_METADATA_KEY: &str = "Shieldgate::BuildConstants";

pub const DEFAULT_EDGE_TIMEOUT_SECS: u32 = 5;

/// Origin-request triggers are capped at 30 seconds
const MAX_EDGE_TIMEOUT_SECS: u32 = 30;

#[derive(Debug, Clone, Default)]
pub struct EdgeFunctionProps {
    /// Environment variables are rejected; use `build_constants`
    pub function: FunctionProps,
    pub build_constants: BTreeMap<String, Token>,
}

/// Handle to an edge function and its published version
#[derive(Debug, Clone)]
pub struct EdgeFunction {
    pub function: LambdaFunction,
    pub version_logical_id: String,
    pub version_arn: Token,
    pub build_constants: BTreeMap<String, String>,
}

impl EdgeFunction {
    pub fn new(stack: &mut Stack, id: &str, props: EdgeFunctionProps) -> Result<Self> {
        let base = sanitize_logical_id(id)?;
        stack.require_region(REQUIRED_EDGE_REGION, "Lambda@Edge function")?;

        if !props.function.environment.is_empty() {
            return Err(SynthError::invalid(
                "environment",
                "edge functions cannot use environment variables; use build constants",
            ));
        }
        let build_constants = props
            .build_constants
            .into_iter()
            .map(|(name, value)| match value.as_literal() {
                Some(v) => Ok((name, v)),
                None => Err(SynthError::UnresolvedBuildConstant { name }),
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let mut function_props = props.function.or_code(FunctionCode::asset("edge"));
        let timeout = *function_props
            .timeout_secs
            .get_or_insert(DEFAULT_EDGE_TIMEOUT_SECS);
        if timeout > MAX_EDGE_TIMEOUT_SECS {
            return Err(SynthError::invalid(
                "timeout_secs",
                format!("{timeout}s exceeds the edge limit of {MAX_EDGE_TIMEOUT_SECS}s"),
            ));
        }

        let function = LambdaFunction::with_trust(
            stack,
            &base,
            function_props,
            &["lambda.amazonaws.com", "edgelambda.amazonaws.com"],
        )?;
        if let Some(resource) = stack.resource_mut(&function.logical_id) {
            resource
                .metadata
                .insert(BUILD_CONSTANTS_METADATA_KEY.to_string(), json!(build_constants));
        }

        let version_logical_id = stack.add(
            &format!("{base}Version"),
            Resource::new(ResourceKind::LambdaVersion).with_properties(json!({
                "FunctionName": function.function_name,
                "Description": "Published for CloudFront association",
            })),
        )?;

        Ok(Self {
            version_arn: Token::reference(&version_logical_id),
            version_logical_id,
            function,
            build_constants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StackEnv;

    fn constants(pairs: &[(&str, Token)]) -> BTreeMap<String, Token> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_literal_constants_recorded() {
        let mut stack = Stack::new("edge", StackEnv::region("us-east-1"));
        let f = EdgeFunction::new(
            &mut stack,
            "Injector",
            EdgeFunctionProps {
                build_constants: constants(&[(
                    "SECRET_NAME",
                    Token::literal("edge-origin-verify"),
                )]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(f.build_constants["SECRET_NAME"], "edge-origin-verify");

        let r = stack.resource(&f.function.logical_id).unwrap();
        assert_eq!(
            r.metadata[BUILD_CONSTANTS_METADATA_KEY]["SECRET_NAME"],
            "edge-origin-verify"
        );
        assert_eq!(r.prop("Timeout"), Some(&json!(5)));
        assert!(stack.contains("InjectorVersion"));

        let role = stack.resource(&f.function.role_logical_id).unwrap();
        let trust = role.prop("AssumeRolePolicyDocument").unwrap();
        let services = &trust["Statement"][0]["Principal"]["Service"];
        assert_eq!(services[1], "edgelambda.amazonaws.com");
    }

    #[test]
    fn test_unresolved_constant_rejected() {
        let mut stack = Stack::new("edge", StackEnv::region("us-east-1"));
        let err = EdgeFunction::new(
            &mut stack,
            "Injector",
            EdgeFunctionProps {
                build_constants: constants(&[("SECRET_ARN", Token::reference("Secret"))]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SynthError::UnresolvedBuildConstant { name } if name == "SECRET_ARN"
        ));
    }

    #[test]
    fn test_environment_rejected() {
        let mut stack = Stack::new("edge", StackEnv::region("us-east-1"));
        let err = EdgeFunction::new(
            &mut stack,
            "Injector",
            EdgeFunctionProps {
                function: FunctionProps::default().env("X", "y"),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::InvalidValue { field: "environment", .. }));
    }
}
