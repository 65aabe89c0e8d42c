//! Lambda functions with their execution role

use crate::error::{Result, SynthError};
use crate::template::{
    PolicyStatement, PropertyOverrides, Resource, Stack, Token, assume_role_policy,
    policy_document, sanitize_logical_id,
};
use serde_json::{Value, json};
use shieldgate_common::ResourceKind;
use std::collections::BTreeMap;

pub const DEFAULT_RUNTIME: &str = "provided.al2023";
pub const DEFAULT_HANDLER: &str = "bootstrap";
pub const DEFAULT_MEMORY_MB: u32 = 128;
pub const DEFAULT_TIMEOUT_SECS: u32 = 10;

const LAMBDA_SERVICE: &str = "lambda.amazonaws.com";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Architecture {
    #[default]
    #[strum(serialize = "arm64")]
    Arm64,
    #[strum(serialize = "x86_64")]
    X86_64,
}

/// Where the packaged function code lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCode {
    pub s3_bucket: Token,
    pub s3_key: String,
}

impl FunctionCode {
    /// Code staged by the bundling step in the per-account asset bucket
    pub fn asset(name: &str) -> Self {
        Self {
            s3_bucket: Token::sub("shieldgate-assets-${AWS::AccountId}-${AWS::Region}"),
            s3_key: format!("functions/{name}.zip"),
        }
    }
}

/// Function configuration; every `None` falls back to the documented default
#[derive(Debug, Clone, Default)]
pub struct FunctionProps {
    pub function_name: Option<String>,
    pub description: Option<String>,
    /// Default: the asset named after the construct id
    pub code: Option<FunctionCode>,
    /// Default: `provided.al2023`
    pub runtime: Option<String>,
    /// Default: `bootstrap`
    pub handler: Option<String>,
    /// Default: `arm64`
    pub architecture: Option<Architecture>,
    /// Default: 128 MB
    pub memory_size: Option<u32>,
    /// Default: 10 seconds
    pub timeout_secs: Option<u32>,
    pub environment: BTreeMap<String, Token>,
    pub property_overrides: PropertyOverrides,
}

impl FunctionProps {
    /// Fill in the code location unless the caller supplied one
    pub fn or_code(mut self, code: FunctionCode) -> Self {
        if self.code.is_none() {
            self.code = Some(code);
        }
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<Token>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

/// Handle to a synthesized function
#[derive(Debug, Clone)]
pub struct LambdaFunction {
    pub logical_id: String,
    pub role_logical_id: String,
    pub function_name: Token,
    pub function_arn: Token,
    pub role_arn: Token,
    pub memory_size: u32,
    pub timeout_secs: u32,
    policy_logical_id: String,
}

impl LambdaFunction {
    pub fn new(stack: &mut Stack, id: &str, props: FunctionProps) -> Result<Self> {
        Self::with_trust(stack, id, props, &[LAMBDA_SERVICE])
    }

    /// Build a function whose role trusts the given service principals
    pub(crate) fn with_trust(
        stack: &mut Stack,
        id: &str,
        props: FunctionProps,
        trusted_services: &[&str],
    ) -> Result<Self> {
        let base = sanitize_logical_id(id)?;
        let memory_size = props.memory_size.unwrap_or(DEFAULT_MEMORY_MB);
        if !(128..=10_240).contains(&memory_size) {
            return Err(SynthError::invalid(
                "memory_size",
                format!("{memory_size} MB is outside 128..=10240"),
            ));
        }
        let timeout_secs = props.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if !(1..=900).contains(&timeout_secs) {
            return Err(SynthError::invalid(
                "timeout_secs",
                format!("{timeout_secs}s is outside 1..=900"),
            ));
        }
        let handler = props.handler.unwrap_or_else(|| DEFAULT_HANDLER.to_string());
        if handler.is_empty() {
            return Err(SynthError::invalid("handler", "must not be empty"));
        }
        let code = props
            .code
            .unwrap_or_else(|| FunctionCode::asset(&base.to_lowercase()));

        let role_logical_id = stack.add(
            &format!("{base}ServiceRole"),
            Resource::new(ResourceKind::IamRole).with_properties(json!({
                "AssumeRolePolicyDocument": assume_role_policy(trusted_services),
                "ManagedPolicyArns": [Token::sub(
                    "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
                )],
            })),
        )?;

        let environment = (!props.environment.is_empty())
            .then(|| json!({ "Variables": props.environment }));

        let function = Resource::new(ResourceKind::LambdaFunction)
            .with_properties(json!({
                "FunctionName": props.function_name,
                "Description": props.description,
                "Code": { "S3Bucket": code.s3_bucket, "S3Key": code.s3_key },
                "Runtime": props.runtime.unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
                "Handler": handler,
                "Architectures": [props.architecture.unwrap_or_default().to_string()],
                "MemorySize": memory_size,
                "Timeout": timeout_secs,
                "Role": Token::get_att(&role_logical_id, "Arn"),
                "Environment": environment,
            }))
            .with_overrides(&props.property_overrides)
            .depends_on(&role_logical_id);
        let logical_id = stack.add(&base, function)?;

        Ok(Self {
            function_name: Token::reference(&logical_id),
            function_arn: Token::get_att(&logical_id, "Arn"),
            role_arn: Token::get_att(&role_logical_id, "Arn"),
            policy_logical_id: format!("{base}ServiceRoleDefaultPolicy"),
            logical_id,
            role_logical_id,
            memory_size,
            timeout_secs,
        })
    }

    /// Append a statement to the function role's inline policy.
    ///
    /// The policy resource is created on the first grant; the function then
    /// depends on it so permissions exist before the first invocation.
    pub fn grant(&self, stack: &mut Stack, statement: PolicyStatement) -> Result<()> {
        if let Some(policy) = stack.resource_mut(&self.policy_logical_id) {
            let statements = policy
                .properties
                .get_mut("PolicyDocument")
                .and_then(|doc| doc.get_mut("Statement"))
                .and_then(Value::as_array_mut)
                .ok_or_else(|| {
                    SynthError::invalid("PolicyDocument", "inline policy has no statement list")
                })?;
            statements.push(statement.to_json());
            return Ok(());
        }

        let policy = Resource::new(ResourceKind::IamPolicy).with_properties(json!({
            "PolicyName": self.policy_logical_id,
            "PolicyDocument": policy_document(&[statement]),
            "Roles": [Token::reference(&self.role_logical_id)],
        }));
        stack.add(&self.policy_logical_id, policy)?;
        if let Some(function) = stack.resource_mut(&self.logical_id) {
            function.depends_on.push(self.policy_logical_id.clone());
        }
        Ok(())
    }

    /// Allow a service principal to invoke this function
    pub fn grant_invoke(
        &self,
        stack: &mut Stack,
        id: &str,
        principal: &str,
        source_arn: Option<Token>,
    ) -> Result<String> {
        stack.add(
            &format!("{}{id}", self.logical_id),
            Resource::new(ResourceKind::LambdaPermission).with_properties(json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": self.function_arn,
                "Principal": principal,
                "SourceArn": source_arn,
            })),
        )
    }

    pub fn environment_variable<'a>(&self, stack: &'a Stack, key: &str) -> Option<&'a Value> {
        stack
            .resource(&self.logical_id)?
            .prop("Environment")?
            .get("Variables")?
            .get(key)
    }
}
