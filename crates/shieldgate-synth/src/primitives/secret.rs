//! Origin-verification secrets
//!
//! [`RotatingSecret`] owns a Secrets Manager secret, its rotation schedule
//! and the rotation function. [`OriginSecret`] is the handle consumers get:
//! the header name and the secret ARN, wherever the secret came from.

use super::function::{FunctionCode, FunctionProps, LambdaFunction};
use crate::error::{Result, SynthError};
use crate::template::{
    PolicyStatement, PropertyOverrides, RemovalPolicy, Resource, Stack, Token, sanitize_logical_id,
};
use serde_json::json;
use shieldgate_common::defaults::{
    DEFAULT_HEADER_NAME, DEFAULT_ROTATION_DAYS, DEFAULT_SECRET_LENGTH, DEFAULT_SSM_PREFIX,
};
use shieldgate_common::params::normalize_prefix;
use shieldgate_common::secret::{HEADER_NAME_KEY, VALUE_KEY};
use shieldgate_common::{ParameterKey, ResourceKind};

const SECRETS_MANAGER_SERVICE: &str = "secretsmanager.amazonaws.com";

/// Rotation schedule in Secrets Manager's rate syntax
pub fn schedule_expression(days: u32) -> String {
    if days == 1 {
        "rate(1 day)".to_string()
    } else {
        format!("rate({days} days)")
    }
}

pub(crate) fn validate_header_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SynthError::invalid(
            "header_name",
            format!("'{name}' is not a valid HTTP header name"),
        ))
    }
}

/// The shared secret a request must carry to reach the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginSecret {
    pub header_name: String,
    pub secret_arn: Token,
    /// Literal name, when known; lets readers in other regions use the
    /// local replica
    pub secret_name: Option<String>,
}

impl OriginSecret {
    /// A secret published by another stack
    pub fn imported(header_name: impl Into<String>, secret_arn: impl Into<Token>) -> Self {
        Self {
            header_name: header_name.into(),
            secret_arn: secret_arn.into(),
            secret_name: None,
        }
    }

    /// A plain generated secret owned by this stack, without rotation
    pub fn generate(
        stack: &mut Stack,
        id: &str,
        secret_name: Option<String>,
        header_name: &str,
        removal_policy: Option<RemovalPolicy>,
    ) -> Result<Self> {
        validate_header_name(header_name)?;
        let logical_id = stack.add(
            id,
            secret_resource(secret_name.as_deref(), header_name, DEFAULT_SECRET_LENGTH, &[])
                .with_removal_policy(removal_policy),
        )?;
        Ok(Self {
            header_name: header_name.to_string(),
            secret_arn: Token::reference(logical_id),
            secret_name,
        })
    }

    /// Read access to the current secret value
    pub fn read_statement(&self) -> PolicyStatement {
        PolicyStatement::allow()
            .actions(["secretsmanager:GetSecretValue", "secretsmanager:DescribeSecret"])
            .resource(self.secret_arn.clone())
    }

    pub fn grant_read(&self, stack: &mut Stack, function: &LambdaFunction) -> Result<()> {
        function.grant(stack, self.read_statement())
    }

    /// `{{resolve:secretsmanager:...}}` reference to the payload's value field
    pub fn dynamic_reference(&self) -> Token {
        Token::join(
            "",
            [
                Token::literal("{{resolve:secretsmanager:"),
                self.secret_arn.clone(),
                Token::literal(format!(":SecretString:{VALUE_KEY}}}}}")),
            ],
        )
    }
}

fn secret_resource(
    name: Option<&str>,
    header_name: &str,
    length: u32,
    replica_regions: &[String],
) -> Resource {
    let template = json!({ HEADER_NAME_KEY: header_name }).to_string();
    let replicas: Vec<_> = replica_regions
        .iter()
        .map(|r| json!({ "Region": r }))
        .collect();
    Resource::new(ResourceKind::Secret).with_properties(json!({
        "Name": name,
        "Description": "Shared secret proving a request came through the CDN",
        "GenerateSecretString": {
            "SecretStringTemplate": template,
            "GenerateStringKey": VALUE_KEY,
            "PasswordLength": length,
            "ExcludePunctuation": true,
        },
        "ReplicaRegions": (!replicas.is_empty()).then_some(replicas),
    }))
}

#[derive(Debug, Clone, Default)]
pub struct RotatingSecretProps {
    /// Default: `<stack name>-origin-verify`
    pub secret_name: Option<String>,
    /// Default: `x-origin-verify`
    pub header_name: Option<String>,
    /// Default: 7
    pub rotation_days: Option<u32>,
    /// Default: 32
    pub secret_length: Option<u32>,
    /// Regions the secret is replicated to
    pub replica_regions: Vec<String>,
    /// Prefix the rotation function writes `secret-rotated-at` under
    pub ssm_prefix: Option<String>,
    pub rotation_function: FunctionProps,
    /// Default: `Retain`
    pub removal_policy: Option<RemovalPolicy>,
    pub property_overrides: PropertyOverrides,
}

/// Handle to a rotating secret
#[derive(Debug, Clone)]
pub struct RotatingSecret {
    pub logical_id: String,
    pub secret_arn: Token,
    pub secret_name: String,
    pub header_name: String,
    pub rotation_days: u32,
    pub schedule_expression: String,
    pub rotation_function: LambdaFunction,
}

impl RotatingSecret {
    pub fn new(stack: &mut Stack, id: &str, props: RotatingSecretProps) -> Result<Self> {
        let base = sanitize_logical_id(id)?;
        let header_name = props
            .header_name
            .unwrap_or_else(|| DEFAULT_HEADER_NAME.to_string());
        validate_header_name(&header_name)?;

        let rotation_days = props.rotation_days.unwrap_or(DEFAULT_ROTATION_DAYS);
        if !(1..=1000).contains(&rotation_days) {
            return Err(SynthError::invalid(
                "rotation_days",
                format!("{rotation_days} is outside 1..=1000"),
            ));
        }
        let length = props.secret_length.unwrap_or(DEFAULT_SECRET_LENGTH);
        if !(16..=128).contains(&length) {
            return Err(SynthError::invalid(
                "secret_length",
                format!("{length} is outside 16..=128"),
            ));
        }
        let secret_name = props
            .secret_name
            .unwrap_or_else(|| format!("{}-origin-verify", stack.name()));
        let ssm_prefix =
            normalize_prefix(props.ssm_prefix.as_deref().unwrap_or(DEFAULT_SSM_PREFIX));

        let removal_policy = props.removal_policy.unwrap_or(RemovalPolicy::Retain);
        let secret =
            secret_resource(Some(&secret_name), &header_name, length, &props.replica_regions)
                .with_overrides(&props.property_overrides)
                .with_removal_policy(Some(removal_policy));
        let logical_id = stack.add(&base, secret)?;
        let secret_arn = Token::reference(&logical_id);

        let rotation_function = LambdaFunction::new(
            stack,
            &format!("{base}Rotation"),
            props
                .rotation_function
                .or_code(FunctionCode::asset("rotation"))
                .env("SSM_PREFIX", ssm_prefix.as_str())
                .env("SECRET_LENGTH", length.to_string()),
        )?;
        rotation_function.grant(
            stack,
            PolicyStatement::allow()
                .actions([
                    "secretsmanager:DescribeSecret",
                    "secretsmanager:GetSecretValue",
                    "secretsmanager:PutSecretValue",
                    "secretsmanager:UpdateSecretVersionStage",
                ])
                .resource(secret_arn.clone()),
        )?;
        let rotated_at = ParameterKey::SecretRotatedAt.under(&ssm_prefix);
        rotation_function.grant(
            stack,
            PolicyStatement::allow()
                .actions(["ssm:PutParameter"])
                .resource(Token::sub(format!(
                    "arn:${{AWS::Partition}}:ssm:${{AWS::Region}}:${{AWS::AccountId}}:parameter{rotated_at}"
                ))),
        )?;
        let permission = rotation_function.grant_invoke(
            stack,
            "InvokePermission",
            SECRETS_MANAGER_SERVICE,
            Some(secret_arn.clone()),
        )?;

        let schedule_expression = schedule_expression(rotation_days);
        stack.add(
            &format!("{base}RotationSchedule"),
            Resource::new(ResourceKind::RotationSchedule)
                .with_properties(json!({
                    "SecretId": secret_arn,
                    "RotationLambdaARN": rotation_function.function_arn,
                    "RotationRules": { "ScheduleExpression": schedule_expression },
                }))
                .depends_on(permission),
        )?;

        Ok(Self {
            logical_id,
            secret_arn,
            secret_name,
            header_name,
            rotation_days,
            schedule_expression,
            rotation_function,
        })
    }

    pub fn origin_secret(&self) -> OriginSecret {
        OriginSecret {
            header_name: self.header_name.clone(),
            secret_arn: self.secret_arn.clone(),
            secret_name: Some(self.secret_name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StackEnv;

    fn rotating(props: RotatingSecretProps) -> (Stack, RotatingSecret) {
        let mut stack = Stack::new("edge", StackEnv::region("us-east-1"));
        let secret = RotatingSecret::new(&mut stack, "OriginSecret", props).unwrap();
        (stack, secret)
    }

    #[test]
    fn test_schedule_expression() {
        assert_eq!(schedule_expression(7), "rate(7 days)");
        assert_eq!(schedule_expression(1), "rate(1 day)");
    }

    #[test]
    fn test_defaults() {
        let (stack, secret) = rotating(RotatingSecretProps::default());
        assert_eq!(secret.secret_name, "edge-origin-verify");
        assert_eq!(secret.header_name, "x-origin-verify");
        assert_eq!(secret.rotation_days, 7);

        let r = stack.resource(&secret.logical_id).unwrap();
        let generate = r.prop("GenerateSecretString").unwrap();
        assert_eq!(generate["PasswordLength"], 32);
        assert_eq!(generate["GenerateStringKey"], "value");
        assert_eq!(generate["SecretStringTemplate"], r#"{"headerName":"x-origin-verify"}"#);
        assert!(r.prop("ReplicaRegions").is_none());

        let schedule = stack.resource("OriginSecretRotationSchedule").unwrap();
        assert_eq!(
            schedule.prop("RotationRules").unwrap()["ScheduleExpression"],
            "rate(7 days)"
        );
        assert_eq!(
            secret
                .rotation_function
                .environment_variable(&stack, "SSM_PREFIX"),
            Some(&json!("/shieldgate/security/"))
        );
    }

    #[test]
    fn test_rotation_days_override() {
        let (stack, secret) = rotating(RotatingSecretProps {
            rotation_days: Some(30),
            ..Default::default()
        });
        assert_eq!(secret.schedule_expression, "rate(30 days)");
        let r = stack.resource(&secret.logical_id).unwrap();
        assert_eq!(r.prop("GenerateSecretString").unwrap()["PasswordLength"], 32);
    }

    #[test]
    fn test_rotation_days_bounds() {
        let mut stack = Stack::new("edge", StackEnv::region("us-east-1"));
        for days in [0, 1001] {
            let err = RotatingSecret::new(
                &mut stack,
                "S",
                RotatingSecretProps {
                    rotation_days: Some(days),
                    ..Default::default()
                },
            )
            .unwrap_err();
            assert!(matches!(err, SynthError::InvalidValue { field: "rotation_days", .. }));
        }
    }

    #[test]
    fn test_empty_header_name_rejected() {
        let mut stack = Stack::new("edge", StackEnv::region("us-east-1"));
        let err = RotatingSecret::new(
            &mut stack,
            "S",
            RotatingSecretProps {
                header_name: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::InvalidValue { field: "header_name", .. }));
    }

    #[test]
    fn test_replicas() {
        let (stack, secret) = rotating(RotatingSecretProps {
            replica_regions: vec!["eu-west-1".into()],
            ..Default::default()
        });
        let r = stack.resource(&secret.logical_id).unwrap();
        assert_eq!(r.prop("ReplicaRegions"), Some(&json!([{"Region": "eu-west-1"}])));
    }

    #[test]
    fn test_dynamic_reference() {
        let imported = OriginSecret::imported(
            "x-origin-verify",
            "arn:aws:secretsmanager:us-east-1:1:secret:s",
        );
        assert_eq!(
            imported.dynamic_reference().as_literal().unwrap(),
            "{{resolve:secretsmanager:arn:aws:secretsmanager:us-east-1:1:secret:s:SecretString:value}}"
        );
    }
}
